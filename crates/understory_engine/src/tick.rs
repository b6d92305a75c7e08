//! Tick clock passed to systems.

/// Timing information for one Update or Draw pass.
///
/// The world advances this once per [`crate::World::update`]; Draw passes
/// observe the clock without advancing it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickTime {
    /// Number of completed update cycles.
    pub cycle: u32,
    /// Ticks elapsed since the previous update.
    pub elapsed_ticks: i64,
    /// Total ticks elapsed since the world was created.
    pub total_ticks: i64,
}

impl TickTime {
    /// A clock at cycle zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by `elapsed` ticks and starts the next cycle.
    pub fn advance(&mut self, elapsed: i64) {
        self.cycle = self.cycle.wrapping_add(1);
        self.elapsed_ticks = elapsed;
        self.total_ticks += elapsed;
    }
}
