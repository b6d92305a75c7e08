//! System traits dispatched by the world and the scheduler.

use crate::tick::TickTime;
use crate::world::World;

/// Game logic hosted by the world and driven by its Update and Draw passes.
///
/// Both hooks default to no-ops so a system can implement either alone. The
/// world is exclusively borrowed during a pass, so systems mutate it freely
/// but cannot start a nested pass.
pub trait System: Send {
    /// Called once per [`World::update`] pass.
    fn update(&mut self, world: &mut World, time: &TickTime) {
        let _ = (world, time);
    }

    /// Called once per [`World::draw`] pass.
    fn draw(&mut self, world: &mut World, time: &TickTime) {
        let _ = (world, time);
    }
}

/// Work the scheduler may run on any worker, concurrently with its peers.
///
/// Implementations own everything they touch (filter handles, channels,
/// atomics); the scheduler gives them no access to the world.
pub trait ParallelRunnable: Send {
    /// Executes one step of this runnable.
    fn run(&mut self, time: &TickTime);
}
