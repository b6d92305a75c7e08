//! Explicit listener registration.
//!
//! Pools and filters raise notifications through plain listener lists rather
//! than language-level events: subscribing hands back an opaque
//! [`Subscription`] token, and unsubscribing with it removes the listener.
//! A listener that is never unsubscribed keeps firing for the lifetime of
//! its list.

/// Opaque handle identifying one registered listener.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Subscription(u64);

/// An ordered list of boxed listeners with subscribe/unsubscribe support.
///
/// `F` is the unsized callable type, e.g. `dyn FnMut(EntityId) + Send`.
/// Emission uses [`Listeners::take`]/[`Listeners::restore`] so that a
/// listener may subscribe or unsubscribe while the list is being dispatched:
/// the owner takes the current entries, calls them, and restores them in
/// front of any entries added meanwhile.
pub struct Listeners<F: ?Sized> {
    entries: Vec<(Subscription, Box<F>)>,
    /// Tokens unsubscribed while their entries were detached by `take`.
    tombstones: Vec<Subscription>,
    /// Whether a `take` is currently outstanding.
    dispatching: bool,
    next_id: u64,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Listeners<F> {
    /// Creates an empty listener list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            tombstones: Vec::new(),
            dispatching: false,
            next_id: 0,
        }
    }

    /// Registers a listener, returning its subscription token.
    pub fn subscribe(&mut self, listener: Box<F>) -> Subscription {
        let sub = Subscription(self.next_id);
        self.next_id += 1;
        self.entries.push((sub, listener));
        sub
    }

    /// Removes the listener registered under `sub`.
    ///
    /// Returns false if the subscription was not (or is no longer) present.
    /// During dispatch the removal is deferred until [`Listeners::restore`].
    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        if let Some(pos) = self.entries.iter().position(|(s, _)| *s == sub) {
            self.entries.remove(pos);
            return true;
        }
        if self.dispatching && sub.0 < self.next_id && !self.tombstones.contains(&sub) {
            self.tombstones.push(sub);
            return true;
        }
        false
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detaches the current entries for dispatch.
    ///
    /// The owner iterates the returned entries, then hands them back with
    /// [`Listeners::restore`]. Unsubscriptions performed while entries are
    /// taken are honored on restore.
    #[must_use]
    pub fn take(&mut self) -> Vec<(Subscription, Box<F>)> {
        self.dispatching = true;
        std::mem::take(&mut self.entries)
    }

    /// Reattaches entries previously removed by [`Listeners::take`].
    ///
    /// Entries subscribed during dispatch stay behind the restored ones;
    /// entries unsubscribed during dispatch are dropped here.
    pub fn restore(&mut self, mut taken: Vec<(Subscription, Box<F>)>) {
        let added_meanwhile = std::mem::take(&mut self.entries);
        taken.retain(|(s, _)| !self.tombstones.contains(s));
        taken.extend(added_meanwhile);
        self.entries = taken;
        self.tombstones.clear();
        self.dispatching = false;
    }
}
