//! Event-driven incremental filters.
//!
//! A [`Filter`] maintains the set of entities matching a [`Constraint`]
//! without rescanning pools. Membership is corrected one entity at a time by
//! structural listeners the world subscribes on every constrained pool;
//! between structural mutations the member list is exact.
//!
//! The member set lives behind an `Arc<Mutex<_>>` so filter handles can be
//! cloned into systems and read from scheduler workers. Filter observers run
//! while that lock is held and must not call back into the same filter or
//! structurally mutate an observed pool.

#![allow(clippy::cast_possible_truncation)]

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLockReadGuard};

use understory_foundation::{EntityId, Listeners, PagedSparse, Subscription};
use understory_storage::{ComponentPool, PoolEvent, SharedPresence, StructuralListener};

use crate::constraint::Constraint;

/// A filter membership observer.
pub type FilterListener = Box<dyn FnMut(EntityId) + Send>;

fn read(presence: &SharedPresence) -> RwLockReadGuard<'_, PagedSparse<u32>> {
    presence.read().unwrap_or_else(PoisonError::into_inner)
}

/// True if `entity` is present in every `include` pool and absent from every
/// `exclude` pool, judged by the pools' shared presence indices.
pub(crate) fn applicable(
    include: &[SharedPresence],
    exclude: &[SharedPresence],
    entity: EntityId,
) -> bool {
    include.iter().all(|p| read(p).contains(entity.index()))
        && !exclude.iter().any(|p| read(p).contains(entity.index()))
}

/// Dense member list plus the reverse index that makes removal O(1).
pub(crate) struct FilterCore {
    members: Vec<EntityId>,
    index: PagedSparse<u32>,
    added: Listeners<dyn FnMut(EntityId) + Send>,
    removing: Listeners<dyn FnMut(EntityId) + Send>,
}

impl FilterCore {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            index: PagedSparse::new(),
            added: Listeners::new(),
            removing: Listeners::new(),
        }
    }

    pub(crate) fn contains(&self, entity: EntityId) -> bool {
        self.index.contains(entity.index())
    }

    /// Adds `entity` to the member list; no-op if already a member.
    pub(crate) fn insert(&mut self, entity: EntityId) {
        if self.index.contains(entity.index()) {
            return;
        }
        self.index.set(entity.index(), self.members.len() as u32);
        self.members.push(entity);

        let mut taken = self.added.take();
        for (_, listener) in &mut taken {
            listener(entity);
        }
        self.added.restore(taken);
    }

    /// Removes `entity` from the member list; no-op if not a member.
    ///
    /// Removal observers fire while the entity is still a member.
    pub(crate) fn remove(&mut self, entity: EntityId) {
        let Some(position) = self.index.get(entity.index()) else {
            return;
        };

        let mut taken = self.removing.take();
        for (_, listener) in &mut taken {
            listener(entity);
        }
        self.removing.restore(taken);

        self.index.remove(entity.index());
        let position = position as usize;
        self.members.swap_remove(position);
        if position < self.members.len() {
            let moved = self.members[position];
            self.index.set(moved.index(), position as u32);
        }
    }
}

/// Builds the structural listener wired onto an include pool.
///
/// An addition makes the entity a member if the rest of the constraint
/// already holds; a removal always evicts it.
pub(crate) fn include_listener(
    core: Arc<Mutex<FilterCore>>,
    include: Vec<SharedPresence>,
    exclude: Vec<SharedPresence>,
) -> StructuralListener {
    Box::new(move |event, entity| match event {
        PoolEvent::Added => {
            if applicable(&include, &exclude, entity) {
                lock(&core).insert(entity);
            }
        }
        PoolEvent::Removing => {
            lock(&core).remove(entity);
        }
    })
}

/// Builds the structural listener wired onto an exclude pool.
///
/// An addition always evicts the entity; a removal makes it a member if the
/// rest of the constraint holds. The origin pool is left out of `exclude`
/// because its presence index still lists the entity while the removal
/// notification is in flight.
pub(crate) fn exclude_listener(
    core: Arc<Mutex<FilterCore>>,
    include: Vec<SharedPresence>,
    other_exclude: Vec<SharedPresence>,
) -> StructuralListener {
    Box::new(move |event, entity| match event {
        PoolEvent::Added => {
            lock(&core).remove(entity);
        }
        PoolEvent::Removing => {
            if applicable(&include, &other_exclude, entity) {
                lock(&core).insert(entity);
            }
        }
    })
}

fn lock(core: &Mutex<FilterCore>) -> MutexGuard<'_, FilterCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live view of the entities matching a constraint.
///
/// Handles are cheap to clone and share one member set; they are obtained
/// from the world, which keeps the set current through pool events.
pub struct Filter {
    constraint: Constraint,
    core: Arc<Mutex<FilterCore>>,
}

impl Clone for Filter {
    fn clone(&self) -> Self {
        Self {
            constraint: self.constraint.clone(),
            core: Arc::clone(&self.core),
        }
    }
}

impl Filter {
    pub(crate) fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            core: Arc::new(Mutex::new(FilterCore::new())),
        }
    }

    pub(crate) fn core(&self) -> Arc<Mutex<FilterCore>> {
        Arc::clone(&self.core)
    }

    pub(crate) fn with_core<R>(&self, f: impl FnOnce(&mut FilterCore) -> R) -> R {
        f(&mut lock(&self.core))
    }

    /// The constraint this filter tracks.
    #[must_use]
    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Number of matching entities.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.core).members.len()
    }

    /// True if no entity matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `entity` currently matches.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        lock(&self.core).contains(entity)
    }

    /// The member at dense position `position`, if in bounds.
    ///
    /// Positions are stable only between structural mutations.
    #[must_use]
    pub fn at(&self, position: usize) -> Option<EntityId> {
        lock(&self.core).members.get(position).copied()
    }

    /// Locks the member list for direct slice access.
    ///
    /// Structural mutations that would touch this filter deadlock while the
    /// guard is held; prefer [`Filter::snapshot`] when mutating.
    #[must_use]
    pub fn members(&self) -> Members<'_> {
        Members { guard: lock(&self.core) }
    }

    /// Copies the current member list out of the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EntityId> {
        lock(&self.core).members.clone()
    }

    /// Copies up to `count` members starting at dense position `start`.
    ///
    /// Clamped to the member list, so out-of-range requests yield fewer
    /// entities rather than failing.
    #[must_use]
    pub fn skip(&self, start: usize, count: usize) -> Vec<EntityId> {
        let core = lock(&self.core);
        let start = start.min(core.members.len());
        let end = start.saturating_add(count).min(core.members.len());
        core.members[start..end].to_vec()
    }

    /// Subscribes to entities entering the member set.
    pub fn observe_added(&self, listener: FilterListener) -> Subscription {
        lock(&self.core).added.subscribe(listener)
    }

    /// Removes an added observer.
    pub fn unobserve_added(&self, sub: Subscription) -> bool {
        lock(&self.core).added.unsubscribe(sub)
    }

    /// Subscribes to entities leaving the member set. Fires while the entity
    /// is still a member.
    pub fn observe_removing(&self, listener: FilterListener) -> Subscription {
        lock(&self.core).removing.subscribe(listener)
    }

    /// Removes a removing observer.
    pub fn unobserve_removing(&self, sub: Subscription) -> bool {
        lock(&self.core).removing.unsubscribe(sub)
    }

    /// The `A` component of a member, looked up by entity id.
    ///
    /// Returns `None` when `entity` is not currently a member, even if the
    /// pool holds a value for it.
    #[must_use]
    pub fn get<'a, A>(&self, entity: EntityId, pool: &'a ComponentPool<A>) -> Option<&'a A> {
        if !self.contains(entity) {
            return None;
        }
        let slot = pool.slot_of(entity)?;
        pool.value_at(slot)
    }

    /// The `A` component of a member, mutably. See [`Filter::get`].
    #[must_use]
    pub fn get_mut<'a, A>(
        &self,
        entity: EntityId,
        pool: &'a mut ComponentPool<A>,
    ) -> Option<&'a mut A> {
        if !self.contains(entity) {
            return None;
        }
        let slot = pool.slot_of(entity)?;
        pool.value_at_mut(slot)
    }

    /// The `A` and `B` components of a member, mutably, as one bundle.
    ///
    /// Returns `None` when `entity` is not a member or either pool has no
    /// value for it.
    #[must_use]
    pub fn get2<'a, A, B>(
        &self,
        entity: EntityId,
        a: &'a mut ComponentPool<A>,
        b: &'a mut ComponentPool<B>,
    ) -> Option<(&'a mut A, &'a mut B)> {
        if !self.contains(entity) {
            return None;
        }
        let slot_a = a.slot_of(entity)?;
        let slot_b = b.slot_of(entity)?;
        Some((a.value_at_mut(slot_a)?, b.value_at_mut(slot_b)?))
    }

    /// Runs `f` over every member with mutable access to its `A` component.
    ///
    /// Members missing from `pool` are skipped. Iterates a snapshot, so the
    /// member set observed is the one at the call.
    pub fn for_each<A>(&self, pool: &mut ComponentPool<A>, mut f: impl FnMut(EntityId, &mut A)) {
        for entity in self.snapshot() {
            if let Some(slot) = pool.slot_of(entity) {
                if let Some(value) = pool.value_at_mut(slot) {
                    f(entity, value);
                }
            }
        }
    }

    /// Runs `f` over every member holding both an `A` and a `B` component.
    pub fn for_each2<A, B>(
        &self,
        a: &mut ComponentPool<A>,
        b: &mut ComponentPool<B>,
        mut f: impl FnMut(EntityId, &mut A, &mut B),
    ) {
        for entity in self.snapshot() {
            let Some(slot_a) = a.slot_of(entity) else { continue };
            let Some(slot_b) = b.slot_of(entity) else { continue };
            let Some(value_a) = a.value_at_mut(slot_a) else { continue };
            let Some(value_b) = b.value_at_mut(slot_b) else { continue };
            f(entity, value_a, value_b);
        }
    }

    /// Runs `f` over every member holding an `A`, a `B`, and a `C`
    /// component.
    pub fn for_each3<A, B, C>(
        &self,
        a: &mut ComponentPool<A>,
        b: &mut ComponentPool<B>,
        c: &mut ComponentPool<C>,
        mut f: impl FnMut(EntityId, &mut A, &mut B, &mut C),
    ) {
        for entity in self.snapshot() {
            let Some(slot_a) = a.slot_of(entity) else { continue };
            let Some(slot_b) = b.slot_of(entity) else { continue };
            let Some(slot_c) = c.slot_of(entity) else { continue };
            let Some(value_a) = a.value_at_mut(slot_a) else { continue };
            let Some(value_b) = b.value_at_mut(slot_b) else { continue };
            let Some(value_c) = c.value_at_mut(slot_c) else { continue };
            f(entity, value_a, value_b, value_c);
        }
    }
}

/// Locked slice view of a filter's members. See [`Filter::members`].
pub struct Members<'a> {
    guard: MutexGuard<'a, FilterCore>,
}

impl Deref for Members<'_> {
    type Target = [EntityId];

    fn deref(&self) -> &[EntityId] {
        &self.guard.members
    }
}
