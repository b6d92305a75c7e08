//! Per-type component storage.
//!
//! A [`ComponentPool`] owns every instance of one component type across all
//! entities. Entries live in a hash-chained arena: a prime-sized bucket
//! table indexes into an entry array, occupied entries chain through their
//! `next` field, and removed entries form an intrusive free list inside the
//! same array. Slots are stable until their own entity is removed, so a
//! cached slot index stays valid across unrelated mutations of the pool.

// Slot indices fit i32 by construction; id/index casts are checked by the
// table invariants rather than the type system.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "serde")]
use serde::Serialize;

use understory_foundation::{
    ComponentTypeId, EntityId, Error, Listeners, PagedSparse, Result, Subscription, next_prime,
};

/// Chain terminator for an occupied entry.
const END_OF_CHAIN: i32 = -1;
/// Base of the free-list encoding: a free entry stores
/// `START_OF_FREE_LIST - next_free_slot` in `next`, which is always `< -1`.
const START_OF_FREE_LIST: i32 = -3;
/// Empty bucket / empty free list sentinel.
const NONE: i32 = -1;

/// Structural notification kinds raised by a pool.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PoolEvent {
    /// An entry was inserted; presence already reflects it.
    Added,
    /// An entry is about to be unlinked; presence still reflects it.
    Removing,
}

/// Shared entity-to-slot index of one pool, readable without borrowing it.
pub type SharedPresence = Arc<RwLock<PagedSparse<u32>>>;

/// Boxed structural listener: receives the event kind and the entity.
pub type StructuralListener = Box<dyn FnMut(PoolEvent, EntityId) + Send>;

/// Registration-time configuration for a component pool.
pub struct PoolConfig<T> {
    /// Initial entry capacity; 0 defers allocation to the first add.
    pub capacity: usize,
    /// Deep-clone hook used by [`ComponentPool::clone_to`] instead of `Clone`.
    pub clone_hook: Option<Box<dyn Fn(&T) -> T + Send + Sync>>,
    /// Invoked with every removed value on `remove`, `clear`, and entity
    /// cascade, before the entry is unlinked.
    pub dispose_hook: Option<Box<dyn FnMut(EntityId, &T) + Send>>,
}

impl<T> Default for PoolConfig<T> {
    fn default() -> Self {
        Self {
            capacity: 0,
            clone_hook: None,
            dispose_hook: None,
        }
    }
}

impl<T> PoolConfig<T> {
    /// Sets the initial entry capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the deep-clone hook.
    #[must_use]
    pub fn with_clone_hook(mut self, hook: impl Fn(&T) -> T + Send + Sync + 'static) -> Self {
        self.clone_hook = Some(Box::new(hook));
        self
    }

    /// Sets the dispose hook.
    #[must_use]
    pub fn with_dispose_hook(mut self, hook: impl FnMut(EntityId, &T) + Send + 'static) -> Self {
        self.dispose_hook = Some(Box::new(hook));
        self
    }
}

struct Entry<T> {
    /// `>= 0`: next entry in this bucket chain; `-1`: end of chain;
    /// `< -1`: free slot, encodes `START_OF_FREE_LIST - next_free`.
    next: i32,
    key: EntityId,
    /// `Some` iff the slot is occupied.
    value: Option<T>,
}

/// Hash-chained storage for all instances of one component type.
///
/// All operations are O(1) amortized. Borrowed component references are
/// valid until the next structural mutation of this pool, which the borrow
/// checker enforces. Enumeration yields entries in physical slot order,
/// which is neither insertion order nor sorted order.
pub struct ComponentPool<T> {
    buckets: Vec<i32>,
    entries: Vec<Entry<T>>,
    free_list: i32,
    free_count: usize,
    presence: SharedPresence,
    clone_hook: Option<Box<dyn Fn(&T) -> T + Send + Sync>>,
    dispose_hook: Option<Box<dyn FnMut(EntityId, &T) + Send>>,
    structural: Listeners<dyn FnMut(PoolEvent, EntityId) + Send>,
    added: Listeners<dyn FnMut(EntityId, &T) + Send>,
    removing: Listeners<dyn FnMut(EntityId, &T) + Send>,
    updating: Listeners<dyn FnMut(EntityId, &T, &T) + Send>,
}

impl<T> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComponentPool<T> {
    /// Creates an empty pool with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Creates an empty pool from a registration-time configuration.
    #[must_use]
    pub fn with_config(config: PoolConfig<T>) -> Self {
        let mut pool = Self {
            buckets: Vec::new(),
            entries: Vec::new(),
            free_list: NONE,
            free_count: 0,
            presence: Arc::new(RwLock::new(PagedSparse::new())),
            clone_hook: config.clone_hook,
            dispose_hook: config.dispose_hook,
            structural: Listeners::new(),
            added: Listeners::new(),
            removing: Listeners::new(),
            updating: Listeners::new(),
        };
        if config.capacity > 0 {
            pool.buckets = vec![NONE; next_prime(config.capacity)];
            pool.entries.reserve(config.capacity);
        }
        pool
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() - self.free_count
    }

    /// Returns true if no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `entity` owns an instance in this pool.
    #[must_use]
    pub fn has(&self, entity: EntityId) -> bool {
        self.find_slot(entity).is_some()
    }

    /// Inserts a component for `entity`.
    ///
    /// Raises the untyped structural and the typed Added notifications after
    /// the insertion completes.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::ComponentExists`] if the
    /// entity already owns an instance; the pool is left unchanged.
    pub fn add(&mut self, entity: EntityId, value: T) -> Result<&mut T> {
        if self.has(entity) {
            return Err(Error::component_exists(entity, std::any::type_name::<T>()));
        }
        let slot = self.insert(entity, value);
        self.emit_added(entity, slot);
        Ok(self.value_mut_at(slot))
    }

    /// Non-erroring variant of [`ComponentPool::add`].
    ///
    /// Returns false and leaves the pool unchanged if the entity already
    /// owns an instance (the given value is dropped).
    pub fn try_add(&mut self, entity: EntityId, value: T) -> bool {
        if self.has(entity) {
            return false;
        }
        let slot = self.insert(entity, value);
        self.emit_added(entity, slot);
        true
    }

    /// Returns the existing component for `entity`, or inserts the value
    /// produced by `factory`.
    ///
    /// The factory is not invoked when the component is already present.
    pub fn get_or_create(&mut self, entity: EntityId, factory: impl FnOnce() -> T) -> &mut T {
        let slot = match self.find_slot(entity) {
            Some(slot) => slot,
            None => {
                let slot = self.insert(entity, factory());
                self.emit_added(entity, slot);
                slot
            }
        };
        self.value_mut_at(slot)
    }

    /// Gets the component for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::ComponentNotFound`] if
    /// absent.
    pub fn get(&self, entity: EntityId) -> Result<&T> {
        self.try_get(entity)
            .ok_or_else(|| Error::component_not_found(entity, std::any::type_name::<T>()))
    }

    /// Gets the component for `entity` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::ComponentNotFound`] if
    /// absent.
    pub fn get_mut(&mut self, entity: EntityId) -> Result<&mut T> {
        match self.find_slot(entity) {
            Some(slot) => Ok(self.value_mut_at(slot)),
            None => Err(Error::component_not_found(
                entity,
                std::any::type_name::<T>(),
            )),
        }
    }

    /// Gets the component for `entity`, or `None` if absent. Never errors.
    #[must_use]
    pub fn try_get(&self, entity: EntityId) -> Option<&T> {
        let slot = self.find_slot(entity)?;
        self.entries[slot as usize].value.as_ref()
    }

    /// Gets the component for `entity` mutably, or `None` if absent.
    pub fn try_get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let slot = self.find_slot(entity)?;
        self.entries[slot as usize].value.as_mut()
    }

    /// Removes the component for `entity`, returning its value.
    ///
    /// The typed Removing notification, the untyped structural notification,
    /// and the dispose hook all run *before* the entry is unlinked, so
    /// observers can still read the component. Returns `None` and leaves the
    /// pool unchanged if absent.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let bucket = self.bucket_of(entity)?;
        let (slot, prev) = self.find_in_chain(entity, bucket)?;
        self.emit_removing(entity, slot);

        let entry_next = self.entries[slot as usize].next;
        if prev == NONE {
            self.buckets[bucket] = entry_next;
        } else {
            self.entries[prev as usize].next = entry_next;
        }
        let value = self.entries[slot as usize].value.take();
        self.entries[slot as usize].next = START_OF_FREE_LIST - self.free_list;
        self.free_list = slot as i32;
        self.free_count += 1;
        self.presence
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity.index());
        value
    }

    /// Overwrites the component for `entity` with `new`.
    ///
    /// Raises the Updating notification with the old value by reference and
    /// the new value before overwriting. Returns false if absent (the pool
    /// is left unchanged and `new` is dropped).
    pub fn update(&mut self, entity: EntityId, new: T) -> bool {
        let Some(slot) = self.find_slot(entity) else {
            return false;
        };
        let mut taken = self.updating.take();
        if let Some(old) = self.entries[slot as usize].value.as_ref() {
            for (_, listener) in &mut taken {
                listener(entity, old, &new);
            }
        }
        self.updating.restore(taken);
        self.entries[slot as usize].value = Some(new);
        true
    }

    /// Copies the component owned by `owner` to `clone`.
    ///
    /// Goes through the configured clone hook when one was registered,
    /// otherwise through `Clone`.
    ///
    /// # Errors
    ///
    /// Returns `ComponentNotFound` if `owner` has no instance and
    /// `ComponentExists` if `clone` already has one.
    pub fn clone_to(&mut self, owner: EntityId, clone: EntityId) -> Result<&mut T>
    where
        T: Clone,
    {
        let source = self.get(owner)?;
        let copied = match &self.clone_hook {
            Some(hook) => hook(source),
            None => source.clone(),
        };
        self.add(clone, copied)
    }

    /// Removes every entry, firing Removing notifications and the dispose
    /// hook for each, and keeps the reached capacity for reuse.
    pub fn clear(&mut self) {
        let occupied: Vec<u32> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.value.is_some())
            .map(|(slot, _)| slot as u32)
            .collect();
        for slot in occupied {
            let key = self.entries[slot as usize].key;
            self.emit_removing(key, slot);
        }
        self.buckets.fill(NONE);
        self.entries.clear();
        self.free_list = NONE;
        self.free_count = 0;
        self.presence
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Iterates `(entity, &value)` pairs in physical slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.entries
            .iter()
            .filter_map(|e| e.value.as_ref().map(|v| (e.key, v)))
    }

    /// Iterates `(entity, &mut value)` pairs in physical slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.entries
            .iter_mut()
            .filter_map(|e| e.value.as_mut().map(|v| (e.key, v)))
    }

    /// Returns the physical slot of `entity`'s component, if present.
    ///
    /// Advanced API: the slot stays valid only until this entity's own entry
    /// is removed or the pool is cleared.
    #[must_use]
    pub fn slot_of(&self, entity: EntityId) -> Option<u32> {
        self.find_slot(entity)
    }

    /// Reads the component at a physical slot. Advanced API.
    #[must_use]
    pub fn value_at(&self, slot: u32) -> Option<&T> {
        self.entries.get(slot as usize)?.value.as_ref()
    }

    /// Mutates the component at a physical slot. Advanced API.
    pub fn value_at_mut(&mut self, slot: u32) -> Option<&mut T> {
        self.entries.get_mut(slot as usize)?.value.as_mut()
    }

    /// Resolves the entity owning the component at a physical slot.
    /// Advanced API.
    #[must_use]
    pub fn owner_at(&self, slot: u32) -> Option<EntityId> {
        let entry = self.entries.get(slot as usize)?;
        entry.value.as_ref().map(|_| entry.key)
    }

    /// Returns the shared entity-to-slot presence index of this pool.
    #[must_use]
    pub fn presence(&self) -> SharedPresence {
        Arc::clone(&self.presence)
    }

    /// Subscribes to untyped structural notifications (Added/Removing).
    pub fn observe(&mut self, listener: StructuralListener) -> Subscription {
        self.structural.subscribe(listener)
    }

    /// Removes a structural listener.
    pub fn unobserve(&mut self, sub: Subscription) -> bool {
        self.structural.unsubscribe(sub)
    }

    /// Subscribes to typed Added notifications carrying the inserted value.
    pub fn observe_added(
        &mut self,
        listener: Box<dyn FnMut(EntityId, &T) + Send>,
    ) -> Subscription {
        self.added.subscribe(listener)
    }

    /// Removes a typed Added listener.
    pub fn unobserve_added(&mut self, sub: Subscription) -> bool {
        self.added.unsubscribe(sub)
    }

    /// Subscribes to typed Removing notifications; the value is still
    /// readable when the listener runs.
    pub fn observe_removing(
        &mut self,
        listener: Box<dyn FnMut(EntityId, &T) + Send>,
    ) -> Subscription {
        self.removing.subscribe(listener)
    }

    /// Removes a typed Removing listener.
    pub fn unobserve_removing(&mut self, sub: Subscription) -> bool {
        self.removing.unsubscribe(sub)
    }

    /// Subscribes to Updating notifications carrying old and new values.
    pub fn observe_updating(
        &mut self,
        listener: Box<dyn FnMut(EntityId, &T, &T) + Send>,
    ) -> Subscription {
        self.updating.subscribe(listener)
    }

    /// Removes an Updating listener.
    pub fn unobserve_updating(&mut self, sub: Subscription) -> bool {
        self.updating.unsubscribe(sub)
    }

    /// Hands out a raw parallel-access view over this pool's slots.
    ///
    /// Advanced API for the scheduler: the view allows concurrent mutable
    /// access to *disjoint* occupied slots from multiple workers. The
    /// exclusive borrow on the pool prevents structural mutation while any
    /// view is alive.
    pub fn par_access(&mut self) -> ParAccess<'_, T> {
        ParAccess {
            entries: self.entries.as_mut_ptr(),
            len: self.entries.len(),
            _marker: std::marker::PhantomData,
        }
    }

    // --- Internals ---

    fn bucket_of(&self, entity: EntityId) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        Some(entity.index() as usize % self.buckets.len())
    }

    fn find_slot(&self, entity: EntityId) -> Option<u32> {
        let bucket = self.bucket_of(entity)?;
        self.find_in_chain(entity, bucket).map(|(slot, _)| slot)
    }

    /// Walks one bucket chain; returns `(slot, previous_slot_or_NONE)`.
    fn find_in_chain(&self, entity: EntityId, bucket: usize) -> Option<(u32, i32)> {
        let mut prev = NONE;
        let mut index = self.buckets[bucket];
        while index >= 0 {
            let entry = &self.entries[index as usize];
            if entry.key == entity {
                return Some((index as u32, prev));
            }
            prev = index;
            index = entry.next;
        }
        None
    }

    /// Inserts without the duplicate check; caller guarantees absence.
    fn insert(&mut self, entity: EntityId, value: T) -> u32 {
        if self.buckets.is_empty() {
            self.buckets = vec![NONE; next_prime(4)];
        }
        let slot = if self.free_list != NONE {
            let slot = self.free_list as usize;
            self.free_list = START_OF_FREE_LIST - self.entries[slot].next;
            self.free_count -= 1;
            slot
        } else {
            if self.entries.len() == self.buckets.len() {
                self.grow();
            }
            self.entries.push(Entry {
                next: END_OF_CHAIN,
                key: entity,
                value: None,
            });
            self.entries.len() - 1
        };
        let bucket = entity.index() as usize % self.buckets.len();
        self.entries[slot] = Entry {
            next: self.buckets[bucket],
            key: entity,
            value: Some(value),
        };
        self.buckets[bucket] = slot as i32;
        self.presence
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(entity.index(), slot as u32);
        slot as u32
    }

    /// Doubles the bucket table up the prime ladder and rebuilds every
    /// chain from scratch in O(n).
    fn grow(&mut self) {
        let new_len = next_prime(self.entries.len() * 2 + 1);
        self.buckets = vec![NONE; new_len];
        for slot in 0..self.entries.len() {
            if self.entries[slot].value.is_none() {
                continue;
            }
            let bucket = self.entries[slot].key.index() as usize % new_len;
            self.entries[slot].next = self.buckets[bucket];
            self.buckets[bucket] = slot as i32;
        }
    }

    fn value_mut_at(&mut self, slot: u32) -> &mut T {
        // Caller passes a slot it just located or created.
        self.entries[slot as usize]
            .value
            .as_mut()
            .unwrap_or_else(|| unreachable!("occupied slot lost its value"))
    }

    fn emit_added(&mut self, entity: EntityId, slot: u32) {
        let mut taken = self.added.take();
        if let Some(value) = self.entries[slot as usize].value.as_ref() {
            for (_, listener) in &mut taken {
                listener(entity, value);
            }
        }
        self.added.restore(taken);

        let mut taken = self.structural.take();
        for (_, listener) in &mut taken {
            listener(PoolEvent::Added, entity);
        }
        self.structural.restore(taken);
    }

    fn emit_removing(&mut self, entity: EntityId, slot: u32) {
        let mut taken = self.removing.take();
        if let Some(value) = self.entries[slot as usize].value.as_ref() {
            for (_, listener) in &mut taken {
                listener(entity, value);
            }
        }
        self.removing.restore(taken);

        let mut taken = self.structural.take();
        for (_, listener) in &mut taken {
            listener(PoolEvent::Removing, entity);
        }
        self.structural.restore(taken);

        if let Some(hook) = self.dispose_hook.as_mut() {
            if let Some(value) = self.entries[slot as usize].value.as_ref() {
                hook(entity, value);
            }
        }
    }
}

/// Raw slot view for disjoint parallel mutation; see
/// [`ComponentPool::par_access`].
pub struct ParAccess<'a, T> {
    entries: *mut Entry<T>,
    len: usize,
    _marker: std::marker::PhantomData<&'a mut T>,
}

// Disjoint-slot access from multiple workers is the whole point of this
// view; the unsafe contract on `value_mut` carries the aliasing obligation.
unsafe impl<T: Send> Send for ParAccess<'_, T> {}
unsafe impl<T: Send> Sync for ParAccess<'_, T> {}

impl<T> ParAccess<'_, T> {
    /// Returns the number of physical slots, occupied or free.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.len
    }

    /// Mutably accesses the value at `slot`.
    ///
    /// # Safety
    ///
    /// `slot` must be an occupied slot of the pool this view was taken from,
    /// and no other access to the same slot may happen concurrently.
    pub unsafe fn value_mut(&self, slot: u32) -> &mut T {
        debug_assert!((slot as usize) < self.len);
        unsafe {
            let entry = &mut *self.entries.add(slot as usize);
            match entry.value.as_mut() {
                Some(value) => value,
                None => std::hint::unreachable_unchecked(),
            }
        }
    }
}

/// Serializable `{owner, data}` record of one pool entry.
#[cfg(feature = "serde")]
#[derive(Serialize)]
pub struct ComponentRow<'a, T> {
    /// The entity owning this instance.
    pub owner: EntityId,
    /// The component value.
    pub data: &'a T,
}

#[cfg(feature = "serde")]
impl<T: Serialize> ComponentPool<T> {
    /// Iterates serializable `{owner, data}` rows over every occupied entry.
    pub fn rows(&self) -> impl Iterator<Item = ComponentRow<'_, T>> {
        self.iter().map(|(owner, data)| ComponentRow { owner, data })
    }

    /// Inserts a deserialized row; returns false if the owner already has
    /// an instance.
    pub fn insert_row(&mut self, owner: EntityId, data: T) -> bool {
        self.try_add(owner, data)
    }
}

/// Type-erased component pool access for the owning context.
pub trait AnyComponentPool: Send {
    /// The dense id of the stored component type.
    fn component_type(&self) -> ComponentTypeId;
    /// The Rust name of the stored component type.
    fn type_name(&self) -> &'static str;
    /// Number of live entries.
    fn len(&self) -> usize;
    /// True if no entry is live.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Removes the entry for `entity` with full notification/dispose
    /// semantics; returns whether one existed.
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    /// Removes every entry with full notification/dispose semantics.
    fn clear_pool(&mut self);
    /// Shared entity-to-slot presence index.
    fn presence(&self) -> SharedPresence;
    /// Subscribes an untyped structural listener.
    fn observe_structural(&mut self, listener: StructuralListener) -> Subscription;
    /// Removes an untyped structural listener.
    fn unobserve_structural(&mut self, sub: Subscription) -> bool;
    /// Collects the owners of every live entry, in physical slot order.
    fn owners(&self) -> Vec<EntityId>;
    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
    /// Downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + 'static> AnyComponentPool for ComponentPool<T> {
    fn component_type(&self) -> ComponentTypeId {
        ComponentTypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn clear_pool(&mut self) {
        self.clear();
    }

    fn presence(&self) -> SharedPresence {
        self.presence()
    }

    fn observe_structural(&mut self, listener: StructuralListener) -> Subscription {
        self.observe(listener)
    }

    fn unobserve_structural(&mut self, sub: Subscription) -> bool {
        self.unobserve(sub)
    }

    fn owners(&self) -> Vec<EntityId> {
        self.iter().map(|(entity, _)| entity).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
