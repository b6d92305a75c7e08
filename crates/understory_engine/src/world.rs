//! The world: entities, pools, filters, hierarchy, and the system loop.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use understory_foundation::{
    ComponentTypeId, EntityId, Error, PagedBuckets, PagedSparse, RelationTypeId, Result,
    Subscription,
};
use understory_storage::{
    AnyComponentPool, AnyRelationPool, ComponentPool, PoolConfig, RelationPool, SharedPresence,
};

use crate::constraint::Constraint;
use crate::filter::{self, Filter};
use crate::system::System;
use crate::tick::TickTime;

const PHASE_IDLE: u8 = 0;
const PHASE_UPDATE: u8 = 1;
const PHASE_DRAW: u8 = 2;

fn phase_name(phase: u8) -> &'static str {
    match phase {
        PHASE_UPDATE => "update",
        PHASE_DRAW => "draw",
        _ => "idle",
    }
}

/// Resets the phase flag when a pass unwinds, panicking or not.
struct PhaseGuard {
    phase: Arc<AtomicU8>,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.phase.store(PHASE_IDLE, Ordering::Release);
    }
}

/// Entity id allocator with free-list reuse.
///
/// Despawned ids return to a stack and are handed out again verbatim; there
/// is no generation counter, so holders of a stale id must check liveness
/// through the world.
#[derive(Default)]
struct EntityAllocator {
    alive: Vec<bool>,
    free: Vec<u32>,
    live: usize,
}

impl EntityAllocator {
    fn spawn(&mut self) -> EntityId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.alive[id as usize] = true;
            return EntityId::new(id);
        }
        let id = u32::try_from(self.alive.len()).unwrap_or(u32::MAX);
        self.alive.push(true);
        EntityId::new(id)
    }

    fn despawn(&mut self, entity: EntityId) -> bool {
        let index = entity.index() as usize;
        if !self.is_alive(entity) {
            return false;
        }
        self.alive[index] = false;
        self.free.push(entity.index());
        self.live -= 1;
        true
    }

    fn is_alive(&self, entity: EntityId) -> bool {
        self.alive
            .get(entity.index() as usize)
            .copied()
            .unwrap_or(false)
    }
}

struct FilterEntry {
    filter: Filter,
    subscriptions: Vec<(ComponentTypeId, Subscription)>,
}

/// The central container tying the kernel together.
///
/// Owns the entity allocator, one type-erased pool per registered component
/// and relation type, the filter registry keyed by constraint, the
/// parent/child hierarchy, and the hosted systems.
#[derive(Default)]
pub struct World {
    entities: EntityAllocator,
    components: Vec<Option<Box<dyn AnyComponentPool>>>,
    relations: Vec<Option<Box<dyn AnyRelationPool>>>,
    filters: HashMap<Constraint, FilterEntry>,
    parents: PagedSparse<EntityId>,
    children: PagedBuckets,
    systems: Vec<Box<dyn System>>,
    time: TickTime,
    phase: Arc<AtomicU8>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Entities
    // -------------------------------------------------------------------------

    /// Creates a live entity, reusing the most recently despawned id first.
    pub fn spawn(&mut self) -> EntityId {
        self.entities.spawn()
    }

    /// Despawns an entity and cascades the removal everywhere it is known:
    /// every component pool (with full event and dispose semantics), every
    /// relation pool, and the hierarchy. Children are detached, not
    /// despawned.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::EntityNotFound`] if the
    /// entity is not alive.
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        if !self.entities.is_alive(entity) {
            return Err(Error::entity_not_found(entity));
        }

        for pool in self.components.iter_mut().flatten() {
            pool.remove_entity(entity);
        }
        for pool in self.relations.iter_mut().flatten() {
            pool.remove_entity(entity);
        }

        if let Some(parent) = self.parents.remove(entity.index()) {
            self.children.remove_value(parent.index(), entity.index());
        }
        for child in self.children.drain(entity.index()) {
            self.parents.remove(child);
        }

        self.entities.despawn(entity);
        Ok(())
    }

    /// True if the entity id is currently live.
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.live
    }

    // -------------------------------------------------------------------------
    // Component pools
    // -------------------------------------------------------------------------

    /// Registers the component pool for `T` with an explicit configuration.
    ///
    /// If `T` is already registered the existing pool keeps its original
    /// configuration and `config` is dropped.
    pub fn register_component<T: Send + 'static>(
        &mut self,
        config: PoolConfig<T>,
    ) -> &mut ComponentPool<T> {
        let index = ComponentTypeId::of::<T>().index() as usize;
        if self.components.len() <= index {
            self.components.resize_with(index + 1, || None);
        }
        let slot = &mut self.components[index];
        if slot.is_none() {
            *slot = Some(Box::new(ComponentPool::with_config(config)));
        }
        slot.as_mut()
            .and_then(|pool| pool.as_any_mut().downcast_mut())
            .unwrap_or_else(|| unreachable!("pool slot holds a different type"))
    }

    /// Shared access to the component pool for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::UnknownTypeId`] if no
    /// pool for `T` was ever registered.
    pub fn components<T: Send + 'static>(&self) -> Result<&ComponentPool<T>> {
        let id = ComponentTypeId::of::<T>();
        self.components
            .get(id.index() as usize)
            .and_then(Option::as_ref)
            .and_then(|pool| pool.as_any().downcast_ref())
            .ok_or_else(|| Error::unknown_type_id(id.index(), "component"))
    }

    /// Exclusive access to the component pool for `T`, registering a
    /// default-configured pool on first use.
    pub fn components_mut<T: Send + 'static>(&mut self) -> &mut ComponentPool<T> {
        self.register_component(PoolConfig::default())
    }

    /// Erased access to the component pool registered under a dense type id.
    ///
    /// For tooling that enumerates pools without knowing their Rust types.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::UnknownTypeId`] if the id
    /// has no registered pool.
    pub fn component_pool(&self, id: ComponentTypeId) -> Result<&dyn AnyComponentPool> {
        self.any_pool(id)
    }

    // -------------------------------------------------------------------------
    // Relation pools
    // -------------------------------------------------------------------------

    /// Shared access to the relation pool for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::UnknownTypeId`] if no
    /// pool for `T` was ever registered.
    pub fn relations<T: Send + 'static>(&self) -> Result<&RelationPool<T>> {
        let id = RelationTypeId::of::<T>();
        self.relations
            .get(id.index() as usize)
            .and_then(Option::as_ref)
            .and_then(|pool| pool.as_any().downcast_ref())
            .ok_or_else(|| Error::unknown_type_id(id.index(), "relation"))
    }

    /// Exclusive access to the relation pool for `T`, registering an empty
    /// pool on first use.
    pub fn relations_mut<T: Send + 'static>(&mut self) -> &mut RelationPool<T> {
        let index = RelationTypeId::of::<T>().index() as usize;
        if self.relations.len() <= index {
            self.relations.resize_with(index + 1, || None);
        }
        let slot = &mut self.relations[index];
        if slot.is_none() {
            *slot = Some(Box::new(RelationPool::<T>::new()));
        }
        slot.as_mut()
            .and_then(|pool| pool.as_any_mut().downcast_mut())
            .unwrap_or_else(|| unreachable!("pool slot holds a different type"))
    }

    /// Erased access to the relation pool registered under a dense type id.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::UnknownTypeId`] if the id
    /// has no registered pool.
    pub fn relation_pool(&self, id: RelationTypeId) -> Result<&dyn AnyRelationPool> {
        self.relations
            .get(id.index() as usize)
            .and_then(Option::as_ref)
            .map(Box::as_ref)
            .ok_or_else(|| Error::unknown_type_id(id.index(), "relation"))
    }

    // -------------------------------------------------------------------------
    // Filters
    // -------------------------------------------------------------------------

    /// Returns the filter for `constraint`, creating and seeding it on first
    /// request. Equal constraints share one filter.
    ///
    /// Creation seeds membership by scanning the smallest include pool, then
    /// subscribes a structural listener on every constrained pool so the
    /// member set stays current.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::UnknownTypeId`] if any
    /// constrained component type has no registered pool.
    pub fn filter(&mut self, constraint: &Constraint) -> Result<Filter> {
        if let Some(entry) = self.filters.get(constraint) {
            return Ok(entry.filter.clone());
        }

        let include_presence = self.presences(constraint.include())?;
        let exclude_presence = self.presences(constraint.exclude())?;

        let filter = Filter::new(constraint.clone());

        // Seed from the cheapest include pool.
        let seed_id = constraint
            .include()
            .iter()
            .copied()
            .min_by_key(|id| self.pool_len(*id))
            .unwrap_or_else(|| unreachable!("constraints have a nonempty include set"));
        for entity in self.any_pool(seed_id)?.owners() {
            if filter::applicable(&include_presence, &exclude_presence, entity) {
                filter.with_core(|core| core.insert(entity));
            }
        }

        let mut subscriptions = Vec::new();
        for &id in constraint.include() {
            let listener = filter::include_listener(
                filter.core(),
                include_presence.clone(),
                exclude_presence.clone(),
            );
            let sub = self.any_pool_mut(id)?.observe_structural(listener);
            subscriptions.push((id, sub));
        }
        for (position, &id) in constraint.exclude().iter().enumerate() {
            let mut other_exclude = exclude_presence.clone();
            other_exclude.swap_remove(position);
            let listener =
                filter::exclude_listener(filter.core(), include_presence.clone(), other_exclude);
            let sub = self.any_pool_mut(id)?.observe_structural(listener);
            subscriptions.push((id, sub));
        }

        self.filters.insert(
            constraint.clone(),
            FilterEntry {
                filter: filter.clone(),
                subscriptions,
            },
        );
        Ok(filter)
    }

    /// Drops the filter for `constraint` and detaches its pool listeners.
    ///
    /// Returns whether a filter existed. Outstanding handles keep reading
    /// the final member set but are no longer corrected.
    pub fn release_filter(&mut self, constraint: &Constraint) -> bool {
        let Some(entry) = self.filters.remove(constraint) else {
            return false;
        };
        for (id, sub) in entry.subscriptions {
            if let Ok(pool) = self.any_pool_mut(id) {
                pool.unobserve_structural(sub);
            }
        }
        true
    }

    fn presences(&self, ids: &[ComponentTypeId]) -> Result<Vec<SharedPresence>> {
        ids.iter()
            .map(|&id| self.any_pool(id).map(AnyComponentPool::presence))
            .collect()
    }

    fn pool_len(&self, id: ComponentTypeId) -> usize {
        self.any_pool(id).map_or(usize::MAX, AnyComponentPool::len)
    }

    fn any_pool(&self, id: ComponentTypeId) -> Result<&dyn AnyComponentPool> {
        self.components
            .get(id.index() as usize)
            .and_then(Option::as_ref)
            .map(Box::as_ref)
            .ok_or_else(|| Error::unknown_type_id(id.index(), "component"))
    }

    fn any_pool_mut(&mut self, id: ComponentTypeId) -> Result<&mut (dyn AnyComponentPool + 'static)> {
        self.components
            .get_mut(id.index() as usize)
            .and_then(Option::as_mut)
            .map(Box::as_mut)
            .ok_or_else(|| Error::unknown_type_id(id.index(), "component"))
    }

    // -------------------------------------------------------------------------
    // Hierarchy
    // -------------------------------------------------------------------------

    /// Makes `parent` the parent of `child`, replacing any previous parent.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::EntityNotFound`] if
    /// either entity is dead, or
    /// [`understory_foundation::ErrorKind::ConstraintConflict`] if the edge
    /// would close a cycle (including `child == parent`).
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) -> Result<()> {
        if !self.entities.is_alive(child) {
            return Err(Error::entity_not_found(child));
        }
        if !self.entities.is_alive(parent) {
            return Err(Error::entity_not_found(parent));
        }

        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(Error::constraint_conflict("hierarchy edge closes a cycle"));
            }
            ancestor = self.parents.get(current.index());
        }

        if let Some(previous) = self.parents.set(child.index(), parent) {
            self.children.remove_value(previous.index(), child.index());
        }
        self.children.push(parent.index(), child.index());
        Ok(())
    }

    /// The parent of `entity`, if it has one.
    #[must_use]
    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.parents.get(entity.index())
    }

    /// The children of `entity`, in attachment order.
    #[must_use]
    pub fn children(&self, entity: EntityId) -> Vec<EntityId> {
        self.children
            .bucket(entity.index())
            .iter()
            .map(|&id| EntityId::new(id))
            .collect()
    }

    /// Detaches `child` from its parent; returns whether it had one.
    pub fn remove_parent(&mut self, child: EntityId) -> bool {
        match self.parents.remove(child.index()) {
            Some(parent) => {
                self.children.remove_value(parent.index(), child.index());
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Systems and passes
    // -------------------------------------------------------------------------

    /// Hosts a system; it joins the Update and Draw passes in add order.
    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// The current tick clock.
    #[must_use]
    pub fn time(&self) -> TickTime {
        self.time
    }

    /// Runs one Update pass: advances the clock by `elapsed` ticks, then
    /// calls every system's `update` in add order.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::InvalidPhase`] if an
    /// Update or Draw pass is already in flight.
    pub fn update(&mut self, elapsed: i64) -> Result<()> {
        let _guard = self.enter(PHASE_UPDATE, "update")?;
        self.time.advance(elapsed);
        let time = self.time;

        let mut active = mem::take(&mut self.systems);
        for system in &mut active {
            system.update(self, &time);
        }
        // Systems added during the pass follow the pre-existing ones.
        active.append(&mut self.systems);
        self.systems = active;
        Ok(())
    }

    /// Runs one Draw pass: calls every system's `draw` in add order without
    /// advancing the clock.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::InvalidPhase`] if an
    /// Update or Draw pass is already in flight.
    pub fn draw(&mut self) -> Result<()> {
        let _guard = self.enter(PHASE_DRAW, "draw")?;
        let time = self.time;

        let mut active = mem::take(&mut self.systems);
        for system in &mut active {
            system.draw(self, &time);
        }
        active.append(&mut self.systems);
        self.systems = active;
        Ok(())
    }

    fn enter(&self, phase: u8, requested: &str) -> Result<PhaseGuard> {
        match self
            .phase
            .compare_exchange(PHASE_IDLE, phase, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(PhaseGuard {
                phase: Arc::clone(&self.phase),
            }),
            Err(running) => Err(Error::invalid_phase(phase_name(running), requested)),
        }
    }
}
