//! Per-type relation storage.
//!
//! A [`RelationPool`] stores one typed value per unordered pair of entities,
//! in dense parallel key/value arrays compacted by swap-remove. A paged
//! adjacency map records, for each participant entity, the dense indices of
//! every relation it touches, giving O(1) neighbor counting and enumeration
//! without scanning the pool.

#![allow(clippy::cast_possible_truncation)]

use std::any::Any;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::Serialize;

use understory_foundation::{EntityId, Error, PagedBuckets, RelationTypeId, Result};

/// Unordered pair of entity ids, normalized so `(a, b)` and `(b, a)` are the
/// same key.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RelationKey {
    low: EntityId,
    high: EntityId,
}

impl RelationKey {
    /// Builds the normalized key for two participants, in either order.
    #[must_use]
    pub fn new(a: EntityId, b: EntityId) -> Self {
        if a.index() <= b.index() {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// The participant with the smaller id.
    #[must_use]
    pub const fn low(self) -> EntityId {
        self.low
    }

    /// The participant with the larger id (equal to `low` for self-relations).
    #[must_use]
    pub const fn high(self) -> EntityId {
        self.high
    }

    /// Given one participant, returns the other (itself for self-relations).
    #[must_use]
    pub fn other(self, entity: EntityId) -> EntityId {
        if entity == self.low { self.high } else { self.low }
    }
}

/// Bidirectional many-to-many storage for one relation-value type.
///
/// At most one value exists per unordered pair. Existence, lookup, and
/// removal are O(1); enumeration of one entity's relations is O(1) per
/// neighbor through the adjacency map.
pub struct RelationPool<T> {
    keys: Vec<RelationKey>,
    values: Vec<T>,
    index: HashMap<RelationKey, u32>,
    adjacency: PagedBuckets,
}

impl<T> Default for RelationPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RelationPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
            adjacency: PagedBuckets::new(),
        }
    }

    /// Returns the number of stored relations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no relation is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Inserts a relation value for the unordered pair `(subject, relative)`.
    ///
    /// The dense index is registered in both participants' adjacency
    /// buckets, once when `subject == relative`.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::RelationExists`] if the
    /// pair already has a value; the pool is left unchanged.
    pub fn add(&mut self, subject: EntityId, relative: EntityId, value: T) -> Result<&mut T> {
        let key = RelationKey::new(subject, relative);
        if self.index.contains_key(&key) {
            return Err(Error::relation_exists(
                subject,
                relative,
                std::any::type_name::<T>(),
            ));
        }
        let dense = self.keys.len() as u32;
        self.keys.push(key);
        self.values.push(value);
        self.index.insert(key, dense);
        self.adjacency.push(key.low().index(), dense);
        if key.low() != key.high() {
            self.adjacency.push(key.high().index(), dense);
        }
        Ok(&mut self.values[dense as usize])
    }

    /// Returns true if the unordered pair has a relation value.
    #[must_use]
    pub fn has(&self, subject: EntityId, relative: EntityId) -> bool {
        self.index.contains_key(&RelationKey::new(subject, relative))
    }

    /// Gets the relation value for the unordered pair.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::RelationNotFound`] if
    /// absent.
    pub fn get(&self, subject: EntityId, relative: EntityId) -> Result<&T> {
        self.try_get(subject, relative).ok_or_else(|| {
            Error::relation_not_found(subject, relative, std::any::type_name::<T>())
        })
    }

    /// Gets the relation value for the unordered pair mutably.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::RelationNotFound`] if
    /// absent.
    pub fn get_mut(&mut self, subject: EntityId, relative: EntityId) -> Result<&mut T> {
        let key = RelationKey::new(subject, relative);
        match self.index.get(&key) {
            Some(&dense) => Ok(&mut self.values[dense as usize]),
            None => Err(Error::relation_not_found(
                subject,
                relative,
                std::any::type_name::<T>(),
            )),
        }
    }

    /// Gets the relation value for the unordered pair, or `None` if absent.
    #[must_use]
    pub fn try_get(&self, subject: EntityId, relative: EntityId) -> Option<&T> {
        let dense = *self.index.get(&RelationKey::new(subject, relative))?;
        Some(&self.values[dense as usize])
    }

    /// Removes the relation for the unordered pair, returning its value.
    ///
    /// The dense slot is swap-removed; when another relation is moved into
    /// the vacated slot, its new index is re-registered in both of *its*
    /// participants' adjacency buckets before this returns. Returns `None`
    /// and leaves the pool unchanged if the pair has no relation.
    pub fn remove(&mut self, subject: EntityId, relative: EntityId) -> Option<T> {
        let key = RelationKey::new(subject, relative);
        let dense = self.index.remove(&key)?;
        self.adjacency.remove_value(key.low().index(), dense);
        if key.low() != key.high() {
            self.adjacency.remove_value(key.high().index(), dense);
        }

        let last = (self.keys.len() - 1) as u32;
        self.keys.swap_remove(dense as usize);
        let value = self.values.swap_remove(dense as usize);

        if dense != last {
            let moved = self.keys[dense as usize];
            self.index.insert(moved, dense);
            self.adjacency.replace_value(moved.low().index(), last, dense);
            if moved.low() != moved.high() {
                self.adjacency.replace_value(moved.high().index(), last, dense);
            }
        }
        Some(value)
    }

    /// Removes every relation touching `subject`.
    ///
    /// Returns whether at least one relation was removed.
    pub fn remove_all(&mut self, subject: EntityId) -> bool {
        let mut removed = false;
        while let Some(dense) = self.adjacency.last(subject.index()) {
            let key = self.keys[dense as usize];
            let _dropped = self.remove(key.low(), key.high());
            removed = true;
        }
        removed
    }

    /// Returns the number of relations touching `subject`, in O(1).
    #[must_use]
    pub fn count(&self, subject: EntityId) -> usize {
        self.adjacency.len(subject.index())
    }

    /// Enumerates `(other, &value)` for every relation touching `subject`.
    ///
    /// The iteration is backed by a snapshot of the adjacency bucket taken
    /// here; each call restarts from a fresh snapshot. Mutating the pool
    /// while iterating is prevented by the shared borrow.
    #[must_use]
    pub fn relations(&self, subject: EntityId) -> Relations<'_, T> {
        Relations {
            pool: self,
            subject,
            snapshot: self.adjacency.bucket(subject.index()).to_vec(),
            position: 0,
        }
    }

    /// Iterates `(key, &value)` over every stored relation in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (RelationKey, &T)> {
        self.keys.iter().copied().zip(self.values.iter())
    }

    /// Removes every relation while keeping allocated capacity.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.index.clear();
        self.adjacency.clear();
    }
}

/// Snapshot-backed iterator over one entity's relations.
///
/// See [`RelationPool::relations`].
pub struct Relations<'a, T> {
    pool: &'a RelationPool<T>,
    subject: EntityId,
    snapshot: Vec<u32>,
    position: usize,
}

impl<'a, T> Iterator for Relations<'a, T> {
    type Item = (EntityId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let dense = *self.snapshot.get(self.position)?;
        self.position += 1;
        let key = self.pool.keys[dense as usize];
        Some((key.other(self.subject), &self.pool.values[dense as usize]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Relations<'_, T> {}

/// Serializable `{a, b, data}` record of one relation.
#[cfg(feature = "serde")]
#[derive(Serialize)]
pub struct RelationRow<'a, T> {
    /// The participant with the smaller id.
    pub a: EntityId,
    /// The participant with the larger id.
    pub b: EntityId,
    /// The relation value.
    pub data: &'a T,
}

#[cfg(feature = "serde")]
impl<T: Serialize> RelationPool<T> {
    /// Iterates serializable `{a, b, data}` rows over every relation.
    ///
    /// There is no row-based deserialization for relations; reconstruction
    /// goes through [`RelationPool::add`].
    pub fn rows(&self) -> impl Iterator<Item = RelationRow<'_, T>> {
        self.iter().map(|(key, data)| RelationRow {
            a: key.low(),
            b: key.high(),
            data,
        })
    }
}

/// Type-erased relation pool access for the owning context.
pub trait AnyRelationPool: Send {
    /// The dense id of the stored relation type.
    fn relation_type(&self) -> RelationTypeId;
    /// The Rust name of the stored relation type.
    fn type_name(&self) -> &'static str;
    /// Number of stored relations.
    fn len(&self) -> usize;
    /// True if no relation is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Removes every relation touching `entity`; returns whether any existed.
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    /// Removes every relation.
    fn clear_pool(&mut self);
    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
    /// Downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + 'static> AnyRelationPool for RelationPool<T> {
    fn relation_type(&self) -> RelationTypeId {
        RelationTypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove_all(entity)
    }

    fn clear_pool(&mut self) {
        self.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
