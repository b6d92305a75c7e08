//! Component pools and relation pools for Understory.
//!
//! This crate provides:
//! - [`ComponentPool`] - per-type hash-chained component storage with an
//!   inline free list and stable physical slots
//! - [`RelationPool`] - per-type bidirectional relation storage with paged
//!   adjacency for O(1) neighbor enumeration
//! - [`AnyComponentPool`] / [`AnyRelationPool`] - type-erased pool access
//!   for the owning context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod component;
mod relation;

pub use component::{
    AnyComponentPool, ComponentPool, ParAccess, PoolConfig, PoolEvent, SharedPresence,
    StructuralListener,
};
pub use relation::{AnyRelationPool, RelationKey, RelationPool, Relations};

#[cfg(feature = "serde")]
pub use component::ComponentRow;
#[cfg(feature = "serde")]
pub use relation::RelationRow;
