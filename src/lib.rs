//! Understory - ECS storage and scheduling kernel
//!
//! This crate re-exports all layers of the Understory system for convenient
//! access. For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: understory_engine     — Constraints, filters, scheduler, world
//! Layer 1: understory_storage    — Component pools, relation pools
//! Layer 0: understory_foundation — EntityId, errors, listeners, paged maps
//! ```

pub use understory_engine as engine;
pub use understory_foundation as foundation;
pub use understory_storage as storage;
