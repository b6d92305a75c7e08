//! Constraints, filters, scheduling, and the world for Understory.
//!
//! This crate provides:
//! - [`Constraint`] - normalized include/exclude component-type predicates
//! - [`Filter`] - event-driven incremental membership over a constraint
//! - [`Scheduler`] - deterministic parallel batch execution over filters
//! - [`World`] - entities, pools, filter registry, hierarchy, and the
//!   Update/Draw system loop
//! - [`System`] / [`ParallelRunnable`] - the hosted-logic traits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod constraint;
mod filter;
mod scheduler;
mod system;
mod tick;
mod world;

pub use constraint::{Constraint, ConstraintBuilder};
pub use filter::{Filter, FilterListener, Members};
pub use scheduler::{Scheduler, batches};
pub use system::{ParallelRunnable, System};
pub use tick::TickTime;
pub use world::World;
