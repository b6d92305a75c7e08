//! Core types, errors, listener lists, and paged collections for Understory.
//!
//! This crate provides:
//! - [`EntityId`] - 32-bit entity identifiers
//! - [`ComponentTypeId`] / [`RelationTypeId`] - dense per-type identifiers
//! - [`Error`] - Categorized error types
//! - [`Listeners`] / [`Subscription`] - explicit observer registration
//! - Paged sparse collections ([`PagedSparse`], [`PagedBuckets`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod collections;
mod entity;
mod error;
mod event;
mod registry;

pub use collections::{PAGE_SIZE, PagedBuckets, PagedSparse, next_prime};
pub use entity::EntityId;
pub use error::{Error, ErrorKind, Result};
pub use event::{Listeners, Subscription};
pub use registry::{ComponentTypeId, RelationTypeId};
