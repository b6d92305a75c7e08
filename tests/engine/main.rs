//! Integration tests for Layer 2: Engine
//!
//! Tests for incremental filters, parallel scheduling, and the world loop.

mod filters;
mod scheduling;
mod world;
