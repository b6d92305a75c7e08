//! Integration tests for Layer 1: Storage
//!
//! Tests for component pools, free-list reuse, events, and relation pools.

mod components;
mod relations;
