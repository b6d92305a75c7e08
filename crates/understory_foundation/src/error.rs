//! Error types for the Understory kernel.
//!
//! Uses `thiserror` for ergonomic error definition. Every error here is a
//! contract violation surfaced to the embedding application; the kernel never
//! retries or swallows them. The `try_*` families on pools return sentinels
//! instead and never construct these.

use thiserror::Error;

use crate::entity::EntityId;

/// A specialized `Result` type for Understory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Understory operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a duplicate-component error.
    #[must_use]
    pub fn component_exists(entity: EntityId, component: &str) -> Self {
        Self::new(ErrorKind::ComponentExists {
            entity,
            component: component.to_string(),
        })
    }

    /// Creates a component-not-found error.
    #[must_use]
    pub fn component_not_found(entity: EntityId, component: &str) -> Self {
        Self::new(ErrorKind::ComponentNotFound {
            entity,
            component: component.to_string(),
        })
    }

    /// Creates a duplicate-relation error.
    #[must_use]
    pub fn relation_exists(a: EntityId, b: EntityId, relation: &str) -> Self {
        Self::new(ErrorKind::RelationExists {
            a,
            b,
            relation: relation.to_string(),
        })
    }

    /// Creates a relation-not-found error.
    #[must_use]
    pub fn relation_not_found(a: EntityId, b: EntityId, relation: &str) -> Self {
        Self::new(ErrorKind::RelationNotFound {
            a,
            b,
            relation: relation.to_string(),
        })
    }

    /// Creates an entity-not-found error.
    #[must_use]
    pub fn entity_not_found(id: EntityId) -> Self {
        Self::new(ErrorKind::EntityNotFound(id))
    }

    /// Creates an unknown-type-id error.
    #[must_use]
    pub fn unknown_type_id(id: u16, registry: &str) -> Self {
        Self::new(ErrorKind::UnknownTypeId {
            id,
            registry: registry.to_string(),
        })
    }

    /// Creates an invalid-phase error.
    #[must_use]
    pub fn invalid_phase(running: &str, requested: &str) -> Self {
        Self::new(ErrorKind::InvalidPhase {
            running: running.to_string(),
            requested: requested.to_string(),
        })
    }

    /// Creates a constraint-conflict error.
    #[must_use]
    pub fn constraint_conflict(detail: &str) -> Self {
        Self::new(ErrorKind::ConstraintConflict(detail.to_string()))
    }

    /// Creates a worker-pool construction error.
    #[must_use]
    pub fn worker_pool(detail: String) -> Self {
        Self::new(ErrorKind::WorkerPool(detail))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A component of this type already exists for the entity.
    #[error("component already exists: {component} on entity {entity:?}")]
    ComponentExists {
        /// The entity that already owns the component.
        entity: EntityId,
        /// The component type name.
        component: String,
    },

    /// Component not found on entity.
    #[error("component not found: {component} on entity {entity:?}")]
    ComponentNotFound {
        /// The entity that was queried.
        entity: EntityId,
        /// The component type name that was not found.
        component: String,
    },

    /// A relation of this type already exists for the unordered pair.
    #[error("relation already exists: {relation} between {a:?} and {b:?}")]
    RelationExists {
        /// One participant.
        a: EntityId,
        /// The other participant.
        b: EntityId,
        /// The relation type name.
        relation: String,
    },

    /// Relation not found for the unordered pair.
    #[error("relation not found: {relation} between {a:?} and {b:?}")]
    RelationNotFound {
        /// One participant.
        a: EntityId,
        /// The other participant.
        b: EntityId,
        /// The relation type name that was not found.
        relation: String,
    },

    /// Entity was not found or is not alive.
    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityId),

    /// A dense type id was never registered.
    #[error("unknown {registry} type id: {id}")]
    UnknownTypeId {
        /// The dense id that failed to resolve.
        id: u16,
        /// Which registry was queried (`component` or `relation`).
        registry: String,
    },

    /// An Update or Draw pass was started while another was in flight.
    #[error("invalid phase: {requested} requested while {running} is running")]
    InvalidPhase {
        /// The pass currently in flight.
        running: String,
        /// The pass that was rejected.
        requested: String,
    },

    /// A constraint was built with conflicting or duplicate type sets.
    #[error("constraint conflict: {0}")]
    ConstraintConflict(String),

    /// The scheduler's worker pool could not be constructed.
    #[error("worker pool: {0}")]
    WorkerPool(String),
}
