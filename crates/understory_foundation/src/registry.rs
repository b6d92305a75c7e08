//! Dense per-type identifiers.
//!
//! Component and relation types are assigned small dense ids on first use,
//! stable for the process lifetime. The ids index per-type metadata in the
//! owning context and identify serialized pools without reflection on hot
//! paths. Assignment goes through a process-wide, lock-guarded registry,
//! one per kind so component and relation ids stay independently dense.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

struct TypeRegistry {
    ids: HashMap<TypeId, u16>,
    names: Vec<&'static str>,
}

impl TypeRegistry {
    fn resolve<T: 'static>(&mut self) -> u16 {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.ids.get(&type_id) {
            return id;
        }
        let id = next_dense_id(self.names.len());
        self.ids.insert(type_id, id);
        self.names.push(std::any::type_name::<T>());
        id
    }
}

/// Panics once the dense id space is spent; a saturated id would silently
/// alias per-type storage in every owning context.
fn next_dense_id(assigned: usize) -> u16 {
    u16::try_from(assigned)
        .unwrap_or_else(|_| panic!("dense type id space exhausted after {assigned} types"))
}

fn component_registry() -> &'static Mutex<TypeRegistry> {
    static REGISTRY: OnceLock<Mutex<TypeRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Mutex::new(TypeRegistry {
            ids: HashMap::new(),
            names: Vec::new(),
        })
    })
}

fn relation_registry() -> &'static Mutex<TypeRegistry> {
    static REGISTRY: OnceLock<Mutex<TypeRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Mutex::new(TypeRegistry {
            ids: HashMap::new(),
            names: Vec::new(),
        })
    })
}

/// Dense identifier for a component type.
///
/// Assigned once per distinct Rust type on first call to
/// [`ComponentTypeId::of`] and stable until the process exits.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComponentTypeId(pub(crate) u16);

impl ComponentTypeId {
    /// Returns the dense id for component type `T`, assigning one on first use.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        let mut registry = component_registry()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self(registry.resolve::<T>())
    }

    /// Returns the raw dense index of this id.
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Resolves the type name registered under a dense id, if any.
    #[must_use]
    pub fn name(id: u16) -> Option<&'static str> {
        let registry = component_registry()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.names.get(id as usize).copied()
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

/// Dense identifier for a relation-value type.
///
/// Assigned once per distinct Rust type on first call to
/// [`RelationTypeId::of`] and stable until the process exits.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationTypeId(pub(crate) u16);

impl RelationTypeId {
    /// Returns the dense id for relation type `T`, assigning one on first use.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        let mut registry = relation_registry()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self(registry.resolve::<T>())
    }

    /// Returns the raw dense index of this id.
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Resolves the type name registered under a dense id, if any.
    #[must_use]
    pub fn name(id: u16) -> Option<&'static str> {
        let registry = relation_registry()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.names.get(id as usize).copied()
    }
}

impl fmt::Debug for RelationTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationTypeId({})", self.0)
    }
}
