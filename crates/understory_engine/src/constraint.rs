//! Membership constraints over component types.
//!
//! A [`Constraint`] is the value identity of a filter: two constraints with
//! the same include and exclude sets compare equal and hash identically, so
//! the world can deduplicate filter registrations by constraint.

use understory_foundation::{ComponentTypeId, Error, Result};

/// A normalized include/exclude component-type predicate.
///
/// Built through [`Constraint::builder`]. Both sets are sorted and
/// duplicate-free, so structural equality is set equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Constraint {
    include: Vec<ComponentTypeId>,
    exclude: Vec<ComponentTypeId>,
}

impl Constraint {
    /// Starts building a constraint.
    #[must_use]
    pub fn builder() -> ConstraintBuilder {
        ConstraintBuilder::default()
    }

    /// Component types an entity must have, sorted by dense id.
    #[must_use]
    pub fn include(&self) -> &[ComponentTypeId] {
        &self.include
    }

    /// Component types an entity must not have, sorted by dense id.
    #[must_use]
    pub fn exclude(&self) -> &[ComponentTypeId] {
        &self.exclude
    }

    /// True if `id` appears in either set.
    #[must_use]
    pub fn mentions(&self, id: ComponentTypeId) -> bool {
        self.include.binary_search(&id).is_ok() || self.exclude.binary_search(&id).is_ok()
    }
}

/// Accumulates include/exclude types for a [`Constraint`].
#[derive(Default)]
pub struct ConstraintBuilder {
    include: Vec<ComponentTypeId>,
    exclude: Vec<ComponentTypeId>,
}

impl ConstraintBuilder {
    /// Requires entities to have a `T` component.
    #[must_use]
    pub fn include<T: 'static>(mut self) -> Self {
        self.include.push(ComponentTypeId::of::<T>());
        self
    }

    /// Requires entities to not have a `T` component.
    #[must_use]
    pub fn exclude<T: 'static>(mut self) -> Self {
        self.exclude.push(ComponentTypeId::of::<T>());
        self
    }

    /// Normalizes and validates the accumulated sets.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::ConstraintConflict`] if
    /// the include set is empty, if either set repeats a type, or if a type
    /// appears in both sets.
    pub fn build(self) -> Result<Constraint> {
        let mut include = self.include;
        let mut exclude = self.exclude;
        include.sort_unstable();
        exclude.sort_unstable();

        if include.is_empty() {
            return Err(Error::constraint_conflict("include set is empty"));
        }
        if include.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(Error::constraint_conflict("include set repeats a type"));
        }
        if exclude.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(Error::constraint_conflict("exclude set repeats a type"));
        }
        if include.iter().any(|id| exclude.binary_search(id).is_ok()) {
            return Err(Error::constraint_conflict(
                "a type appears in both include and exclude",
            ));
        }

        Ok(Constraint { include, exclude })
    }
}
