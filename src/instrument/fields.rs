//! Field classification
//!
//! Splits the persistent fields of a storage class into the eager fields of
//! every ancestor level, loaded by the deserialization constructor, and the
//! class's own lazy fields, loaded on first access.

use crate::bytecode::{ClassDescriptor, FieldDescriptor};
use crate::instrument::error::{InstrumentationError, InstrumentationResult};
use crate::instrument::oracle::TypeOracle;
use std::collections::{BTreeSet, HashSet};

/// Eager and lazy fields of one storage class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldClassification {
    /// Eager fields per level, root-most first; the last level is the class itself
    pub eager_levels: Vec<BTreeSet<FieldDescriptor>>,
    /// Lazy fields declared by the class itself
    pub lazy_fields: BTreeSet<FieldDescriptor>,
}

impl FieldClassification {
    /// Eager fields declared by the class itself
    pub fn own_eager(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.eager_levels.last().into_iter().flatten()
    }

    /// Eager fields of the ancestor levels, in constructor parameter order
    pub fn inherited_eager(&self) -> impl Iterator<Item = &FieldDescriptor> {
        let inherited = self.eager_levels.len().saturating_sub(1);
        self.eager_levels[..inherited].iter().flatten()
    }

    /// Every eager field, in constructor parameter order
    pub fn all_eager(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.eager_levels.iter().flatten()
    }
}

pub struct FieldClassifier<'o, 'a> {
    oracle: &'o TypeOracle<'a>,
}

impl<'o, 'a> FieldClassifier<'o, 'a> {
    pub fn new(oracle: &'o TypeOracle<'a>) -> Self {
        Self { oracle }
    }

    /// Classify the persistent fields of `class`, walking up to the platform root
    pub fn classify(&self, class: &ClassDescriptor) -> InstrumentationResult<FieldClassification> {
        let mut eager_levels = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = class;

        loop {
            if !visited.insert(current.name.as_str()) {
                return Err(InstrumentationError::unresolvable(
                    &current.name,
                    "cyclic superclass chain",
                ));
            }
            eager_levels.push(self.eager_fields(current));

            let superclass = current.superclass.as_deref().ok_or_else(|| {
                InstrumentationError::unresolvable(
                    &current.name,
                    format!("{} does not reach the storage root", class.name),
                )
            })?;
            if self.oracle.is_platform_storage_root(superclass) {
                break;
            }
            current = self.oracle.index().get(superclass).ok_or_else(|| {
                InstrumentationError::unresolvable(
                    superclass,
                    format!("superclass of {}", current.name),
                )
            })?;
        }
        eager_levels.reverse();

        let lazy_fields = class
            .fields
            .iter()
            .filter(|f| f.is_persistent() && self.oracle.is_lazily_loaded(&f.ty))
            .cloned()
            .collect();

        Ok(FieldClassification {
            eager_levels,
            lazy_fields,
        })
    }

    fn eager_fields(&self, class: &ClassDescriptor) -> BTreeSet<FieldDescriptor> {
        class
            .fields
            .iter()
            .filter(|f| f.is_persistent() && !self.oracle.is_lazily_loaded(&f.ty))
            .cloned()
            .collect()
    }
}
