//! Class index
//!
//! Name-keyed table of every class visible to the instrumentation pass.
//! Archives are parsed in parallel, one task per archive; afterwards the
//! index is immutable and shared read-only.

use crate::archive::Archive;
use crate::bytecode::ClassDescriptor;
use crate::instrument::error::{InstrumentationError, InstrumentationResult};
use parking_lot::Mutex;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A class together with the digest of the bytes it was parsed from
#[derive(Debug, Clone)]
struct IndexedClass {
    digest: [u8; 32],
    class: ClassDescriptor,
}

/// Immutable lookup table of classes by name
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    classes: HashMap<String, IndexedClass>,
}

impl ClassIndex {
    /// Parse every class entry of every archive.
    ///
    /// The same class parsed twice from identical bytes is kept once; from
    /// differing bytes the build fails with `ClassConflict`.
    pub fn build(archives: &[&Archive]) -> InstrumentationResult<Self> {
        let table: Mutex<HashMap<String, IndexedClass>> = Mutex::new(HashMap::new());

        archives.par_iter().try_for_each(|archive| {
            for entry in archive.class_entries() {
                let class = ClassDescriptor::from_bytes(&entry.data).map_err(|source| {
                    InstrumentationError::InvalidClass {
                        entry: entry.name.clone(),
                        source,
                    }
                })?;
                insert(&table, class, digest_of(&entry.data))?;
            }
            Ok::<(), InstrumentationError>(())
        })?;

        let classes = table.into_inner();
        log::debug!(
            "Indexed {} classes from {} archives",
            classes.len(),
            archives.len()
        );
        Ok(Self { classes })
    }

    /// Index already parsed classes, digesting their serialized form
    pub fn from_classes(classes: Vec<ClassDescriptor>) -> InstrumentationResult<Self> {
        let table = Mutex::new(HashMap::new());
        for class in classes {
            let bytes = class
                .to_bytes()
                .map_err(|source| InstrumentationError::InvalidClass {
                    entry: class.name.clone(),
                    source,
                })?;
            insert(&table, class, digest_of(&bytes))?;
        }
        Ok(Self {
            classes: table.into_inner(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name).map(|indexed| &indexed.class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// All indexed class names, sorted
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn digest_of(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn insert(
    table: &Mutex<HashMap<String, IndexedClass>>,
    class: ClassDescriptor,
    digest: [u8; 32],
) -> InstrumentationResult<()> {
    let mut table = table.lock();
    match table.get(&class.name) {
        Some(existing) if existing.digest != digest => {
            Err(InstrumentationError::ClassConflict { class: class.name })
        }
        Some(_) => {
            log::warn!(
                "Class {} appears twice with identical bytes ({})",
                class.name,
                hex::encode(&digest[..8])
            );
            Ok(())
        }
        None => {
            table.insert(class.name.clone(), IndexedClass { digest, class });
            Ok(())
        }
    }
}
