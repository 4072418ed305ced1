//! Storage and entry instrumentation
//!
//! Rewrites compiled classes so that storage classes can be persisted
//! incrementally and entries receive their caller.
//!
//! # Overview
//!
//! This module implements:
//! - A class index over the input archive and its dependencies
//! - A memoizing type oracle for hierarchy and annotation questions
//! - Field classification into eager and lazy fields
//! - Per-method rewriting, including the constructor injection point search
//! - Synthetic members of storage classes
//! - The archive driver
//!
//! # Example
//!
//! ```rust
//! use storage_instrumenter::bytecode::{AccessFlags, ClassDescriptor, FieldDescriptor, FieldType};
//! use storage_instrumenter::instrument::{instrument_class, ClassIndex, InstrumentationConfig};
//!
//! let mut counter = ClassDescriptor::new("Counter", Some("runtime.Storage".to_string()));
//! counter.fields.push(FieldDescriptor::new("n", FieldType::INT, AccessFlags::PRIVATE));
//!
//! let index = ClassIndex::from_classes(vec![counter.clone()]).unwrap();
//! let output = instrument_class(&counter, &index, &InstrumentationConfig::default()).unwrap();
//! assert!(output.field("§old_n").is_some());
//! ```

pub mod augment;
pub mod config;
pub mod driver;
pub mod error;
pub mod fields;
pub mod index;
pub mod injection;
pub mod method;
pub mod names;
pub mod oracle;

pub use augment::ClassAugmenter;
pub use config::{ConfigError, InstrumentationConfig, ShadowingRule};
pub use driver::{instrument_archive, instrument_class, instrument_file};
pub use error::{InstrumentationError, InstrumentationResult};
pub use fields::{FieldClassification, FieldClassifier};
pub use index::ClassIndex;
pub use injection::find_injection_point;
pub use method::MethodInstrumenter;
pub use oracle::{MethodRole, TypeOracle};
