//! Storage Instrumenter: static bytecode instrumentation for smart contracts
//!
//! This crate rewrites compiled contract classes so that they can run on a
//! persistent, transactional runtime:
//! - Storage classes load reference fields lazily and keep shadow copies of
//!   their persisted state
//! - Storage classes report exactly the fields that changed since loading
//! - Entry methods and constructors receive the calling contract, and every
//!   call to an entry passes it along
//! - Class archives are read, instrumented in parallel and written atomically
//!
//! # Example
//!
//! ```rust
//! use storage_instrumenter::archive::{class_entry_name, Archive, ArchiveEntry};
//! use storage_instrumenter::bytecode::ClassDescriptor;
//! use storage_instrumenter::instrument::{instrument_archive, InstrumentationConfig};
//!
//! let class = ClassDescriptor::new("a.Note", Some("runtime.Storage".to_string()));
//! let mut input = Archive::new();
//! input
//!     .push(ArchiveEntry::new(class_entry_name(&class.name), class.to_bytes().unwrap()))
//!     .unwrap();
//!
//! let output = instrument_archive(&input, &[], &InstrumentationConfig::default()).unwrap();
//! assert_eq!(output.len(), 1);
//! ```

pub mod archive;
pub mod bytecode;
pub mod cli;
pub mod instrument;

// Re-export commonly used types
pub use archive::{Archive, ArchiveEntry, ArchiveError};
pub use bytecode::{ClassDescriptor, Instruction, InstructionSequence, MethodSignature};
pub use instrument::{
    instrument_archive, instrument_class, instrument_file, ClassIndex, InstrumentationConfig,
    InstrumentationError, TypeOracle,
};
