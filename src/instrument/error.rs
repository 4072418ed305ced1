//! Instrumentation errors
//!
//! Every error is fatal for the class being instrumented and aborts the
//! build of the whole archive.

use crate::archive::ArchiveError;
use crate::bytecode::CodeError;
use thiserror::Error;

/// Instrumentation errors
#[derive(Error, Debug)]
pub enum InstrumentationError {
    #[error("Class {class} is defined twice with different bytes")]
    ClassConflict { class: String },
    #[error("Cannot resolve type {name} ({context})")]
    UnresolvableType { name: String, context: String },
    #[error("Malformed constructor {class}.{method}: {reason}")]
    MalformedConstructor {
        class: String,
        method: String,
        reason: String,
    },
    #[error("Unsupported control flow in {class}.{method} at instruction {index}")]
    UnsupportedControlFlow {
        class: String,
        method: String,
        index: usize,
    },
    #[error("Illegal entry {class}.{method}: {reason}")]
    IllegalEntry {
        class: String,
        method: String,
        reason: String,
    },
    #[error("Class {class} already declares {member}")]
    DuplicateMember { class: String, member: String },
    #[error("Invalid class entry {entry}: {source}")]
    InvalidClass {
        entry: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid code in {class}.{method}: {source}")]
    InvalidCode {
        class: String,
        method: String,
        #[source]
        source: CodeError,
    },
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl InstrumentationError {
    pub(crate) fn unresolvable(name: &str, context: impl Into<String>) -> Self {
        InstrumentationError::UnresolvableType {
            name: name.to_string(),
            context: context.into(),
        }
    }

    pub(crate) fn malformed(class: &str, method: &str, reason: impl Into<String>) -> Self {
        InstrumentationError::MalformedConstructor {
            class: class.to_string(),
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn illegal_entry(class: &str, method: &str, reason: impl Into<String>) -> Self {
        InstrumentationError::IllegalEntry {
            class: class.to_string(),
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for instrumentation operations
pub type InstrumentationResult<T> = Result<T, InstrumentationError>;
