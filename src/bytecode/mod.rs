//! Bytecode model
//!
//! A generic stack-machine representation of compiled classes.
//!
//! # Overview
//!
//! This module provides:
//! - Value and signature types, with slot sizes for wide values
//! - An instruction set with declared stack effects and explicit branch targets
//! - Class, field and method descriptors, serialized as class entries
//! - A label-resolving code builder and a disassembler
//!
//! # Example
//!
//! ```rust
//! use storage_instrumenter::bytecode::{disassemble, CodeBuilder, Instruction};
//!
//! let mut builder = CodeBuilder::new();
//! builder.emit(Instruction::load_this()).emit(Instruction::Pop);
//! builder.emit(Instruction::ret(None));
//! let code = builder.finish().unwrap();
//!
//! assert!(disassemble(&code).contains("LOAD ref 0"));
//! ```

pub mod builder;
pub mod class;
pub mod code;
pub mod instruction;
pub mod types;

pub use builder::ClassBuilder;
pub use class::{AccessFlags, Annotation, ClassDescriptor, FieldDescriptor, MethodDescriptor};
pub use code::{disassemble, CodeBuilder, CodeError, InstructionSequence};
pub use instruction::{
    ArithOp, Condition, Constant, Control, Instruction, InvokeKind, StackEffect, CONSTRUCTOR_NAME,
};
pub use types::{FieldType, MethodSignature, PrimitiveKind, ValueKind, REFERENCE_TAG};
