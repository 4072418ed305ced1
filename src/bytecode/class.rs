//! Class, field and method descriptors
//!
//! A `ClassDescriptor` is the parsed form of one class entry. Class entries
//! are stored as JSON documents; parsing and serializing are exact inverses
//! so that identical classes always produce identical bytes.

use crate::bytecode::code::InstructionSequence;
use crate::bytecode::instruction::CONSTRUCTOR_NAME;
use crate::bytecode::types::{FieldType, MethodSignature};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

bitflags! {
    /// Access and property modifiers of classes and members
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const TRANSIENT = 0x0080;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

impl AccessFlags {
    /// Modifiers of every member added by instrumentation
    pub const GENERATED: AccessFlags = AccessFlags::PRIVATE
        .union(AccessFlags::SYNTHETIC)
        .union(AccessFlags::TRANSIENT);

    /// No public, protected or private modifier
    pub fn is_package_private(&self) -> bool {
        !self.intersects(AccessFlags::PUBLIC | AccessFlags::PROTECTED | AccessFlags::PRIVATE)
    }
}

fn empty_flags() -> AccessFlags {
    AccessFlags::empty()
}

// =============================================================================
// Annotations
// =============================================================================

/// An annotation attached to a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation class name
    pub name: String,
    /// Optional class-name argument
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

impl Annotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: None,
        }
    }

    pub fn with_argument(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: Some(argument.into()),
        }
    }
}

// =============================================================================
// Fields
// =============================================================================

/// A field declared by a class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: FieldType,
    #[serde(default = "empty_flags")]
    pub access: AccessFlags,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: FieldType, access: AccessFlags) -> Self {
        Self {
            name: name.into(),
            ty,
            access,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn is_transient(&self) -> bool {
        self.access.contains(AccessFlags::TRANSIENT)
    }

    /// Instance state that survives persistence
    pub fn is_persistent(&self) -> bool {
        !self.is_static() && !self.is_transient()
    }
}

// Ordered by (name, type name), the order used for field classification
impl Ord for FieldDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.ty.type_name().cmp(other.ty.type_name()))
            .then_with(|| self.ty.cmp(&other.ty))
            .then_with(|| self.access.bits().cmp(&other.access.bits()))
    }
}

impl PartialOrd for FieldDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// =============================================================================
// Methods
// =============================================================================

/// A method or constructor declared by a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub signature: MethodSignature,
    #[serde(default = "empty_flags")]
    pub access: AccessFlags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    /// Absent for abstract methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<InstructionSequence>,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        signature: MethodSignature,
        access: AccessFlags,
        code: Option<InstructionSequence>,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            access,
            annotations: Vec::new(),
            code,
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn is_private(&self) -> bool {
        self.access.contains(AccessFlags::PRIVATE)
    }

    /// Annotation with the given name, if present
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }

    /// Whether this method has the given name and signature
    pub fn matches(&self, name: &str, signature: &MethodSignature) -> bool {
        self.name == name && &self.signature == signature
    }

    /// First local slot after the receiver and the declared parameters
    pub fn first_free_slot(&self) -> usize {
        usize::from(!self.is_static()) + self.signature.param_slots()
    }
}

// =============================================================================
// Classes
// =============================================================================

/// A parsed class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(default = "empty_flags")]
    pub access: AccessFlags,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>, superclass: Option<String>) -> Self {
        Self {
            name: name.into(),
            superclass,
            interfaces: Vec::new(),
            access: AccessFlags::PUBLIC,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Parse class entry bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize to class entry bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str, signature: &MethodSignature) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.matches(name, signature))
    }

    /// Whether a member with this name (field) or name and signature (method) exists
    pub fn has_member(&self, name: &str, signature: Option<&MethodSignature>) -> bool {
        match signature {
            Some(signature) => self.method(name, signature).is_some(),
            None => self.field(name).is_some(),
        }
    }
}
