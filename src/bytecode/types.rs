//! Value and signature types of the bytecode model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag used for every reference-typed value
pub const REFERENCE_TAG: &str = "reference";

// =============================================================================
// Primitive Kinds
// =============================================================================

/// Primitive value kinds understood by the virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    /// Number of stack/local slots a value of this kind occupies
    pub fn size(&self) -> usize {
        match self {
            PrimitiveKind::Long | PrimitiveKind::Double => 2,
            _ => 1,
        }
    }

    /// Whether this is a two-slot kind
    pub fn is_wide(&self) -> bool {
        self.size() == 2
    }

    /// Kinds that live on the stack as an `int`
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Boolean
                | PrimitiveKind::Byte
                | PrimitiveKind::Char
                | PrimitiveKind::Short
                | PrimitiveKind::Int
        )
    }

    /// Kind name, also used as its type tag
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Field Types
// =============================================================================

/// Declared type of a field, parameter or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Primitive(PrimitiveKind),
    Reference(String),
}

impl FieldType {
    pub const BOOLEAN: FieldType = FieldType::Primitive(PrimitiveKind::Boolean);
    pub const INT: FieldType = FieldType::Primitive(PrimitiveKind::Int);
    pub const LONG: FieldType = FieldType::Primitive(PrimitiveKind::Long);

    /// Reference type to the given class
    pub fn reference(class: impl Into<String>) -> Self {
        FieldType::Reference(class.into())
    }

    pub fn size(&self) -> usize {
        match self {
            FieldType::Primitive(kind) => kind.size(),
            FieldType::Reference(_) => 1,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.size() == 2
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference(_))
    }

    /// Stack kind used to load, store and return values of this type
    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldType::Primitive(kind) if kind.is_int_like() => ValueKind::Int,
            FieldType::Primitive(PrimitiveKind::Long) => ValueKind::Long,
            FieldType::Primitive(PrimitiveKind::Float) => ValueKind::Float,
            FieldType::Primitive(_) => ValueKind::Double,
            FieldType::Reference(_) => ValueKind::Reference,
        }
    }

    /// Coarse tag reported alongside updates: the primitive name or `reference`
    pub fn tag(&self) -> &str {
        match self {
            FieldType::Primitive(kind) => kind.name(),
            FieldType::Reference(_) => REFERENCE_TAG,
        }
    }

    /// Full type name: the primitive name or the referenced class name
    pub fn type_name(&self) -> &str {
        match self {
            FieldType::Primitive(kind) => kind.name(),
            FieldType::Reference(class) => class,
        }
    }

    /// Referenced class, if any
    pub fn class_name(&self) -> Option<&str> {
        match self {
            FieldType::Reference(class) => Some(class),
            FieldType::Primitive(_) => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// =============================================================================
// Stack Value Kinds
// =============================================================================

/// Kinds of values as seen by load/store/return instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    pub fn size(&self) -> usize {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.size() == 2
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Reference => "ref",
        }
    }
}

// =============================================================================
// Method Signatures
// =============================================================================

/// Parameter and return types of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSignature {
    pub params: Vec<FieldType>,
    #[serde(default)]
    pub ret: Option<FieldType>,
}

impl MethodSignature {
    pub fn new(params: Vec<FieldType>, ret: Option<FieldType>) -> Self {
        Self { params, ret }
    }

    /// `()V`
    pub fn void() -> Self {
        Self::new(Vec::new(), None)
    }

    /// Total slots taken by the parameters, receiver excluded
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(FieldType::size).sum()
    }

    pub fn return_slots(&self) -> usize {
        self.ret.as_ref().map_or(0, FieldType::size)
    }

    /// Copy of this signature with one more trailing parameter
    pub fn with_extra_param(&self, extra: FieldType) -> Self {
        let mut params = self.params.clone();
        params.push(extra);
        Self::new(params, self.ret.clone())
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        match &self.ret {
            Some(ret) => write!(f, ") -> {}", ret),
            None => write!(f, ")"),
        }
    }
}
