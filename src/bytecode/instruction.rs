//! Instruction set of the stack machine
//!
//! Every instruction declares its stack effect in slots (wide values count
//! twice) and, for control transfers, its explicit branch targets. Branch
//! targets are indices into the enclosing instruction sequence.

use crate::bytecode::types::{FieldType, MethodSignature, PrimitiveKind, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name shared by every constructor
pub const CONSTRUCTOR_NAME: &str = "<init>";

// =============================================================================
// Operands
// =============================================================================

/// Constant pushed by `Const`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constant {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Constant {
    pub fn size(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => write!(f, "null"),
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Long(v) => write!(f, "{}L", v),
            Constant::Float(v) => write!(f, "{}F", v),
            Constant::Double(v) => write!(f, "{}D", v),
            Constant::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// Dispatch mode of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeKind {
    /// Virtual dispatch on the receiver
    Virtual,
    /// Direct call: constructors, private methods, super calls
    Special,
    /// No receiver
    Static,
    /// Interface dispatch on the receiver
    Interface,
}

impl InvokeKind {
    pub fn has_receiver(&self) -> bool {
        !matches!(self, InvokeKind::Static)
    }

    pub fn name(&self) -> &'static str {
        match self {
            InvokeKind::Virtual => "INVOKEVIRTUAL",
            InvokeKind::Special => "INVOKESPECIAL",
            InvokeKind::Static => "INVOKESTATIC",
            InvokeKind::Interface => "INVOKEINTERFACE",
        }
    }
}

/// Branch condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Eq => "EQ",
            Condition::Ne => "NE",
            Condition::Lt => "LT",
            Condition::Ge => "GE",
            Condition::Gt => "GT",
            Condition::Le => "LE",
        }
    }
}

/// Binary arithmetic and bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
}

impl ArithOp {
    pub fn name(&self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
            ArithOp::Rem => "REM",
            ArithOp::And => "AND",
            ArithOp::Or => "OR",
            ArithOp::Xor => "XOR",
        }
    }
}

// =============================================================================
// Instructions
// =============================================================================

/// A single instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "opcode", rename_all = "snake_case")]
pub enum Instruction {
    /// Push a local variable
    Load { kind: ValueKind, slot: u16 },
    /// Pop into a local variable
    Store { kind: ValueKind, slot: u16 },
    /// Add a constant to an int local in place
    Increment { slot: u16, delta: i32 },
    /// Push a constant
    Const { value: Constant },
    /// objectref -> value
    GetField {
        owner: String,
        name: String,
        ty: FieldType,
    },
    /// objectref, value ->
    PutField {
        owner: String,
        name: String,
        ty: FieldType,
    },
    GetStatic {
        owner: String,
        name: String,
        ty: FieldType,
    },
    PutStatic {
        owner: String,
        name: String,
        ty: FieldType,
    },
    /// [receiver], args... -> [result]
    Invoke {
        kind: InvokeKind,
        owner: String,
        name: String,
        signature: MethodSignature,
    },
    /// Allocate an uninitialized instance
    New { class: String },
    CheckCast { class: String },
    Dup,
    Pop,
    Arithmetic { op: ArithOp, kind: ValueKind },
    /// Compare two long/float/double values, pushing -1, 0 or 1
    Compare { kind: ValueKind },
    /// Reinterpret a float as int bits, or a double as long bits
    RawBits { kind: PrimitiveKind },
    Goto { target: usize },
    /// Branch comparing an int against zero
    If { cond: Condition, target: usize },
    /// Branch comparing two ints, or two references by identity
    IfCmp {
        kind: ValueKind,
        cond: Condition,
        target: usize,
    },
    IfNull { is_null: bool, target: usize },
    /// Multi-way indirect branch on an int
    Switch { targets: Vec<usize>, default: usize },
    Return { kind: Option<ValueKind> },
    Throw,
}

/// Number of slots an instruction pops and pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEffect {
    pub pops: usize,
    pub pushes: usize,
}

impl StackEffect {
    const fn new(pops: usize, pushes: usize) -> Self {
        Self { pops, pushes }
    }
}

/// How control leaves an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Continue with the next instruction
    FallThrough,
    /// Always jump
    Jump(usize),
    /// Either fall through or jump
    Branch(usize),
    /// Computed, multi-way jump
    Indirect(Vec<usize>),
    /// Leave the method
    Exit,
}

impl Instruction {
    pub fn load(kind: ValueKind, slot: u16) -> Self {
        Instruction::Load { kind, slot }
    }

    pub fn store(kind: ValueKind, slot: u16) -> Self {
        Instruction::Store { kind, slot }
    }

    /// `aload_0`
    pub fn load_this() -> Self {
        Instruction::Load {
            kind: ValueKind::Reference,
            slot: 0,
        }
    }

    pub fn constant(value: Constant) -> Self {
        Instruction::Const { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Instruction::Const {
            value: Constant::String(value.into()),
        }
    }

    pub fn get_field(owner: &str, name: &str, ty: &FieldType) -> Self {
        Instruction::GetField {
            owner: owner.to_string(),
            name: name.to_string(),
            ty: ty.clone(),
        }
    }

    pub fn put_field(owner: &str, name: &str, ty: &FieldType) -> Self {
        Instruction::PutField {
            owner: owner.to_string(),
            name: name.to_string(),
            ty: ty.clone(),
        }
    }

    pub fn invoke(kind: InvokeKind, owner: &str, name: &str, signature: MethodSignature) -> Self {
        Instruction::Invoke {
            kind,
            owner: owner.to_string(),
            name: name.to_string(),
            signature,
        }
    }

    pub fn ret(kind: Option<ValueKind>) -> Self {
        Instruction::Return { kind }
    }

    /// Declared stack effect, in slots
    pub fn stack_effect(&self) -> StackEffect {
        match self {
            Instruction::Load { kind, .. } => StackEffect::new(0, kind.size()),
            Instruction::Store { kind, .. } => StackEffect::new(kind.size(), 0),
            Instruction::Increment { .. } => StackEffect::new(0, 0),
            Instruction::Const { value } => StackEffect::new(0, value.size()),
            Instruction::GetField { ty, .. } => StackEffect::new(1, ty.size()),
            Instruction::PutField { ty, .. } => StackEffect::new(1 + ty.size(), 0),
            Instruction::GetStatic { ty, .. } => StackEffect::new(0, ty.size()),
            Instruction::PutStatic { ty, .. } => StackEffect::new(ty.size(), 0),
            Instruction::Invoke {
                kind, signature, ..
            } => {
                let receiver = usize::from(kind.has_receiver());
                StackEffect::new(
                    receiver + signature.param_slots(),
                    signature.return_slots(),
                )
            }
            Instruction::New { .. } => StackEffect::new(0, 1),
            Instruction::CheckCast { .. } => StackEffect::new(1, 1),
            Instruction::Dup => StackEffect::new(1, 2),
            Instruction::Pop => StackEffect::new(1, 0),
            Instruction::Arithmetic { kind, .. } => StackEffect::new(2 * kind.size(), kind.size()),
            Instruction::Compare { kind } => StackEffect::new(2 * kind.size(), 1),
            Instruction::RawBits { kind } => StackEffect::new(kind.size(), kind.size()),
            Instruction::Goto { .. } => StackEffect::new(0, 0),
            Instruction::If { .. } => StackEffect::new(1, 0),
            Instruction::IfCmp { .. } => StackEffect::new(2, 0),
            Instruction::IfNull { .. } => StackEffect::new(1, 0),
            Instruction::Switch { .. } => StackEffect::new(1, 0),
            Instruction::Return { kind } => StackEffect::new(kind.map_or(0, |k| k.size()), 0),
            Instruction::Throw => StackEffect::new(1, 0),
        }
    }

    /// How control leaves this instruction
    pub fn control(&self) -> Control {
        match self {
            Instruction::Goto { target } => Control::Jump(*target),
            Instruction::If { target, .. }
            | Instruction::IfCmp { target, .. }
            | Instruction::IfNull { target, .. } => Control::Branch(*target),
            Instruction::Switch { targets, default } => {
                let mut all = targets.clone();
                all.push(*default);
                Control::Indirect(all)
            }
            Instruction::Return { .. } | Instruction::Throw => Control::Exit,
            _ => Control::FallThrough,
        }
    }

    /// Local slots written by this instruction
    pub fn stored_slots(&self) -> Vec<u16> {
        match self {
            Instruction::Store { kind, slot } if kind.is_wide() => {
                std::iter::once(*slot).chain(slot.checked_add(1)).collect()
            }
            Instruction::Store { slot, .. } | Instruction::Increment { slot, .. } => vec![*slot],
            _ => Vec::new(),
        }
    }

    /// Mutable access to every branch target of this instruction
    pub fn targets_mut(&mut self) -> Vec<&mut usize> {
        match self {
            Instruction::Goto { target }
            | Instruction::If { target, .. }
            | Instruction::IfCmp { target, .. }
            | Instruction::IfNull { target, .. } => vec![target],
            Instruction::Switch { targets, default } => {
                let mut all: Vec<&mut usize> = targets.iter_mut().collect();
                all.push(default);
                all
            }
            _ => Vec::new(),
        }
    }

    /// Whether this is a call of a constructor of `class`
    pub fn is_constructor_call_of(&self, class: &str) -> bool {
        matches!(
            self,
            Instruction::Invoke { kind: InvokeKind::Special, owner, name, .. }
                if owner == class && name == CONSTRUCTOR_NAME
        )
    }

    /// Mnemonic for disassembly
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Load { .. } => "LOAD",
            Instruction::Store { .. } => "STORE",
            Instruction::Increment { .. } => "INC",
            Instruction::Const { .. } => "CONST",
            Instruction::GetField { .. } => "GETFIELD",
            Instruction::PutField { .. } => "PUTFIELD",
            Instruction::GetStatic { .. } => "GETSTATIC",
            Instruction::PutStatic { .. } => "PUTSTATIC",
            Instruction::Invoke { kind, .. } => kind.name(),
            Instruction::New { .. } => "NEW",
            Instruction::CheckCast { .. } => "CHECKCAST",
            Instruction::Dup => "DUP",
            Instruction::Pop => "POP",
            Instruction::Arithmetic { op, .. } => op.name(),
            Instruction::Compare { .. } => "CMP",
            Instruction::RawBits { .. } => "RAWBITS",
            Instruction::Goto { .. } => "GOTO",
            Instruction::If { .. } => "IF",
            Instruction::IfCmp { .. } => "IFCMP",
            Instruction::IfNull { is_null: true, .. } => "IFNULL",
            Instruction::IfNull { is_null: false, .. } => "IFNONNULL",
            Instruction::Switch { .. } => "SWITCH",
            Instruction::Return { .. } => "RETURN",
            Instruction::Throw => "THROW",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match self {
            Instruction::Load { kind, slot } | Instruction::Store { kind, slot } => {
                write!(f, " {} {}", kind.name(), slot)
            }
            Instruction::Increment { slot, delta } => write!(f, " {} {}", slot, delta),
            Instruction::Const { value } => write!(f, " {}", value),
            Instruction::GetField { owner, name, ty }
            | Instruction::PutField { owner, name, ty }
            | Instruction::GetStatic { owner, name, ty }
            | Instruction::PutStatic { owner, name, ty } => {
                write!(f, " {}.{} : {}", owner, name, ty)
            }
            Instruction::Invoke {
                owner,
                name,
                signature,
                ..
            } => write!(f, " {}.{}{}", owner, name, signature),
            Instruction::New { class } | Instruction::CheckCast { class } => {
                write!(f, " {}", class)
            }
            Instruction::Arithmetic { kind, .. } | Instruction::Compare { kind } => {
                write!(f, " {}", kind.name())
            }
            Instruction::RawBits { kind } => write!(f, " {}", kind),
            Instruction::Goto { target } | Instruction::IfNull { target, .. } => {
                write!(f, " @{}", target)
            }
            Instruction::If { cond, target } => write!(f, " {} @{}", cond.name(), target),
            Instruction::IfCmp { kind, cond, target } => {
                write!(f, " {} {} @{}", kind.name(), cond.name(), target)
            }
            Instruction::Switch { targets, default } => {
                let targets: Vec<String> = targets.iter().map(|t| format!("@{}", t)).collect();
                write!(f, " [{}] default @{}", targets.join(", "), default)
            }
            Instruction::Return { kind: Some(kind) } => write!(f, " {}", kind.name()),
            _ => Ok(()),
        }
    }
}
