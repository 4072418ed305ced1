//! Reference interpreter for instrumented code.
//!
//! Runs method bodies on an operand stack with a program counter, the way
//! the contract VM steps through bytecode. Platform types are not loaded as
//! classes; their methods are native hooks that record what generated code
//! asks of the runtime.

use std::cmp::Ordering;
use std::collections::HashMap;
use storage_instrumenter::bytecode::{
    ArithOp, ClassDescriptor, Condition, Constant, FieldType, Instruction, InvokeKind,
    MethodDescriptor, MethodSignature, PrimitiveKind, ValueKind,
};
use storage_instrumenter::instrument::InstrumentationConfig;
use thiserror::Error;

/// Upper bound on executed instructions per call
const STEP_LIMIT: usize = 100_000;

#[derive(Error, Debug)]
pub enum VmError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Type mismatch: expected {0}")]
    TypeMismatch(&'static str),
    #[error("Uninitialized local {0}")]
    UninitializedLocal(u16),
    #[error("Invalid object reference")]
    InvalidReference,
    #[error("No method {0}")]
    NoSuchMethod(String),
    #[error("Unsupported instruction: {0}")]
    Unsupported(String),
    #[error("Control left the code")]
    FellOffCode,
    #[error("Exception thrown")]
    Thrown,
    #[error("Step limit exceeded")]
    StepLimit,
}

/// A runtime value; wide values take a single stack entry
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Object(usize),
}

impl Value {
    fn default_for(ty: &FieldType) -> Self {
        match ty.value_kind() {
            ValueKind::Int => Value::Int(0),
            ValueKind::Long => Value::Long(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::Reference => Value::Null,
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    fn as_int(&self) -> Result<i32, VmError> {
        match self {
            Value::Int(v) => Ok(*v),
            _ => Err(VmError::TypeMismatch("int")),
        }
    }

    fn as_str(&self) -> Result<&str, VmError> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(VmError::TypeMismatch("string")),
        }
    }
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Self {
        match constant {
            Constant::Null => Value::Null,
            Constant::Int(v) => Value::Int(v),
            Constant::Long(v) => Value::Long(v),
            Constant::Float(v) => Value::Float(v),
            Constant::Double(v) => Value::Double(v),
            Constant::String(s) => Value::Str(s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeapObject {
    pub class: String,
    pub fields: HashMap<String, Value>,
}

/// A `recordUpdate` call seen by the accumulator
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub reference: Value,
    pub class: String,
    pub field: String,
    pub tag: String,
    pub value: Value,
}

/// An `entry` or `payableEntry` prologue call
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCall {
    pub callee: Value,
    pub caller: Value,
    pub amount: Option<Value>,
}

enum Target {
    Code(MethodDescriptor),
    Native(String),
}

pub struct Interpreter {
    classes: HashMap<String, ClassDescriptor>,
    config: InstrumentationConfig,
    pub heap: Vec<HeapObject>,
    /// Values returned by `fetchLastUpdateFor`, by (class, field)
    pub persisted: HashMap<(String, String), Value>,
    /// (class, field, type) of every `fetchLastUpdateFor` call
    pub fetches: Vec<(String, String, String)>,
    pub updates: Vec<RecordedUpdate>,
    pub extracted: Vec<Value>,
    pub entries: Vec<EntryCall>,
}

impl Interpreter {
    pub fn new(classes: Vec<ClassDescriptor>) -> Self {
        Self {
            classes: classes.into_iter().map(|c| (c.name.clone(), c)).collect(),
            config: InstrumentationConfig::default(),
            heap: Vec::new(),
            persisted: HashMap::new(),
            fetches: Vec::new(),
            updates: Vec::new(),
            extracted: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn allocate(&mut self, class: &str) -> Value {
        self.heap.push(HeapObject {
            class: class.to_string(),
            fields: HashMap::new(),
        });
        Value::Object(self.heap.len() - 1)
    }

    pub fn field(&self, object: &Value, name: &str) -> Option<Value> {
        match object {
            Value::Object(id) => self.heap.get(*id)?.fields.get(name).cloned(),
            _ => None,
        }
    }

    /// Allocate `class` and run its constructor with `signature`
    pub fn construct(
        &mut self,
        class: &str,
        signature: MethodSignature,
        args: Vec<Value>,
    ) -> Result<Value, VmError> {
        let object = self.allocate(class);
        let mut all = vec![object.clone()];
        all.extend(args);
        self.invoke(InvokeKind::Special, class, "<init>", &signature, all)?;
        Ok(object)
    }

    /// Call `name` on `receiver` with virtual dispatch
    pub fn call(
        &mut self,
        receiver: &Value,
        name: &str,
        signature: MethodSignature,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let class = self.class_of(receiver)?;
        let mut all = vec![receiver.clone()];
        all.extend(args);
        self.invoke(InvokeKind::Virtual, &class, name, &signature, all)
    }

    /// `args` includes the receiver for non-static calls
    pub fn invoke(
        &mut self,
        kind: InvokeKind,
        owner: &str,
        name: &str,
        signature: &MethodSignature,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let start = match kind {
            InvokeKind::Virtual | InvokeKind::Interface => {
                self.class_of(args.first().ok_or(VmError::StackUnderflow)?)?
            }
            InvokeKind::Special | InvokeKind::Static => owner.to_string(),
        };

        match self.resolve(&start, name, signature)? {
            Target::Code(method) => self.execute(&method, args),
            Target::Native(class) => self.native(&class, name, args),
        }
    }

    fn class_of(&self, value: &Value) -> Result<String, VmError> {
        match value {
            Value::Object(id) => self
                .heap
                .get(*id)
                .map(|o| o.class.clone())
                .ok_or(VmError::InvalidReference),
            Value::Str(_) => Ok(self.config.string_type.clone()),
            _ => Err(VmError::InvalidReference),
        }
    }

    fn resolve(&self, start: &str, name: &str, signature: &MethodSignature) -> Result<Target, VmError> {
        let mut current = start.to_string();
        loop {
            let Some(class) = self.classes.get(&current) else {
                return Ok(Target::Native(current));
            };
            if let Some(method) = class.method(name, signature).filter(|m| m.code.is_some()) {
                return Ok(Target::Code(method.clone()));
            }
            current = class
                .superclass
                .clone()
                .ok_or_else(|| VmError::NoSuchMethod(format!("{}.{}{}", start, name, signature)))?;
        }
    }

    // =========================================================================
    // Platform Hooks
    // =========================================================================

    fn native(&mut self, class: &str, name: &str, args: Vec<Value>) -> Result<Option<Value>, VmError> {
        let config = self.config.clone();
        let is_root = class == config.storage_root || class == config.contract_root;

        match name {
            "<init>" if is_root => {
                let this = args.first().ok_or(VmError::StackUnderflow)?.clone();
                match args.get(1) {
                    Some(reference) => {
                        self.set_field(&this, "storageReference", reference.clone())?;
                        self.set_field(&this, "inStorage", Value::Int(1))?;
                    }
                    None => self.set_field(&this, "inStorage", Value::Int(0))?,
                }
                Ok(None)
            }
            "<init>" if class == config.object_type => Ok(None),
            "fetchLastUpdateFor" if is_root => {
                let owner = args[1].as_str()?.to_string();
                let field = args[2].as_str()?.to_string();
                let ty = args[3].as_str()?.to_string();
                let value = self
                    .persisted
                    .get(&(owner.clone(), field.clone()))
                    .cloned()
                    .unwrap_or(Value::Null);
                self.fetches.push((owner, field, ty));
                Ok(Some(value))
            }
            "entry" if class == config.contract_root => {
                self.entries.push(EntryCall {
                    callee: args[0].clone(),
                    caller: args[1].clone(),
                    amount: None,
                });
                Ok(None)
            }
            "payableEntry" if class == config.contract_root => {
                self.entries.push(EntryCall {
                    callee: args[0].clone(),
                    caller: args[1].clone(),
                    amount: Some(args[2].clone()),
                });
                Ok(None)
            }
            "recordUpdate" if class == config.update_accumulator => {
                self.updates.push(RecordedUpdate {
                    reference: args[1].clone(),
                    class: args[2].as_str()?.to_string(),
                    field: args[3].as_str()?.to_string(),
                    tag: args[4].as_str()?.to_string(),
                    value: args[5].clone(),
                });
                Ok(None)
            }
            "recursiveExtract" if class == config.update_accumulator => {
                self.extracted.push(args[1].clone());
                Ok(None)
            }
            _ => Err(VmError::NoSuchMethod(format!("{}.{}", class, name))),
        }
    }

    fn set_field(&mut self, object: &Value, name: &str, value: Value) -> Result<(), VmError> {
        match object {
            Value::Object(id) => {
                let object = self.heap.get_mut(*id).ok_or(VmError::InvalidReference)?;
                object.fields.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(VmError::InvalidReference),
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    fn execute(&mut self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Option<Value>, VmError> {
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| VmError::NoSuchMethod(method.name.clone()))?;

        let mut locals: HashMap<u16, Value> = HashMap::new();
        let mut next: u16 = 0;
        for arg in args {
            let width = if arg.is_wide() { 2 } else { 1 };
            locals.insert(next, arg);
            next += width;
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;
        for _ in 0..STEP_LIMIT {
            let instruction = code.get(pc).ok_or(VmError::FellOffCode)?.clone();
            pc += 1;

            match instruction {
                Instruction::Load { slot, .. } => {
                    let value = locals
                        .get(&slot)
                        .cloned()
                        .ok_or(VmError::UninitializedLocal(slot))?;
                    stack.push(value);
                }
                Instruction::Store { slot, .. } => {
                    let value = pop(&mut stack)?;
                    locals.insert(slot, value);
                }
                Instruction::Increment { slot, delta } => {
                    let value = locals
                        .get(&slot)
                        .ok_or(VmError::UninitializedLocal(slot))?
                        .as_int()?;
                    locals.insert(slot, Value::Int(value.wrapping_add(delta)));
                }
                Instruction::Const { value } => stack.push(value.into()),
                Instruction::GetField { name, ty, .. } => {
                    let object = pop(&mut stack)?;
                    let value = self
                        .field(&object, &name)
                        .unwrap_or_else(|| Value::default_for(&ty));
                    stack.push(value);
                }
                Instruction::PutField { name, .. } => {
                    let value = pop(&mut stack)?;
                    let object = pop(&mut stack)?;
                    self.set_field(&object, &name, value)?;
                }
                Instruction::Invoke {
                    kind,
                    owner,
                    name,
                    signature,
                } => {
                    let count = signature.params.len() + usize::from(kind.has_receiver());
                    if stack.len() < count {
                        return Err(VmError::StackUnderflow);
                    }
                    let args = stack.split_off(stack.len() - count);
                    if let Some(result) = self.invoke(kind, &owner, &name, &signature, args)? {
                        stack.push(result);
                    }
                }
                Instruction::New { class } => {
                    let object = self.allocate(&class);
                    stack.push(object);
                }
                Instruction::CheckCast { .. } => {}
                Instruction::Dup => {
                    let top = stack.last().cloned().ok_or(VmError::StackUnderflow)?;
                    stack.push(top);
                }
                Instruction::Pop => {
                    pop(&mut stack)?;
                }
                Instruction::Arithmetic { op, .. } => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(arithmetic(op, a, b)?);
                }
                Instruction::Compare { .. } => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    let ordering = match (a, b) {
                        (Value::Long(a), Value::Long(b)) => a.cmp(&b),
                        (Value::Float(a), Value::Float(b)) => {
                            a.partial_cmp(&b).unwrap_or(Ordering::Greater)
                        }
                        (Value::Double(a), Value::Double(b)) => {
                            a.partial_cmp(&b).unwrap_or(Ordering::Greater)
                        }
                        _ => return Err(VmError::TypeMismatch("long, float or double")),
                    };
                    stack.push(Value::Int(ordering as i32));
                }
                Instruction::RawBits { kind } => {
                    let value = pop(&mut stack)?;
                    let bits = match (kind, value) {
                        (PrimitiveKind::Float, Value::Float(f)) => Value::Int(f.to_bits() as i32),
                        (PrimitiveKind::Double, Value::Double(d)) => Value::Long(d.to_bits() as i64),
                        _ => return Err(VmError::TypeMismatch("float or double")),
                    };
                    stack.push(bits);
                }
                Instruction::Goto { target } => pc = target,
                Instruction::If { cond, target } => {
                    let value = pop(&mut stack)?.as_int()?;
                    if holds(cond, value.cmp(&0)) {
                        pc = target;
                    }
                }
                Instruction::IfCmp { kind, cond, target } => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    let taken = match kind {
                        ValueKind::Reference => match cond {
                            Condition::Eq => a == b,
                            Condition::Ne => a != b,
                            _ => return Err(VmError::Unsupported(format!("{:?} on references", cond))),
                        },
                        _ => holds(cond, a.as_int()?.cmp(&b.as_int()?)),
                    };
                    if taken {
                        pc = target;
                    }
                }
                Instruction::IfNull { is_null, target } => {
                    let value = pop(&mut stack)?;
                    if (value == Value::Null) == is_null {
                        pc = target;
                    }
                }
                Instruction::Switch { targets, default } => {
                    let value = pop(&mut stack)?.as_int()?;
                    pc = usize::try_from(value)
                        .ok()
                        .and_then(|i| targets.get(i).copied())
                        .unwrap_or(default);
                }
                Instruction::Return { kind } => {
                    return match kind {
                        Some(_) => Ok(Some(pop(&mut stack)?)),
                        None => Ok(None),
                    };
                }
                Instruction::Throw => return Err(VmError::Thrown),
                other @ (Instruction::GetStatic { .. } | Instruction::PutStatic { .. }) => {
                    return Err(VmError::Unsupported(other.to_string()))
                }
            }
        }
        Err(VmError::StepLimit)
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, VmError> {
    stack.pop().ok_or(VmError::StackUnderflow)
}

fn holds(cond: Condition, ordering: Ordering) -> bool {
    match cond {
        Condition::Eq => ordering == Ordering::Equal,
        Condition::Ne => ordering != Ordering::Equal,
        Condition::Lt => ordering == Ordering::Less,
        Condition::Ge => ordering != Ordering::Less,
        Condition::Gt => ordering == Ordering::Greater,
        Condition::Le => ordering != Ordering::Greater,
    }
}

fn arithmetic(op: ArithOp, a: Value, b: Value) -> Result<Value, VmError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => a.checked_div(b).ok_or(VmError::Thrown)?,
            ArithOp::Rem => a.checked_rem(b).ok_or(VmError::Thrown)?,
            ArithOp::And => a & b,
            ArithOp::Or => a | b,
            ArithOp::Xor => a ^ b,
        })),
        (Value::Long(a), Value::Long(b)) => Ok(Value::Long(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => a.checked_div(b).ok_or(VmError::Thrown)?,
            ArithOp::Rem => a.checked_rem(b).ok_or(VmError::Thrown)?,
            ArithOp::And => a & b,
            ArithOp::Or => a | b,
            ArithOp::Xor => a ^ b,
        })),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            _ => return Err(VmError::Unsupported(format!("{:?} on doubles", op))),
        })),
        _ => Err(VmError::TypeMismatch("matching numeric operands")),
    }
}
