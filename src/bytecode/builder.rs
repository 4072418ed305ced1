//! Builder-style construction of output classes
//!
//! Instrumentation never mutates a parsed class in place. It starts a
//! `ClassBuilder` from the input, swaps in rewritten methods and appends
//! synthetic members, then builds a fresh descriptor.

use crate::bytecode::class::{ClassDescriptor, FieldDescriptor, MethodDescriptor};

/// Accumulates the members of an output class
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    class: ClassDescriptor,
}

impl ClassBuilder {
    /// Start from an input class, keeping its header and fields but no methods
    pub fn from_class(input: &ClassDescriptor) -> Self {
        let mut class = ClassDescriptor::new(input.name.clone(), input.superclass.clone());
        class.interfaces = input.interfaces.clone();
        class.access = input.access;
        class.fields = input.fields.clone();
        Self { class }
    }

    pub fn name(&self) -> &str {
        &self.class.name
    }

    /// Class as built so far
    pub fn current(&self) -> &ClassDescriptor {
        &self.class
    }

    pub fn add_field(&mut self, field: FieldDescriptor) -> &mut Self {
        self.class.fields.push(field);
        self
    }

    pub fn add_method(&mut self, method: MethodDescriptor) -> &mut Self {
        self.class.methods.push(method);
        self
    }

    pub fn build(self) -> ClassDescriptor {
        self.class
    }
}
