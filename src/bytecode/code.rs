//! Instruction sequences and code assembly
//!
//! `InstructionSequence` is the unit rewritten by the method instrumenter.
//! `CodeBuilder` assembles fresh method bodies with symbolic labels that are
//! resolved in a second pass.

use crate::bytecode::instruction::Instruction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Code assembly and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("Branch at {at} targets {target}, outside code of length {len}")]
    InvalidTarget { at: usize, target: usize, len: usize },
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),
    #[error("Label defined twice: {0}")]
    DuplicateLabel(String),
}

// =============================================================================
// Instruction Sequence
// =============================================================================

/// Ordered instructions of one method body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
}

impl InstructionSequence {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Replace the instruction at `index` in place; branch targets are unaffected
    pub fn replace(&mut self, index: usize, instruction: Instruction) {
        self.instructions[index] = instruction;
    }

    /// Insert `code` before the instruction at `at`.
    ///
    /// Targets past `at` shift by the inserted length. Branches that targeted
    /// `at` itself jump to the inserted code when `redirect` is set, and keep
    /// jumping to the original instruction (skipping the insertion) otherwise.
    /// The inserted code must not contain branches.
    pub fn insert(&mut self, at: usize, code: Vec<Instruction>, redirect: bool) {
        let shift = code.len();
        if shift == 0 {
            return;
        }

        for instruction in &mut self.instructions {
            for target in instruction.targets_mut() {
                if *target > at || (*target == at && !redirect) {
                    *target += shift;
                }
            }
        }

        self.instructions.splice(at..at, code);
    }

    /// Check that every branch target lies on an instruction boundary
    pub fn validate(&self) -> Result<(), CodeError> {
        let len = self.instructions.len();
        for (at, instruction) in self.instructions.iter().enumerate() {
            let mut instruction = instruction.clone();
            for target in instruction.targets_mut() {
                if *target >= len {
                    return Err(CodeError::InvalidTarget {
                        at,
                        target: *target,
                        len,
                    });
                }
            }
        }
        Ok(())
    }
}

impl From<Vec<Instruction>> for InstructionSequence {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

// =============================================================================
// Code Builder
// =============================================================================

/// Assembler for generated method bodies
pub struct CodeBuilder {
    /// Output instructions
    code: Vec<Instruction>,
    /// Label positions
    labels: HashMap<String, usize>,
    /// Pending label references (position, label_name)
    label_refs: Vec<(usize, String)>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            labels: HashMap::new(),
            label_refs: Vec::new(),
        }
    }

    /// Append an instruction without branch targets
    pub fn emit(&mut self, instruction: Instruction) -> &mut Self {
        self.code.push(instruction);
        self
    }

    /// Append a branch whose targets will be patched to `label`
    pub fn emit_branch(&mut self, instruction: Instruction, label: &str) -> &mut Self {
        self.label_refs.push((self.code.len(), label.to_string()));
        self.code.push(instruction);
        self
    }

    /// Bind `label` to the next emitted instruction
    pub fn label(&mut self, label: &str) -> Result<&mut Self, CodeError> {
        if self.labels.insert(label.to_string(), self.code.len()).is_some() {
            return Err(CodeError::DuplicateLabel(label.to_string()));
        }
        Ok(self)
    }

    /// Resolve label references and produce the sequence
    pub fn finish(mut self) -> Result<InstructionSequence, CodeError> {
        for (pos, label) in &self.label_refs {
            let addr = *self
                .labels
                .get(label)
                .ok_or_else(|| CodeError::UndefinedLabel(label.clone()))?;
            for target in self.code[*pos].targets_mut() {
                *target = addr;
            }
        }

        let sequence = InstructionSequence::new(self.code);
        sequence.validate()?;
        Ok(sequence)
    }
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Disassemble code to readable format
pub fn disassemble(code: &InstructionSequence) -> String {
    let mut output = String::new();
    for (pc, instruction) in code.iter().enumerate() {
        output.push_str(&format!("{:04}: {}\n", pc, instruction));
    }
    output
}
