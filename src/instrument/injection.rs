//! Constructor injection point
//!
//! The entry prologue of a constructor must run after the superclass
//! constructor returned, since it calls methods on `this`. The call is found
//! by simulating the operand stack height over every path from the start of
//! the constructor: the superclass constructor consumes the receiver loaded
//! by the first instruction, so it is the instruction that brings the height
//! back to zero.

use crate::bytecode::{Control, Instruction, InstructionSequence, ValueKind};
use crate::instrument::error::{InstrumentationError, InstrumentationResult};
use std::collections::{BTreeSet, HashSet};

/// Index at which the prologue of constructor `class.method` is injected.
///
/// `caller_slot` is the local slot of the caller parameter, which must not
/// be written before the superclass constructor call.
pub fn find_injection_point(
    class: &str,
    method: &str,
    code: &InstructionSequence,
    superclass: &str,
    caller_slot: u16,
) -> InstrumentationResult<usize> {
    let malformed = |reason: String| InstrumentationError::malformed(class, method, reason);

    match code.get(0) {
        Some(Instruction::Load {
            kind: ValueKind::Reference,
            slot: 0,
        }) => {}
        _ => {
            return Err(malformed(
                "constructor does not start by loading the receiver".to_string(),
            ))
        }
    }

    let mut worklist: Vec<(usize, usize)> = vec![(1, 1)];
    let mut visited: HashSet<(usize, usize)> = HashSet::new();
    let mut candidates: BTreeSet<usize> = BTreeSet::new();

    while let Some((index, height)) = worklist.pop() {
        if !visited.insert((index, height)) {
            continue;
        }

        let instruction = code.get(index).ok_or_else(|| {
            malformed("control reaches the end of the code before the superclass constructor".to_string())
        })?;

        if instruction.stored_slots().contains(&caller_slot) {
            return Err(malformed(format!(
                "caller slot {} written at instruction {} before the superclass constructor",
                caller_slot, index
            )));
        }

        if matches!(instruction.control(), Control::Indirect(_) | Control::Exit) {
            return Err(InstrumentationError::UnsupportedControlFlow {
                class: class.to_string(),
                method: method.to_string(),
                index,
            });
        }

        let effect = instruction.stack_effect();
        if effect.pops > height {
            return Err(malformed(format!("stack underflow at instruction {}", index)));
        }
        let after = height - effect.pops + effect.pushes;

        if after == 0 {
            if instruction.is_constructor_call_of(superclass) {
                candidates.insert(index);
                continue;
            }
            return Err(malformed(format!(
                "receiver consumed by instruction {} instead of the superclass constructor",
                index
            )));
        }

        match instruction.control() {
            Control::Jump(target) => worklist.push((target, after)),
            Control::Branch(target) => {
                worklist.push((index + 1, after));
                worklist.push((target, after));
            }
            _ => worklist.push((index + 1, after)),
        }
    }

    let mut candidates = candidates.into_iter();
    match (candidates.next(), candidates.next()) {
        (Some(call), None) => Ok(call + 1),
        (None, _) => Err(malformed(
            "no call to the superclass constructor".to_string(),
        )),
        (Some(first), Some(second)) => Err(malformed(format!(
            "several superclass constructor calls, at {} and {}",
            first, second
        ))),
    }
}
