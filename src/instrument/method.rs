//! Method instrumentation
//!
//! Rewrites one method body in four steps:
//! 1. field accesses to lazy fields of storage classes become accessor calls
//! 2. calls to entries gain the current contract as trailing caller argument
//! 3. entries gain a trailing caller parameter
//! 4. entries record their caller (and amount) in a prologue

use crate::bytecode::{
    ClassDescriptor, FieldType, Instruction, InstructionSequence, InvokeKind, MethodDescriptor,
    MethodSignature, ValueKind,
};
use crate::instrument::error::{InstrumentationError, InstrumentationResult};
use crate::instrument::injection::find_injection_point;
use crate::instrument::names;
use crate::instrument::oracle::{MethodRole, TypeOracle};

pub struct MethodInstrumenter<'o, 'a> {
    oracle: &'o TypeOracle<'a>,
    class: &'o ClassDescriptor,
}

impl<'o, 'a> MethodInstrumenter<'o, 'a> {
    pub fn new(oracle: &'o TypeOracle<'a>, class: &'o ClassDescriptor) -> Self {
        Self { oracle, class }
    }

    /// Produce the instrumented version of `method`
    pub fn instrument(&self, method: &MethodDescriptor) -> InstrumentationResult<MethodDescriptor> {
        let role = self
            .oracle
            .method_role(&self.class.name, &method.name, &method.signature);
        self.check_entry(method, role)?;

        let mut output = method.clone();
        if role.is_entry() {
            output.signature = self.widen(&method.signature);
        }

        let Some(code) = &method.code else {
            return Ok(output);
        };

        let mut code = code.clone();
        self.redirect_field_accesses(&mut code)?;
        self.forward_entry_calls(method, &mut code)?;
        if role.is_entry() {
            self.inject_prologue(method, role, &mut code)?;
        }

        code.validate()
            .map_err(|source| InstrumentationError::InvalidCode {
                class: self.class.name.clone(),
                method: method.name.clone(),
                source,
            })?;
        output.code = Some(code);
        Ok(output)
    }

    fn check_entry(&self, method: &MethodDescriptor, role: MethodRole) -> InstrumentationResult<()> {
        let illegal = |reason: &str| {
            Err(InstrumentationError::illegal_entry(
                &self.class.name,
                &method.name,
                reason,
            ))
        };

        if !role.is_entry() {
            return Ok(());
        }
        if method.is_static() {
            return illegal("static methods cannot be entries");
        }
        if role == MethodRole::PayableEntry && method.signature.params.is_empty() {
            return illegal("payable entry declares no amount parameter");
        }
        if method.code.is_some() && !self.oracle.is_contract_type(&self.class.name) {
            return illegal("entries must be declared by contracts");
        }
        Ok(())
    }

    /// Signature with the trailing caller parameter
    fn widen(&self, signature: &MethodSignature) -> MethodSignature {
        signature.with_extra_param(FieldType::reference(
            self.oracle.config().contract_root.clone(),
        ))
    }

    // =========================================================================
    // Field Access Redirection
    // =========================================================================

    fn redirect_field_accesses(&self, code: &mut InstructionSequence) -> InstrumentationResult<()> {
        for index in 0..code.len() {
            let replacement = match code.get(index) {
                Some(Instruction::GetField { owner, name, ty }) => self
                    .accessor_for(owner, name, ty)?
                    .map(|declaring| {
                        Instruction::invoke(
                            InvokeKind::Special,
                            &declaring,
                            &names::getter(name),
                            MethodSignature::new(Vec::new(), Some(ty.clone())),
                        )
                    }),
                Some(Instruction::PutField { owner, name, ty }) => self
                    .accessor_for(owner, name, ty)?
                    .map(|declaring| {
                        Instruction::invoke(
                            InvokeKind::Special,
                            &declaring,
                            &names::setter(name),
                            MethodSignature::new(vec![ty.clone()], None),
                        )
                    }),
                _ => None,
            };

            if let Some(call) = replacement {
                code.replace(index, call);
            }
        }
        Ok(())
    }

    /// Declaring class of a lazy storage field accessed as `owner.name`
    fn accessor_for(
        &self,
        owner: &str,
        name: &str,
        ty: &FieldType,
    ) -> InstrumentationResult<Option<String>> {
        if !self.oracle.is_lazily_loaded(ty) || !self.oracle.is_storage_type(owner) {
            return Ok(None);
        }

        let Some((declaring, field)) = self.oracle.resolve_field(owner, name) else {
            if names::is_platform_field(name) {
                return Ok(None);
            }
            return Err(InstrumentationError::unresolvable(
                owner,
                format!("field {} accessed in {}", name, self.class.name),
            ));
        };

        Ok(field.is_persistent().then_some(declaring))
    }

    // =========================================================================
    // Entry Call Forwarding
    // =========================================================================

    fn forward_entry_calls(
        &self,
        method: &MethodDescriptor,
        code: &mut InstructionSequence,
    ) -> InstrumentationResult<()> {
        let mut index = 0;
        while index < code.len() {
            let widened = match code.get(index) {
                Some(Instruction::Invoke {
                    kind,
                    owner,
                    name,
                    signature,
                }) if self.oracle.method_role(owner, name, signature).is_entry() => {
                    if method.is_static() {
                        return Err(InstrumentationError::illegal_entry(
                            &self.class.name,
                            &method.name,
                            format!("calls entry {}.{} without a contract receiver", owner, name),
                        ));
                    }
                    Some(Instruction::invoke(*kind, owner, name, self.widen(signature)))
                }
                _ => None,
            };

            match widened {
                Some(call) => {
                    code.replace(index, call);
                    code.insert(index, vec![Instruction::load_this()], true);
                    index += 2;
                }
                None => index += 1,
            }
        }
        Ok(())
    }

    // =========================================================================
    // Entry Prologue
    // =========================================================================

    fn inject_prologue(
        &self,
        method: &MethodDescriptor,
        role: MethodRole,
        code: &mut InstructionSequence,
    ) -> InstrumentationResult<()> {
        let config = self.oracle.config();
        let caller_slot = u16::try_from(method.first_free_slot()).map_err(|_| {
            InstrumentationError::illegal_entry(
                &self.class.name,
                &method.name,
                "too many parameters for a caller slot",
            )
        })?;

        let at = if method.is_constructor() {
            let superclass = self.class.superclass.as_deref().ok_or_else(|| {
                InstrumentationError::malformed(
                    &self.class.name,
                    &method.name,
                    "constructor of a class without superclass",
                )
            })?;
            find_injection_point(&self.class.name, &method.name, code, superclass, caller_slot)?
        } else {
            0
        };

        let contract = FieldType::reference(config.contract_root.clone());
        let mut prologue = vec![
            Instruction::load_this(),
            Instruction::load(ValueKind::Reference, caller_slot),
        ];
        if let Some(expected) = self
            .oracle
            .entry_caller_type(&self.class.name, &method.name, &method.signature)
            .filter(|expected| *expected != config.contract_root)
        {
            prologue.push(Instruction::CheckCast { class: expected });
        }

        let hook = match role {
            MethodRole::PayableEntry => {
                let amount = method.signature.params[0].clone();
                prologue.push(Instruction::load(amount.value_kind(), 1));
                Instruction::invoke(
                    InvokeKind::Special,
                    &config.contract_root,
                    names::PAYABLE_ENTRY_HOOK,
                    MethodSignature::new(vec![contract, amount], None),
                )
            }
            _ => Instruction::invoke(
                InvokeKind::Special,
                &config.contract_root,
                names::ENTRY_HOOK,
                MethodSignature::new(vec![contract], None),
            ),
        };
        prologue.push(hook);

        log::debug!(
            "Injecting {:?} prologue into {}.{}{} at {}",
            role,
            self.class.name,
            method.name,
            method.signature,
            at
        );
        code.insert(at, prologue, false);
        Ok(())
    }
}
