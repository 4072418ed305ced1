//! Storage class augmentation
//!
//! Adds the synthetic members a storage class needs to be persisted:
//! shadow fields holding the last persisted values, loaded flags and
//! accessors for lazy fields, a deserialization constructor for eager
//! fields, and the update extraction method.

use crate::bytecode::{
    AccessFlags, ClassBuilder, ClassDescriptor, CodeBuilder, CodeError, Condition, Constant,
    FieldDescriptor, FieldType, Instruction, InstructionSequence, InvokeKind, MethodDescriptor,
    MethodSignature, PrimitiveKind, ValueKind, CONSTRUCTOR_NAME,
};
use crate::instrument::error::{InstrumentationError, InstrumentationResult};
use crate::instrument::fields::FieldClassification;
use crate::instrument::names;
use crate::instrument::oracle::TypeOracle;

pub struct ClassAugmenter<'o, 'a> {
    oracle: &'o TypeOracle<'a>,
    class: &'o ClassDescriptor,
}

impl<'o, 'a> ClassAugmenter<'o, 'a> {
    pub fn new(oracle: &'o TypeOracle<'a>, class: &'o ClassDescriptor) -> Self {
        Self { oracle, class }
    }

    /// Add every synthetic member of a storage class to `builder`
    pub fn augment(
        &self,
        builder: &mut ClassBuilder,
        classification: &FieldClassification,
    ) -> InstrumentationResult<()> {
        let own_eager: Vec<&FieldDescriptor> = classification.own_eager().collect();
        let lazy: Vec<&FieldDescriptor> = classification.lazy_fields.iter().collect();

        for field in own_eager.iter().chain(lazy.iter()) {
            add_field(
                builder,
                FieldDescriptor::new(names::shadow(&field.name), field.ty.clone(), AccessFlags::GENERATED),
            )?;
        }

        for field in &lazy {
            add_field(
                builder,
                FieldDescriptor::new(
                    names::loaded_flag(&field.name),
                    FieldType::BOOLEAN,
                    AccessFlags::GENERATED,
                ),
            )?;
            let ensure_loaded = self.ensure_loaded(field)?;
            add_method(builder, ensure_loaded)?;
            let getter = self.getter(field)?;
            add_method(builder, getter)?;
            let setter = self.setter(field)?;
            add_method(builder, setter)?;
        }

        let constructor = self.deserialization_constructor(classification)?;
        add_method(builder, constructor)?;
        let extract = self.extract_updates(&own_eager, &lazy)?;
        add_method(builder, extract)?;

        log::debug!(
            "Augmented storage class {} ({} eager, {} lazy fields)",
            self.class.name,
            own_eager.len(),
            lazy.len()
        );
        Ok(())
    }

    fn code_error(&self, method: &str) -> impl Fn(CodeError) -> InstrumentationError + '_ {
        let method = method.to_string();
        move |source| InstrumentationError::InvalidCode {
            class: self.class.name.clone(),
            method: method.clone(),
            source,
        }
    }

    fn this_field(&self, name: &str, ty: &FieldType) -> [Instruction; 2] {
        [
            Instruction::load_this(),
            Instruction::get_field(&self.class.name, name, ty),
        ]
    }

    // =========================================================================
    // Lazy Fields
    // =========================================================================

    /// Load the persisted value of `field` on first use of a deserialized object
    fn ensure_loaded(&self, field: &FieldDescriptor) -> InstrumentationResult<MethodDescriptor> {
        let config = self.oracle.config();
        let name = names::ensure_loaded(&field.name);
        let error = self.code_error(&name);
        let class = self.class.name.as_str();
        let string = FieldType::reference(config.string_type.clone());
        let fetch = MethodSignature::new(
            vec![string.clone(), string.clone(), string],
            Some(FieldType::reference(config.object_type.clone())),
        );

        let mut code = CodeBuilder::new();
        code.emit(Instruction::load_this())
            .emit(Instruction::get_field(
                &config.storage_root,
                names::IN_STORAGE,
                &FieldType::BOOLEAN,
            ))
            .emit_branch(
                Instruction::If {
                    cond: Condition::Eq,
                    target: 0,
                },
                "done",
            )
            .emit(Instruction::load_this())
            .emit(Instruction::get_field(
                class,
                &names::loaded_flag(&field.name),
                &FieldType::BOOLEAN,
            ))
            .emit_branch(
                Instruction::If {
                    cond: Condition::Ne,
                    target: 0,
                },
                "done",
            )
            .emit(Instruction::load_this())
            .emit(Instruction::constant(Constant::Int(1)))
            .emit(Instruction::put_field(
                class,
                &names::loaded_flag(&field.name),
                &FieldType::BOOLEAN,
            ))
            .emit(Instruction::load_this())
            .emit(Instruction::string(class))
            .emit(Instruction::string(field.name.as_str()))
            .emit(Instruction::string(field.ty.type_name()))
            .emit(Instruction::invoke(
                InvokeKind::Virtual,
                &config.storage_root,
                names::FETCH_LAST_UPDATE,
                fetch,
            ))
            .emit(Instruction::CheckCast {
                class: field.ty.type_name().to_string(),
            })
            .emit(Instruction::store(ValueKind::Reference, 1))
            .emit(Instruction::load_this())
            .emit(Instruction::load(ValueKind::Reference, 1))
            .emit(Instruction::put_field(class, &field.name, &field.ty))
            .emit(Instruction::load_this())
            .emit(Instruction::load(ValueKind::Reference, 1))
            .emit(Instruction::put_field(class, &names::shadow(&field.name), &field.ty));
        code.label("done").map_err(&error)?.emit(Instruction::ret(None));

        Ok(generated(
            name,
            MethodSignature::void(),
            code.finish().map_err(&error)?,
        ))
    }

    fn getter(&self, field: &FieldDescriptor) -> InstrumentationResult<MethodDescriptor> {
        let name = names::getter(&field.name);
        let mut code = CodeBuilder::new();
        code.emit(Instruction::load_this())
            .emit(self.ensure_loaded_call(field));
        for instruction in self.this_field(&field.name, &field.ty) {
            code.emit(instruction);
        }
        code.emit(Instruction::ret(Some(field.ty.value_kind())));

        let code = code.finish().map_err(self.code_error(&name))?;
        Ok(generated(
            name,
            MethodSignature::new(Vec::new(), Some(field.ty.clone())),
            code,
        ))
    }

    fn setter(&self, field: &FieldDescriptor) -> InstrumentationResult<MethodDescriptor> {
        let name = names::setter(&field.name);
        let mut code = CodeBuilder::new();
        code.emit(Instruction::load_this())
            .emit(self.ensure_loaded_call(field))
            .emit(Instruction::load_this())
            .emit(Instruction::load(field.ty.value_kind(), 1))
            .emit(Instruction::put_field(&self.class.name, &field.name, &field.ty))
            .emit(Instruction::ret(None));

        let code = code.finish().map_err(self.code_error(&name))?;
        Ok(generated(
            name,
            MethodSignature::new(vec![field.ty.clone()], None),
            code,
        ))
    }

    fn ensure_loaded_call(&self, field: &FieldDescriptor) -> Instruction {
        Instruction::invoke(
            InvokeKind::Special,
            &self.class.name,
            &names::ensure_loaded(&field.name),
            MethodSignature::void(),
        )
    }

    // =========================================================================
    // Deserialization Constructor
    // =========================================================================

    /// `<init>(reference, eager fields of every level...)`
    fn deserialization_constructor(
        &self,
        classification: &FieldClassification,
    ) -> InstrumentationResult<MethodDescriptor> {
        let config = self.oracle.config();
        let error = self.code_error(CONSTRUCTOR_NAME);
        let reference = FieldType::reference(config.storage_reference_type.clone());
        let superclass = self.superclass()?;

        let mut code = CodeBuilder::new();
        code.emit(Instruction::load_this())
            .emit(Instruction::load(ValueKind::Reference, 1));

        let mut slot: u16 = 2;
        let mut super_params = vec![reference.clone()];
        for field in classification.inherited_eager() {
            code.emit(Instruction::load(field.ty.value_kind(), slot));
            super_params.push(field.ty.clone());
            slot = next_slot(slot, &field.ty).ok_or_else(|| too_many_fields(&self.class.name))?;
        }
        code.emit(Instruction::invoke(
            InvokeKind::Special,
            superclass,
            CONSTRUCTOR_NAME,
            MethodSignature::new(super_params, None),
        ));

        for field in classification.own_eager() {
            for target in [field.name.clone(), names::shadow(&field.name)] {
                code.emit(Instruction::load_this())
                    .emit(Instruction::load(field.ty.value_kind(), slot))
                    .emit(Instruction::put_field(&self.class.name, &target, &field.ty));
            }
            slot = next_slot(slot, &field.ty).ok_or_else(|| too_many_fields(&self.class.name))?;
        }
        code.emit(Instruction::ret(None));

        let params = std::iter::once(reference)
            .chain(classification.all_eager().map(|f| f.ty.clone()))
            .collect();
        Ok(MethodDescriptor::new(
            CONSTRUCTOR_NAME,
            MethodSignature::new(params, None),
            AccessFlags::PUBLIC | AccessFlags::SYNTHETIC,
            Some(code.finish().map_err(&error)?),
        ))
    }

    fn superclass(&self) -> InstrumentationResult<&'o str> {
        self.class.superclass.as_deref().ok_or_else(|| {
            InstrumentationError::unresolvable(&self.class.name, "storage class without superclass")
        })
    }

    // =========================================================================
    // Update Extraction
    // =========================================================================

    /// `§extractUpdates(accumulator)`: report every field that differs from its shadow
    fn extract_updates(
        &self,
        eager: &[&FieldDescriptor],
        lazy: &[&FieldDescriptor],
    ) -> InstrumentationResult<MethodDescriptor> {
        let config = self.oracle.config();
        let error = self.code_error(names::EXTRACT_UPDATES);
        let accumulator = FieldType::reference(config.update_accumulator.clone());
        let signature = MethodSignature::new(vec![accumulator], None);
        let superclass = self.superclass()?;

        let mut code = CodeBuilder::new();
        if !self.oracle.is_platform_storage_root(superclass) {
            code.emit(Instruction::load_this())
                .emit(Instruction::load(ValueKind::Reference, 1))
                .emit(Instruction::invoke(
                    InvokeKind::Special,
                    superclass,
                    names::EXTRACT_UPDATES,
                    signature.clone(),
                ));
        }

        for field in eager.iter().chain(lazy) {
            let recurse = !self.oracle.is_immutable_leaf(&field.ty);
            self.emit_field_update(&mut code, field, recurse)
                .map_err(&error)?;
        }
        code.emit(Instruction::ret(None));

        Ok(generated(
            names::EXTRACT_UPDATES.to_string(),
            signature,
            code.finish().map_err(&error)?,
        ))
    }

    /// Compare `field` with its shadow and, if it changed, report it and refresh the shadow
    fn emit_field_update(
        &self,
        code: &mut CodeBuilder,
        field: &FieldDescriptor,
        recurse: bool,
    ) -> Result<(), CodeError> {
        let config = self.oracle.config();
        let class = self.class.name.as_str();
        let shadow = names::shadow(&field.name);
        let unchanged = format!("unchanged_{}", field.name);
        let string = FieldType::reference(config.string_type.clone());
        let object = FieldType::reference(config.object_type.clone());

        let current = self.this_field(&field.name, &field.ty);
        let previous = self.this_field(&shadow, &field.ty);
        match &field.ty {
            FieldType::Primitive(kind) if kind.is_int_like() => {
                emit_all(code, current);
                emit_all(code, previous);
                code.emit_branch(if_cmp(ValueKind::Int), &unchanged);
            }
            FieldType::Primitive(PrimitiveKind::Long) => {
                emit_all(code, current);
                emit_all(code, previous);
                code.emit(Instruction::Compare {
                    kind: ValueKind::Long,
                })
                .emit_branch(if_zero(), &unchanged);
            }
            FieldType::Primitive(PrimitiveKind::Float) => {
                emit_all(code, current);
                code.emit(Instruction::RawBits {
                    kind: PrimitiveKind::Float,
                });
                emit_all(code, previous);
                code.emit(Instruction::RawBits {
                    kind: PrimitiveKind::Float,
                })
                .emit_branch(if_cmp(ValueKind::Int), &unchanged);
            }
            FieldType::Primitive(_) => {
                emit_all(code, current);
                code.emit(Instruction::RawBits {
                    kind: PrimitiveKind::Double,
                });
                emit_all(code, previous);
                code.emit(Instruction::RawBits {
                    kind: PrimitiveKind::Double,
                })
                .emit(Instruction::Compare {
                    kind: ValueKind::Long,
                })
                .emit_branch(if_zero(), &unchanged);
            }
            FieldType::Reference(_) => {
                emit_all(code, current);
                emit_all(code, previous);
                code.emit_branch(if_cmp(ValueKind::Reference), &unchanged);
            }
        }

        if recurse {
            code.emit(Instruction::load(ValueKind::Reference, 1));
            emit_all(code, self.this_field(&field.name, &field.ty));
            code.emit(Instruction::invoke(
                InvokeKind::Virtual,
                &config.update_accumulator,
                names::RECURSIVE_EXTRACT,
                MethodSignature::new(vec![object.clone()], None),
            ));
        }

        let value_type = match &field.ty {
            FieldType::Primitive(_) => field.ty.clone(),
            FieldType::Reference(_) => object,
        };
        code.emit(Instruction::load(ValueKind::Reference, 1))
            .emit(Instruction::load_this())
            .emit(Instruction::get_field(
                &config.storage_root,
                names::STORAGE_REFERENCE,
                &FieldType::reference(config.storage_reference_type.clone()),
            ))
            .emit(Instruction::string(class))
            .emit(Instruction::string(field.name.as_str()))
            .emit(Instruction::string(field.ty.tag()));
        emit_all(code, self.this_field(&field.name, &field.ty));
        code.emit(Instruction::invoke(
            InvokeKind::Virtual,
            &config.update_accumulator,
            names::RECORD_UPDATE,
            MethodSignature::new(
                vec![
                    FieldType::reference(config.storage_reference_type.clone()),
                    string.clone(),
                    string.clone(),
                    string,
                    value_type,
                ],
                None,
            ),
        ));

        code.emit(Instruction::load_this());
        emit_all(code, self.this_field(&field.name, &field.ty));
        code.emit(Instruction::put_field(class, &shadow, &field.ty));
        code.label(&unchanged)?;
        Ok(())
    }
}

fn emit_all<const N: usize>(code: &mut CodeBuilder, instructions: [Instruction; N]) {
    for instruction in instructions {
        code.emit(instruction);
    }
}

fn if_cmp(kind: ValueKind) -> Instruction {
    Instruction::IfCmp {
        kind,
        cond: Condition::Eq,
        target: 0,
    }
}

fn if_zero() -> Instruction {
    Instruction::If {
        cond: Condition::Eq,
        target: 0,
    }
}

fn next_slot(slot: u16, ty: &FieldType) -> Option<u16> {
    slot.checked_add(ty.size() as u16)
}

fn too_many_fields(class: &str) -> InstrumentationError {
    InstrumentationError::unresolvable(class, "too many eager fields for a constructor")
}

fn generated(name: String, signature: MethodSignature, code: InstructionSequence) -> MethodDescriptor {
    MethodDescriptor::new(name, signature, AccessFlags::GENERATED, Some(code))
}

fn add_field(builder: &mut ClassBuilder, field: FieldDescriptor) -> InstrumentationResult<()> {
    if builder.current().has_member(&field.name, None) {
        return Err(InstrumentationError::DuplicateMember {
            class: builder.name().to_string(),
            member: field.name,
        });
    }
    builder.add_field(field);
    Ok(())
}

fn add_method(builder: &mut ClassBuilder, method: MethodDescriptor) -> InstrumentationResult<()> {
    if builder
        .current()
        .has_member(&method.name, Some(&method.signature))
    {
        return Err(InstrumentationError::DuplicateMember {
            class: builder.name().to_string(),
            member: format!("{}{}", method.name, method.signature),
        });
    }
    builder.add_method(method);
    Ok(())
}
