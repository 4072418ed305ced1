//! Type oracle
//!
//! Answers hierarchy questions against the class index: which classes are
//! storage or contract types, and which methods carry an entry annotation,
//! either directly or inherited through the override chain. Answers are
//! memoized; the index never changes, so memo entries are never invalidated.

use crate::bytecode::{Annotation, FieldDescriptor, FieldType, MethodDescriptor, MethodSignature};
use crate::instrument::config::{InstrumentationConfig, ShadowingRule};
use crate::instrument::index::ClassIndex;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Instrumentation applied to a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRole {
    Plain,
    Entry,
    PayableEntry,
}

impl MethodRole {
    pub fn is_entry(&self) -> bool {
        !matches!(self, MethodRole::Plain)
    }
}

/// (class, method, signature, annotation)
type AnnotationKey = (String, String, MethodSignature, String);

/// Memoizing oracle over an immutable class index
pub struct TypeOracle<'a> {
    index: &'a ClassIndex,
    config: &'a InstrumentationConfig,
    storage_types: RwLock<HashMap<String, bool>>,
    contract_types: RwLock<HashMap<String, bool>>,
    annotations: RwLock<HashMap<AnnotationKey, Option<Annotation>>>,
}

impl<'a> TypeOracle<'a> {
    pub fn new(index: &'a ClassIndex, config: &'a InstrumentationConfig) -> Self {
        Self {
            index,
            config,
            storage_types: RwLock::new(HashMap::new()),
            contract_types: RwLock::new(HashMap::new()),
            annotations: RwLock::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &'a ClassIndex {
        self.index
    }

    pub fn config(&self) -> &'a InstrumentationConfig {
        self.config
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Superclass of `name`. The contract root is known to extend the
    /// storage root even when no descriptor for it is indexed.
    pub fn superclass_of(&self, name: &str) -> Option<String> {
        match self.index.get(name) {
            Some(class) => class.superclass.clone(),
            None if name == self.config.contract_root => Some(self.config.storage_root.clone()),
            None => None,
        }
    }

    pub fn is_platform_storage_root(&self, name: &str) -> bool {
        self.config.is_platform_root(name)
    }

    pub fn is_storage_type(&self, name: &str) -> bool {
        self.descends_from(name, &self.config.storage_root, &self.storage_types)
    }

    pub fn is_contract_type(&self, name: &str) -> bool {
        self.descends_from(name, &self.config.contract_root, &self.contract_types)
    }

    fn descends_from(&self, name: &str, root: &str, cache: &RwLock<HashMap<String, bool>>) -> bool {
        if let Some(verdict) = cache.read().get(name) {
            return *verdict;
        }

        let mut chain: Vec<String> = Vec::new();
        let mut current = Some(name.to_string());
        let mut verdict = false;

        while let Some(class) = current {
            if class == root {
                verdict = true;
                break;
            }
            if let Some(known) = cache.read().get(&class) {
                verdict = *known;
                break;
            }
            if chain.contains(&class) {
                break;
            }
            current = self.superclass_of(&class);
            chain.push(class);
        }

        let mut cache = cache.write();
        for class in chain {
            cache.insert(class, verdict);
        }
        verdict
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Reference types other than the eager whitelist are loaded on demand
    pub fn is_lazily_loaded(&self, ty: &FieldType) -> bool {
        match ty {
            FieldType::Reference(class) => !self.config.eager_reference_types.contains(class),
            FieldType::Primitive(_) => false,
        }
    }

    /// Types whose values cannot reach further storage objects
    pub fn is_immutable_leaf(&self, ty: &FieldType) -> bool {
        match ty {
            FieldType::Reference(class) => self.config.immutable_leaf_types.contains(class),
            FieldType::Primitive(_) => true,
        }
    }

    /// Find the class declaring field `name`, searching from `owner` upwards
    pub fn resolve_field(&self, owner: &str, name: &str) -> Option<(String, FieldDescriptor)> {
        let mut current = Some(owner.to_string());
        let mut visited: Vec<String> = Vec::new();

        while let Some(class_name) = current {
            if visited.contains(&class_name) {
                return None;
            }
            let class = self.index.get(&class_name)?;
            if let Some(field) = class.field(name) {
                return Some((class_name, field.clone()));
            }
            current = class.superclass.clone();
            visited.push(class_name);
        }
        None
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    /// The annotation `kind` on `method` of `class`, declared there or inherited
    pub fn inherited_annotation(
        &self,
        class: &str,
        method: &str,
        signature: &MethodSignature,
        kind: &str,
    ) -> Option<Annotation> {
        let key = (
            class.to_string(),
            method.to_string(),
            signature.clone(),
            kind.to_string(),
        );
        if let Some(fact) = self.annotations.read().get(&key) {
            return fact.clone();
        }

        let fact = self.search_annotation(class, method, signature, kind);
        self.annotations.write().insert(key, fact.clone());
        fact
    }

    fn search_annotation(
        &self,
        class: &str,
        method: &str,
        signature: &MethodSignature,
        kind: &str,
    ) -> Option<Annotation> {
        let descriptor = self.index.get(class)?;

        match descriptor.method(method, signature) {
            Some(declared) => {
                if let Some(annotation) = declared.annotation(kind) {
                    return Some(annotation.clone());
                }
                if declared.is_constructor() || self.shadows(declared) {
                    return None;
                }
            }
            // Constructors are never inherited
            None if method == crate::bytecode::CONSTRUCTOR_NAME => return None,
            None => {}
        }

        descriptor
            .superclass
            .iter()
            .chain(descriptor.interfaces.iter())
            .find_map(|parent| self.inherited_annotation(parent, method, signature, kind))
    }

    fn shadows(&self, method: &MethodDescriptor) -> bool {
        match self.config.shadowing_rule {
            ShadowingRule::Private => method.is_private(),
            ShadowingRule::PrivateOrPackage => {
                method.is_private() || method.access.is_package_private()
            }
        }
    }

    pub fn has_inherited_annotation(
        &self,
        class: &str,
        method: &str,
        signature: &MethodSignature,
        kind: &str,
    ) -> bool {
        self.inherited_annotation(class, method, signature, kind)
            .is_some()
    }

    pub fn is_entry(&self, class: &str, method: &str, signature: &MethodSignature) -> bool {
        self.has_inherited_annotation(class, method, signature, &self.config.entry_annotation)
    }

    pub fn is_payable_entry(&self, class: &str, method: &str, signature: &MethodSignature) -> bool {
        self.has_inherited_annotation(class, method, signature, &self.config.payable_annotation)
    }

    pub fn method_role(&self, class: &str, method: &str, signature: &MethodSignature) -> MethodRole {
        if self.is_payable_entry(class, method, signature) {
            MethodRole::PayableEntry
        } else if self.is_entry(class, method, signature) {
            MethodRole::Entry
        } else {
            MethodRole::Plain
        }
    }

    /// Contract type an entry expects as caller, when its annotation names one
    pub fn entry_caller_type(
        &self,
        class: &str,
        method: &str,
        signature: &MethodSignature,
    ) -> Option<String> {
        self.inherited_annotation(class, method, signature, &self.config.entry_annotation)
            .and_then(|annotation| annotation.argument)
    }
}
