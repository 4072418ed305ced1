//! Instrumentation configuration
//!
//! Names of the platform types and hooks the generated code talks to, plus
//! the knobs that decide which fields are loaded lazily.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Declarations that stop the search for inherited annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowingRule {
    /// Private declarations do not override and stop the search
    #[default]
    Private,
    /// Package-private declarations stop the search as well
    PrivateOrPackage,
}

/// Instrumentation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Root of all storage classes
    pub storage_root: String,
    /// Root of all contracts; type of the caller parameter
    pub contract_root: String,
    /// Collaborator passed to update extraction
    pub update_accumulator: String,
    /// Identity of a persisted object
    pub storage_reference_type: String,
    pub string_type: String,
    pub object_type: String,
    pub entry_annotation: String,
    pub payable_annotation: String,
    /// Reference types loaded eagerly, like primitives
    pub eager_reference_types: Vec<String>,
    /// Reference types whose values cannot reach further updates
    pub immutable_leaf_types: Vec<String>,
    pub shadowing_rule: ShadowingRule,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            storage_root: "runtime.Storage".to_string(),
            contract_root: "runtime.Contract".to_string(),
            update_accumulator: "runtime.Updates".to_string(),
            storage_reference_type: "runtime.StorageReference".to_string(),
            string_type: "lang.String".to_string(),
            object_type: "lang.Object".to_string(),
            entry_annotation: "runtime.Entry".to_string(),
            payable_annotation: "runtime.Payable".to_string(),
            eager_reference_types: vec!["lang.BigInteger".to_string()],
            immutable_leaf_types: vec!["lang.String".to_string(), "lang.BigInteger".to_string()],
            shadowing_rule: ShadowingRule::Private,
        }
    }
}

impl InstrumentationConfig {
    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Platform classes that end the ancestor walk of storage classes
    pub fn is_platform_root(&self, name: &str) -> bool {
        name == self.storage_root || name == self.contract_root
    }
}
