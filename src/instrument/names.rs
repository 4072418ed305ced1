//! Names of the members added by instrumentation
//!
//! Every synthetic name starts with `§`, which cannot occur in source
//! identifiers, so generated members never collide with user members of
//! an uninstrumented class.

pub const SYNTHETIC_PREFIX: char = '§';

/// Update extraction method of every storage class
pub const EXTRACT_UPDATES: &str = "§extractUpdates";

// Members of the platform types called by generated code
pub const IN_STORAGE: &str = "inStorage";
pub const STORAGE_REFERENCE: &str = "storageReference";
pub const FETCH_LAST_UPDATE: &str = "fetchLastUpdateFor";
pub const RECORD_UPDATE: &str = "recordUpdate";
pub const RECURSIVE_EXTRACT: &str = "recursiveExtract";
pub const ENTRY_HOOK: &str = "entry";
pub const PAYABLE_ENTRY_HOOK: &str = "payableEntry";

pub fn shadow(field: &str) -> String {
    format!("{}old_{}", SYNTHETIC_PREFIX, field)
}

pub fn loaded_flag(field: &str) -> String {
    format!("{}loaded_{}", SYNTHETIC_PREFIX, field)
}

pub fn getter(field: &str) -> String {
    format!("{}get_{}", SYNTHETIC_PREFIX, field)
}

pub fn setter(field: &str) -> String {
    format!("{}set_{}", SYNTHETIC_PREFIX, field)
}

pub fn ensure_loaded(field: &str) -> String {
    format!("{}ensureLoaded_{}", SYNTHETIC_PREFIX, field)
}

/// Fields declared by the storage root itself
pub fn is_platform_field(name: &str) -> bool {
    name == IN_STORAGE || name == STORAGE_REFERENCE
}

pub fn is_synthetic(name: &str) -> bool {
    name.starts_with(SYNTHETIC_PREFIX)
}
