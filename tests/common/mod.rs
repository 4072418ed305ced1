#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: hand-written fixture classes and archive helpers
//! - `interpreter`: a reference interpreter that runs instrumented code

pub mod fixtures;
pub mod interpreter;

pub use fixtures::{archive_of, counter, customer, instrument_all, shop, string};
pub use interpreter::{EntryCall, Interpreter, RecordedUpdate, Value};
