//! Command-line interface

pub mod commands;

pub use commands::{cmd_inspect, cmd_instrument, load_config, CliResult};
