//! CLI commands for the instrumenter
//!
//! Implements the command handlers for the CLI interface.

use crate::archive::{class_entry_name, Archive};
use crate::bytecode::{disassemble, ClassDescriptor};
use crate::instrument::{instrument_file, names, InstrumentationConfig};
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> CliResult<InstrumentationConfig> {
    match path {
        Some(path) => Ok(InstrumentationConfig::from_file(path)?),
        None => Ok(InstrumentationConfig::default()),
    }
}

/// Instrument an archive
pub fn cmd_instrument(
    input: &Path,
    output: &Path,
    libs: &[PathBuf],
    config_path: Option<&Path>,
) -> CliResult<()> {
    let config = load_config(config_path)?;

    println!("🔧 Instrumenting {:?}", input);
    if !libs.is_empty() {
        println!("   📚 Dependencies: {}", libs.len());
    }

    instrument_file(input, output, libs, &config)?;

    println!("✅ Instrumented archive written to {:?}", output);
    Ok(())
}

/// List the entries of an archive, or disassemble one class
pub fn cmd_inspect(input: &Path, class: Option<&str>) -> CliResult<()> {
    let archive = Archive::read_from(input)?;

    let Some(class) = class else {
        println!("📦 {:?} ({} entries)", input, archive.len());
        for entry in archive.entries() {
            let kind = if entry.is_class() { "class" } else { "resource" };
            println!("   {:<8} {:>8} bytes  {}", kind, entry.data.len(), entry.name);
        }
        return Ok(());
    };

    let name = class_entry_name(class);
    let entry = archive
        .entry(&name)
        .ok_or_else(|| format!("No class {} in {:?}", class, input))?;
    let descriptor = ClassDescriptor::from_bytes(&entry.data)?;
    print_class(&descriptor);
    Ok(())
}

fn print_class(class: &ClassDescriptor) {
    println!(
        "class {} extends {}",
        class.name,
        class.superclass.as_deref().unwrap_or("-")
    );
    if !class.interfaces.is_empty() {
        println!("   implements {}", class.interfaces.join(", "));
    }

    println!("\nFields:");
    for field in &class.fields {
        println!("   {:?} {} : {}{}", field.access, field.name, field.ty, marker(&field.name));
    }

    for method in &class.methods {
        println!(
            "\n{}{} {:?}{}",
            method.name,
            method.signature,
            method.access,
            marker(&method.name)
        );
        for annotation in &method.annotations {
            match &annotation.argument {
                Some(argument) => println!("   @{}({})", annotation.name, argument),
                None => println!("   @{}", annotation.name),
            }
        }
        match &method.code {
            Some(code) => {
                for line in disassemble(code).lines() {
                    println!("   {}", line);
                }
            }
            None => println!("   (abstract)"),
        }
    }
}

fn marker(name: &str) -> &'static str {
    if names::is_synthetic(name) {
        "  (generated)"
    } else {
        ""
    }
}
