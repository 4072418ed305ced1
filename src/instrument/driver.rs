//! Archive instrumentation driver
//!
//! Builds one class index over the input and its dependencies, instruments
//! the input's classes in parallel and assembles the output archive in input
//! order. Any error aborts the whole archive.

use crate::archive::{Archive, ArchiveEntry};
use crate::bytecode::{ClassBuilder, ClassDescriptor};
use crate::instrument::augment::ClassAugmenter;
use crate::instrument::config::InstrumentationConfig;
use crate::instrument::error::{InstrumentationError, InstrumentationResult};
use crate::instrument::fields::FieldClassifier;
use crate::instrument::index::ClassIndex;
use crate::instrument::method::MethodInstrumenter;
use crate::instrument::oracle::TypeOracle;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Instrument a single class against `index`, which must contain its ancestors
pub fn instrument_class(
    class: &ClassDescriptor,
    index: &ClassIndex,
    config: &InstrumentationConfig,
) -> InstrumentationResult<ClassDescriptor> {
    let oracle = TypeOracle::new(index, config);
    instrument_with(&oracle, class)
}

fn instrument_with(oracle: &TypeOracle<'_>, class: &ClassDescriptor) -> InstrumentationResult<ClassDescriptor> {
    let storage = !class.is_interface() && oracle.is_storage_type(&class.name);
    log::debug!(
        "Instrumenting {} (storage: {}, contract: {})",
        class.name,
        storage,
        oracle.is_contract_type(&class.name)
    );

    let mut builder = ClassBuilder::from_class(class);
    let methods = MethodInstrumenter::new(oracle, class);
    for method in &class.methods {
        builder.add_method(methods.instrument(method)?);
    }

    if storage {
        let classification = FieldClassifier::new(oracle).classify(class)?;
        ClassAugmenter::new(oracle, class).augment(&mut builder, &classification)?;
    }
    Ok(builder.build())
}

/// Instrument every class of `input`; other entries are copied unchanged
pub fn instrument_archive(
    input: &Archive,
    dependencies: &[Archive],
    config: &InstrumentationConfig,
) -> InstrumentationResult<Archive> {
    let archives: Vec<&Archive> = std::iter::once(input).chain(dependencies).collect();
    let index = ClassIndex::build(&archives)?;
    let oracle = TypeOracle::new(&index, config);

    let entries: Vec<ArchiveEntry> = input
        .entries()
        .par_iter()
        .map(|entry| instrument_entry(&oracle, entry))
        .collect::<InstrumentationResult<_>>()?;

    let mut output = Archive::new();
    for entry in entries {
        output.push(entry)?;
    }

    let classes = input.class_entries().count();
    log::info!(
        "Instrumented {} classes, copied {} other entries ({} classes indexed)",
        classes,
        input.len() - classes,
        index.len()
    );
    Ok(output)
}

fn instrument_entry(oracle: &TypeOracle<'_>, entry: &ArchiveEntry) -> InstrumentationResult<ArchiveEntry> {
    if !entry.is_class() {
        return Ok(entry.clone());
    }

    let invalid = |source| InstrumentationError::InvalidClass {
        entry: entry.name.clone(),
        source,
    };
    let class = ClassDescriptor::from_bytes(&entry.data).map_err(invalid)?;
    let output = instrument_with(oracle, &class)?;
    let data = output.to_bytes().map_err(invalid)?;
    Ok(ArchiveEntry::new(entry.name.clone(), data))
}

/// Instrument the archive at `input_path` into `output_path`.
///
/// The output is written atomically; on failure no new file is left at
/// `output_path`.
pub fn instrument_file(
    input_path: &Path,
    output_path: &Path,
    dependency_paths: &[PathBuf],
    config: &InstrumentationConfig,
) -> InstrumentationResult<()> {
    let input = Archive::read_from(input_path)?;
    let dependencies = dependency_paths
        .iter()
        .map(|path| Archive::read_from(path))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "Instrumenting {} with {} dependencies",
        input_path.display(),
        dependencies.len()
    );
    let output = instrument_archive(&input, &dependencies, config)?;
    output.write_to(output_path)?;
    log::info!("Wrote {}", output_path.display());
    Ok(())
}
