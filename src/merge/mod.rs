//! The merge engine.
//!
//! For every unit file in every input store: read it, remap every embedded
//! path, clone the record blobs it references, and re-emit it into the
//! output store under its recomputed content-derived name. Failures are
//! recorded and reported per unit; one bad unit, record, or store never
//! stops the rest of the batch.

pub mod records;

use crate::output;
use crate::parallel::run_batches;
use crate::remap::{PathPrefixMap, PathRemapper};
use crate::store;
use crate::unit::{
    DependencyKind, ModuleNameScope, UnitInfo, UnitReader, UnitWriter, unit_name_for_output_file,
};
use crate::utils::normalize_path;
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Everything the merge needs, parsed once from the command line and passed
/// by reference into every worker.
pub struct MergeOptions {
    pub output_store: PathBuf,
    pub remapper: PathRemapper,
    pub prefix_map: PathPrefixMap,
    pub incremental: bool,
    pub verbose: bool,
    /// Unit file names to import, when restricted to specific output files
    pub import_filter: Option<FxHashSet<String>>,
}

/// Resolve `--import-output-file` paths into the unit file names they select:
/// each requested path is remapped, then run through the standard unit-name
/// computation against the process working directory.
pub fn unit_name_filter(
    output_files: &[String],
    remapper: &PathRemapper,
    prefix_map: &PathPrefixMap,
) -> Result<FxHashSet<String>> {
    let cwd = std::env::current_dir().context("could not determine working directory")?;
    let cwd = cwd.to_string_lossy().into_owned();
    Ok(output_files
        .iter()
        .map(|path| {
            let remapped = remapper.remap(path);
            unit_name_for_output_file(&remapped, &cwd, prefix_map)
        })
        .collect())
}

/// Merge every input store into the output store, fanned out in
/// stride-sized groups. Returns false if anything failed anywhere.
pub fn merge_stores(opts: &MergeOptions, input_stores: &[PathBuf], stride: usize) -> bool {
    #[cfg(feature = "progress")]
    let bar = store_progress(opts, input_stores.len());

    let success = run_batches(input_stores, stride, |input_store| {
        let ok = merge_store(opts, input_store);
        #[cfg(feature = "progress")]
        if let Some(bar) = &bar {
            bar.inc(1);
        }
        ok
    });

    #[cfg(feature = "progress")]
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    success
}

#[cfg(feature = "progress")]
fn store_progress(opts: &MergeOptions, store_count: usize) -> Option<ProgressBar> {
    if opts.verbose || store_count < 2 {
        return None;
    }
    let bar = ProgressBar::new(store_count as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} stores")
            .unwrap()
            .progress_chars("█▓▒░  "),
    );
    Some(bar)
}

/// Merge one input store. Record blobs are mirrored in bulk unless an
/// output-file filter is active, in which case only records referenced by
/// the selected units are cloned.
pub fn merge_store(opts: &MergeOptions, input_store: &Path) -> bool {
    let input_store = normalize_path(input_store);
    let bulk = opts.import_filter.is_none();

    if let Err(err) = store::check_store(&input_store, bulk) {
        output::error(format!("{:#}", err));
        return false;
    }

    let mut success = true;
    if bulk && !records::clone_records_tree(&input_store, &opts.output_store) {
        success = false;
    }

    let units = match store::list_units(&input_store) {
        Ok(units) => units,
        Err(err) => {
            output::error(format!("aborted while reading from unit directory: {:#}", err));
            return false;
        }
    };

    for unit_path in &units {
        if !merge_unit(opts, &input_store, unit_path) {
            success = false;
        }
    }
    success
}

/// Read, remap, and re-emit one unit. Returns false when anything about the
/// unit failed, including partial failures such as one unclonable record.
fn merge_unit(opts: &MergeOptions, input_store: &Path, unit_path: &Path) -> bool {
    let reader = match UnitReader::open(unit_path) {
        Ok(reader) => reader,
        Err(err) => {
            output::error(format!("failed to read unit file: {:#}", err));
            return false;
        }
    };

    let mut success = true;
    let working_directory = opts.remapper.remap(reader.working_directory());
    let output_file = opts.remapper.remap(reader.output_file());

    // An output-file filter selects units by the name their remapped output
    // path produces, so requests are given in output-store terms.
    if let Some(filter) = &opts.import_filter {
        let name = unit_name_for_output_file(&output_file, &working_directory, &opts.prefix_map);
        if !filter.contains(&name) {
            return success;
        }
    }

    if opts.incremental {
        match unit_up_to_date(opts, &output_file, &working_directory, unit_path) {
            Ok(true) => {
                if opts.verbose {
                    output::note(format!("up to date: {}", reader.name()));
                }
                return success;
            }
            Ok(false) => {}
            Err(err) => {
                // Surfaced, but the unit is then treated as out of date so a
                // bad stat cannot silently drop it from the output.
                output::error(format!("failed file status check: {:#}", err));
                success = false;
            }
        }
    }

    let info = UnitInfo {
        provider_identifier: reader.provider_identifier().to_string(),
        provider_version: reader.provider_version().to_string(),
        working_directory,
        output_file,
        main_file_path: opts.remapper.remap(reader.main_file_path()),
        module_name: reader.module_name().to_string(),
        target: reader.target().to_string(),
        sysroot_path: opts.remapper.remap(reader.sysroot_path()),
        is_system_unit: reader.is_system_unit(),
        is_module_unit: reader.is_module_unit(),
        is_debug_compilation: reader.is_debug_compilation(),
    };

    let mut names = ModuleNameScope::new();
    let mut writer = UnitWriter::new(&opts.output_store, info, &opts.prefix_map);
    let selective = opts.import_filter.is_some();

    let traversal = reader.foreach_dependency(|dep| {
        let module = names.get_reference(dep.module_name);
        let file_path = opts.remapper.remap(dep.file_path);
        match dep.kind {
            DependencyKind::Unit => {
                // The input's unit name is not reused: the dependency must
                // carry the name its own unit file will have once remapped.
                // No name in the input means no name in the output.
                let name = if dep.name.is_empty() {
                    String::new()
                } else {
                    writer.unit_name_for(&file_path)
                };
                writer.add_unit_dependency(&name, &file_path, dep.is_system, module);
            }
            DependencyKind::Record => {
                if selective {
                    if let Err(err) =
                        records::clone_named_record(input_store, &opts.output_store, dep.name)
                    {
                        output::error(format!("{:#}", err));
                        success = false;
                    }
                }
                writer.add_record_dependency(dep.name, &file_path, dep.is_system, module);
            }
            DependencyKind::File => {
                writer.add_file_dependency(&file_path, dep.is_system, module);
            }
        }
        true
    });
    if let Err(err) = traversal {
        output::error(format!("failed to read unit file: {:#}", err));
        return false;
    }

    let traversal = reader.foreach_include(|include| {
        writer.add_include(
            &opts.remapper.remap(include.source_path),
            include.source_line,
            &opts.remapper.remap(include.target_path),
        );
        true
    });
    if let Err(err) = traversal {
        output::error(format!("failed to read unit file: {:#}", err));
        return false;
    }

    match writer.write(&names, |path| Path::new(path).exists()) {
        Ok(written) => {
            if opts.verbose {
                output::note(format!("wrote {}", written.display()));
            }
        }
        Err(err) => {
            output::error(format!("failed to write index store; {:#}", err));
            success = false;
        }
    }
    success
}

/// An output unit is up to date when it exists and is at least as new as
/// the input unit file it would be rewritten from.
fn unit_up_to_date(
    opts: &MergeOptions,
    output_file: &str,
    working_directory: &str,
    input_unit_path: &Path,
) -> Result<bool> {
    let name = unit_name_for_output_file(output_file, working_directory, &opts.prefix_map);
    let output_path = store::units_dir(&opts.output_store).join(name);

    let output_meta = match fs::metadata(&output_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => bail!("could not access path '{}': {}", output_path.display(), err),
    };
    let input_meta = match fs::metadata(input_unit_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
        Err(err) => bail!(
            "could not access path '{}': {}",
            input_unit_path.display(),
            err
        ),
    };

    let output_mtime = output_meta
        .modified()
        .with_context(|| format!("could not access path '{}'", output_path.display()))?;
    let input_mtime = input_meta
        .modified()
        .with_context(|| format!("could not access path '{}'", input_unit_path.display()))?;
    Ok(input_mtime <= output_mtime)
}
