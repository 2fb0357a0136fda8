//! Content-addressed record cloning.
//!
//! A record's name is a hash of its contents, so two records with the same
//! name are byte-identical and cloning never needs to overwrite. That makes
//! the copy idempotent and safe to race: concurrent clones of the same
//! record resolve "already exists" as success.

use crate::output;
use crate::store;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;

/// Copy one record blob. Success when the destination already exists,
/// including when a concurrent clone creates it mid-flight.
pub fn clone_record(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        return Ok(());
    }

    let destination = match create_new(to) {
        Ok(Some(file)) => file,
        Ok(None) => return Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            // Shard directory does not exist yet
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("could not create directory {}", parent.display()))?;
            }
            match create_new(to) {
                Ok(Some(file)) => file,
                Ok(None) => return Ok(()),
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("could not create {}", to.display()));
                }
            }
        }
        Err(err) => {
            return Err(err).with_context(|| format!("could not create {}", to.display()));
        }
    };

    let result = File::open(from)
        .and_then(|mut source| {
            let mut destination = destination;
            io::copy(&mut source, &mut destination).map(|_| ())
        })
        .with_context(|| {
            format!(
                "could not copy record file from {} to {}",
                from.display(),
                to.display()
            )
        });
    if result.is_err() {
        // Drop the partial copy so a later attempt starts clean
        let _ = fs::remove_file(to);
    }
    result
}

/// Open `to` exclusively; `Ok(None)` means another clone of the same record
/// got there first, which is success.
fn create_new(to: &Path) -> io::Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(to) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(err) => Err(err),
    }
}

/// Mirror an input store's whole `v5/records` subtree into the output
/// store. Per-record failures are reported and fail the run, but the walk
/// continues; used when importing a store without an output-file filter.
pub fn clone_records_tree(input_store: &Path, output_store: &Path) -> bool {
    let input_records = store::records_dir(input_store);
    let output_records = store::records_dir(output_store);
    let mut success = true;

    let walker = WalkBuilder::new(&input_records)
        .standard_filters(false)
        .build();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                output::error(format!("aborted while reading from records directory: {}", err));
                success = false;
                continue;
            }
        };
        let path = entry.path();
        let relative = match path.strip_prefix(&input_records) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let destination = output_records.join(relative);

        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            if let Err(err) = fs::create_dir_all(&destination) {
                output::error(format!(
                    "could not create directory {}: {}",
                    destination.display(),
                    err
                ));
                success = false;
            }
        } else if let Err(err) = clone_record(path, &destination) {
            output::error(format!("{:#}", err));
            success = false;
        }
    }

    success
}

/// Clone a single named record between stores; used in selective mode for
/// records referenced by the units actually being imported.
pub fn clone_named_record(input_store: &Path, output_store: &Path, name: &str) -> Result<()> {
    let from = store::record_path(input_store, name);
    let to = store::record_path(output_store, name);
    clone_record(&from, &to)
}
