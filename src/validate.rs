//! Store validation: confirm every path referenced by every unit exists.
//!
//! Missing paths are printed one per line on stdout as
//! `<unit-name>: <key>: <path>` so the report stays greppable; read errors
//! go to stderr. The merge itself tolerates missing files (it records them
//! as virtual entries); this tool is where they become visible.

use crate::output;
use crate::store;
use crate::unit::UnitReader;
use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

/// Walk every unit in the store; `Ok(true)` only when every referenced
/// path exists and every unit could be read.
pub fn validate_store(store_path: &Path) -> Result<bool> {
    store::check_store(store_path, false)?;
    let units = store::list_units(store_path)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut valid = true;

    for unit_path in &units {
        let reader = match UnitReader::open(unit_path) {
            Ok(reader) => reader,
            Err(err) => {
                output::error(format!("failed to read unit file: {:#}", err));
                valid = false;
                continue;
            }
        };
        let unit_name = reader.name().to_string();

        // The output file is a build product and need not exist; every
        // other path recorded by the unit should.
        let header_paths = [
            ("MainFilePath", reader.main_file_path()),
            ("SysrootPath", reader.sysroot_path()),
            ("WorkingDirectory", reader.working_directory()),
        ];
        for (key, path) in header_paths {
            if !path.is_empty() && !Path::new(path).exists() {
                valid = false;
                log_missing(&mut out, &unit_name, key, path)?;
            }
        }

        reader.foreach_dependency(|dep| {
            if !dep.file_path.is_empty() && !Path::new(dep.file_path).exists() {
                valid = false;
                let _ = log_missing(&mut out, &unit_name, "DependencyPath", dep.file_path);
            }
            true
        })?;

        reader.foreach_include(|include| {
            if !Path::new(include.source_path).exists() {
                valid = false;
                let _ = log_missing(&mut out, &unit_name, "IncludeSourcePath", include.source_path);
            }
            if !Path::new(include.target_path).exists() {
                valid = false;
                let _ = log_missing(&mut out, &unit_name, "IncludeTargetPath", include.target_path);
            }
            true
        })?;
    }

    Ok(valid)
}

fn log_missing(out: &mut impl Write, unit_name: &str, key: &str, path: &str) -> io::Result<()> {
    writeln!(out, "{}: {}: {}", unit_name, key, path)
}
