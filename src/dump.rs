//! YAML-shaped text report over unit files.

use crate::unit::UnitReader;
use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

/// Print every given unit file as a YAML document on stdout
pub fn dump_units(unit_paths: &[impl AsRef<Path>]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for unit_path in unit_paths {
        write_unit_report(&mut out, unit_path.as_ref())?;
    }
    Ok(())
}

/// Write one unit's report: header fields by name, then the dependency and
/// include entries in on-disk order
pub fn write_unit_report(out: &mut impl Write, unit_path: &Path) -> Result<()> {
    let reader = UnitReader::open(unit_path)?;

    writeln!(out, "---")?;
    writeln!(out, "# {}", unit_path.display())?;
    writeln!(out, "WorkingDirectory: {}", reader.working_directory())?;
    writeln!(out, "MainFilePath: {}", reader.main_file_path())?;
    writeln!(out, "OutputFile: {}", reader.output_file())?;
    writeln!(out, "ModuleName: {}", reader.module_name())?;
    writeln!(out, "IsSystemUnit: {}", reader.is_system_unit())?;
    writeln!(out, "IsModuleUnit: {}", reader.is_module_unit())?;
    writeln!(out, "IsDebugCompilation: {}", reader.is_debug_compilation())?;
    writeln!(out, "CompilationTarget: {}", reader.target())?;
    writeln!(out, "SysrootPath: {}", reader.sysroot_path())?;
    writeln!(out, "ProviderIdentifier: {}", reader.provider_identifier())?;
    writeln!(out, "ProviderVersion: {}", reader.provider_version())?;

    let mut needs_header = true;
    let mut write_error = None;
    reader.foreach_dependency(|dep| {
        let result = (|| -> io::Result<()> {
            if needs_header {
                writeln!(out, "Dependencies:")?;
                needs_header = false;
            }
            writeln!(out, "\tDependencyKind: {}", dep.kind.name())?;
            writeln!(out, "\tIsSystem: {}", dep.is_system)?;
            writeln!(out, "\tUnitOrRecordName: {}", dep.name)?;
            writeln!(out, "\tFilePath: {}", dep.file_path)?;
            writeln!(out, "\tModuleName: {}", dep.module_name)?;
            Ok(())
        })();
        match result {
            Ok(()) => true,
            Err(err) => {
                write_error = Some(err);
                false
            }
        }
    })?;
    if let Some(err) = write_error {
        return Err(err.into());
    }

    let mut needs_header = true;
    let mut write_error = None;
    reader.foreach_include(|include| {
        let result = (|| -> io::Result<()> {
            if needs_header {
                writeln!(out, "Includes:")?;
                needs_header = false;
            }
            writeln!(out, "\tSourcePath: {}", include.source_path)?;
            writeln!(out, "\tSourceLine: {}", include.source_line)?;
            writeln!(out, "\tTargetPath: {}", include.target_path)?;
            Ok(())
        })();
        match result {
            Ok(()) => true,
            Err(err) => {
                write_error = Some(err);
                false
            }
        }
    })?;
    if let Some(err) = write_error {
        return Err(err.into());
    }

    Ok(())
}
