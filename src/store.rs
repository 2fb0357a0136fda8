//! On-disk layout of an index store.
//!
//! A store is a directory tree holding one file per compiled unit under
//! `v5/units`, and content-addressed record blobs under
//! `v5/records/<shard>/<name>`, where the shard is the last two characters
//! of the record name. The fixed `v5` component is the only store format
//! this tool understands.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

pub const STORE_VERSION_DIR: &str = "v5";
pub const UNITS_DIR: &str = "units";
pub const RECORDS_DIR: &str = "records";

/// `<store>/v5/units`
pub fn units_dir(store: &Path) -> PathBuf {
    store.join(STORE_VERSION_DIR).join(UNITS_DIR)
}

/// `<store>/v5/records`
pub fn records_dir(store: &Path) -> PathBuf {
    store.join(STORE_VERSION_DIR).join(RECORDS_DIR)
}

/// Shard directory for a record name: its last two characters.
/// Bounds directory fan-out for stores with many records.
pub fn record_shard(name: &str) -> &str {
    if name.len() < 2 { name } else { &name[name.len() - 2..] }
}

/// `<store>/v5/records/<shard>/<name>`
pub fn record_path(store: &Path, name: &str) -> PathBuf {
    records_dir(store).join(record_shard(name)).join(name)
}

/// Create the `v5/units` and `v5/records` skeleton of an output store.
/// Existing contents are left in place; incremental merges depend on that.
pub fn init_store(store: &Path) -> Result<()> {
    fs::create_dir_all(units_dir(store))
        .with_context(|| format!("could not create {}", units_dir(store).display()))?;
    fs::create_dir_all(records_dir(store))
        .with_context(|| format!("could not create {}", records_dir(store).display()))?;
    Ok(())
}

/// Check that an input store has the subtrees the merge is about to walk
pub fn check_store(store: &Path, require_records: bool) -> Result<()> {
    if !units_dir(store).is_dir() || (require_records && !records_dir(store).is_dir()) {
        bail!("invalid index store directory {}", store.display());
    }
    Ok(())
}

/// All unit files in a store, sorted by file name
pub fn list_units(store: &Path) -> Result<Vec<PathBuf>> {
    let dir = units_dir(store);
    let entries =
        fs::read_dir(&dir).with_context(|| format!("could not read {}", dir.display()))?;

    let mut units = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("could not read {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() {
            units.push(path);
        }
    }
    units.sort();
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_shard() {
        assert_eq!(record_shard("XM4T1EFD9EPL9"), "L9");
        assert_eq!(record_shard("a"), "a");
        assert_eq!(record_shard(""), "");
    }

    #[test]
    fn test_record_path_is_sharded() {
        let path = record_path(Path::new("/store"), "main.c-2AB3CD");
        assert_eq!(path, PathBuf::from("/store/v5/records/CD/main.c-2AB3CD"));
    }

    #[test]
    fn test_units_dir_layout() {
        assert_eq!(units_dir(Path::new("/s")), PathBuf::from("/s/v5/units"));
        assert_eq!(records_dir(Path::new("/s")), PathBuf::from("/s/v5/records"));
    }
}
