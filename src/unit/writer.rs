use crate::remap::PathPrefixMap;
use crate::store;
use crate::unit::types::*;
use crate::utils::{absolutize, base36, hash_path, put_str, put_u32, put_u64};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle for an interned module name.
///
/// Valid only for the [`ModuleNameScope`] that issued it, and only for the
/// duration of one unit's serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRef(u32);

/// Interner bridging module-name strings to the handles the writer stores
/// on dependency entries. Equal strings yield equal handles; issued handles
/// stay valid no matter how many names are inserted afterwards.
#[derive(Default)]
pub struct ModuleNameScope {
    names: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl ModuleNameScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name` and return its handle
    pub fn get_reference(&mut self, name: &str) -> ModuleRef {
        if let Some(&index) = self.index.get(name) {
            return ModuleRef(index);
        }
        let index = self.names.len() as u32;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), index);
        ModuleRef(index)
    }

    /// The string behind a handle issued by this scope
    pub fn resolve(&self, module: ModuleRef) -> &str {
        &self.names[module.0 as usize]
    }
}

/// Compute a unit's file name from its output-file path: the path's
/// basename joined with a base36 rendering of the 64-bit hash of the
/// prefix-mapped, absolutized path. Units with equal output paths collide
/// to the same name, which is what makes merging idempotent.
pub fn unit_name_for_output_file(
    output_file: &str,
    working_directory: &str,
    prefix_map: &PathPrefixMap,
) -> String {
    let mapped = prefix_map.apply(output_file);
    let absolute = absolutize(&mapped, working_directory);
    let basename = Path::new(&absolute)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| absolute.clone());
    format!("{}-{}", basename, base36(hash_path(&absolute)))
}

struct DependencyEntry {
    kind: DependencyKind,
    is_system: bool,
    name: String,
    file_path: String,
    module: ModuleRef,
}

struct IncludeEntry {
    source_path: String,
    source_line: u32,
    target_path: String,
}

/// Serializer for a single unit file.
///
/// Attribute values are expected to be in their final (already remapped)
/// form. Dependencies and includes are written in insertion order, and the
/// file lands in the destination store's `v5/units` under the name computed
/// by [`unit_name_for_output_file`]. The write is atomic per unit: bytes go
/// to a temp file that is renamed into place.
pub struct UnitWriter<'a> {
    store: PathBuf,
    info: UnitInfo,
    prefix_map: &'a PathPrefixMap,
    dependencies: Vec<DependencyEntry>,
    includes: Vec<IncludeEntry>,
}

impl<'a> UnitWriter<'a> {
    pub fn new(store: &Path, info: UnitInfo, prefix_map: &'a PathPrefixMap) -> Self {
        Self {
            store: store.to_path_buf(),
            info,
            prefix_map,
            dependencies: Vec::new(),
            includes: Vec::new(),
        }
    }

    /// Name another unit would get for `output_file`, resolved against this
    /// unit's working directory. Used to recompute Unit-dependency names
    /// from remapped paths.
    pub fn unit_name_for(&self, output_file: &str) -> String {
        unit_name_for_output_file(output_file, &self.info.working_directory, self.prefix_map)
    }

    /// This unit's own output file name
    pub fn unit_name(&self) -> String {
        self.unit_name_for(&self.info.output_file)
    }

    pub fn add_unit_dependency(
        &mut self,
        name: &str,
        file_path: &str,
        is_system: bool,
        module: ModuleRef,
    ) {
        self.dependencies.push(DependencyEntry {
            kind: DependencyKind::Unit,
            is_system,
            name: name.to_string(),
            file_path: file_path.to_string(),
            module,
        });
    }

    pub fn add_record_dependency(
        &mut self,
        name: &str,
        file_path: &str,
        is_system: bool,
        module: ModuleRef,
    ) {
        self.dependencies.push(DependencyEntry {
            kind: DependencyKind::Record,
            is_system,
            name: name.to_string(),
            file_path: file_path.to_string(),
            module,
        });
    }

    pub fn add_file_dependency(&mut self, file_path: &str, is_system: bool, module: ModuleRef) {
        self.dependencies.push(DependencyEntry {
            kind: DependencyKind::File,
            is_system,
            name: String::new(),
            file_path: file_path.to_string(),
            module,
        });
    }

    pub fn add_include(&mut self, source_path: &str, source_line: u32, target_path: &str) {
        self.includes.push(IncludeEntry {
            source_path: source_path.to_string(),
            source_line,
            target_path: target_path.to_string(),
        });
    }

    /// Serialize the unit into the destination store.
    ///
    /// `names` resolves the module handles stored on dependency entries;
    /// `file_exists` classifies dependency paths so entries whose path is
    /// absent on disk are recorded as virtual placeholders rather than
    /// dropped. Returns the path of the written unit file.
    pub fn write(
        &self,
        names: &ModuleNameScope,
        file_exists: impl Fn(&str) -> bool,
    ) -> Result<PathBuf> {
        let mut header = Vec::new();
        put_str(&mut header, &self.info.provider_identifier);
        put_str(&mut header, &self.info.provider_version);
        put_str(&mut header, &self.info.working_directory);
        put_str(&mut header, &self.info.output_file);
        put_str(&mut header, &self.info.main_file_path);
        put_str(&mut header, &self.info.module_name);
        put_str(&mut header, &self.info.target);
        put_str(&mut header, &self.info.sysroot_path);

        let mut deps = Vec::new();
        put_u32(&mut deps, self.dependencies.len() as u32);
        for dep in &self.dependencies {
            let mut flags = 0u8;
            if dep.is_system {
                flags |= DEP_FLAG_SYSTEM;
            }
            if !dep.file_path.is_empty() && !file_exists(&dep.file_path) {
                flags |= DEP_FLAG_MISSING;
            }
            deps.push(dep.kind.as_u8());
            deps.push(flags);
            put_str(&mut deps, &dep.name);
            put_str(&mut deps, &dep.file_path);
            put_str(&mut deps, names.resolve(dep.module));
        }

        let mut includes = Vec::new();
        put_u32(&mut includes, self.includes.len() as u32);
        for include in &self.includes {
            put_str(&mut includes, &include.source_path);
            put_u32(&mut includes, include.source_line);
            put_str(&mut includes, &include.target_path);
        }

        // magic + version + flags + two section offsets
        let fixed_len = 4 + 4 + 4 + 8 + 8;
        let deps_offset = (fixed_len + header.len()) as u64;
        let includes_offset = deps_offset + deps.len() as u64;

        let mut unit_flags = 0u32;
        if self.info.is_system_unit {
            unit_flags |= UNIT_FLAG_SYSTEM;
        }
        if self.info.is_module_unit {
            unit_flags |= UNIT_FLAG_MODULE;
        }
        if self.info.is_debug_compilation {
            unit_flags |= UNIT_FLAG_DEBUG;
        }

        let mut buf = Vec::with_capacity(fixed_len + header.len() + deps.len() + includes.len());
        buf.extend_from_slice(&UNIT_MAGIC);
        put_u32(&mut buf, UNIT_FORMAT_VERSION);
        put_u32(&mut buf, unit_flags);
        put_u64(&mut buf, deps_offset);
        put_u64(&mut buf, includes_offset);
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&deps);
        buf.extend_from_slice(&includes);

        let name = self.unit_name();
        let unit_path = store::units_dir(&self.store).join(&name);
        write_atomically(&unit_path, &buf)
            .with_context(|| format!("could not write unit file {}", unit_path.display()))?;
        Ok(unit_path)
    }
}

/// Write through a uniquely named temp file in the same directory, then
/// rename into place so concurrent writers of a colliding unit name race
/// whole files, never partial ones.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_name = format!(
        ".{}.tmp.{}-{}",
        file_name,
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| -> Result<()> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result.map(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_names_share_a_handle() {
        let mut scope = ModuleNameScope::new();
        let a = scope.get_reference("CoreFoundation");
        let b = scope.get_reference("CoreFoundation");
        let c = scope.get_reference("Dispatch");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(scope.resolve(a), "CoreFoundation");
        assert_eq!(scope.resolve(c), "Dispatch");
    }

    #[test]
    fn test_handles_survive_later_insertions() {
        let mut scope = ModuleNameScope::new();
        let first = scope.get_reference("First");
        for i in 0..100 {
            scope.get_reference(&format!("Module{}", i));
        }
        assert_eq!(scope.resolve(first), "First");
    }

    #[test]
    fn test_unit_name_shape() {
        let prefix_map = PathPrefixMap::empty();
        let name = unit_name_for_output_file("/out/a.o", "/build", &prefix_map);
        assert!(name.starts_with("a.o-"));
        let suffix = &name["a.o-".len()..];
        assert!(!suffix.is_empty());
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unit_name_absolutizes_relative_output() {
        let prefix_map = PathPrefixMap::empty();
        let relative = unit_name_for_output_file("obj/a.o", "/build", &prefix_map);
        let absolute = unit_name_for_output_file("/build/obj/a.o", "", &prefix_map);
        assert_eq!(relative, absolute);
    }

    #[test]
    fn test_unit_name_applies_prefix_map() {
        let prefix_map = PathPrefixMap::from_args(&["/build=/stable".to_string()]).unwrap();
        let mapped = unit_name_for_output_file("/build/a.o", "", &prefix_map);
        let direct = unit_name_for_output_file("/stable/a.o", "", &PathPrefixMap::empty());
        assert_eq!(mapped, direct);
    }

    #[test]
    fn test_equal_output_paths_collide() {
        let prefix_map = PathPrefixMap::empty();
        let a = unit_name_for_output_file("/out/a.o", "/x", &prefix_map);
        let b = unit_name_for_output_file("/out/a.o", "/y", &prefix_map);
        assert_eq!(a, b);
    }
}
