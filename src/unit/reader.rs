use crate::unit::types::*;
use crate::utils::SliceReader;
use anyhow::{Context, Result, bail};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Memory-mapped reader for a single unit file.
///
/// The header is parsed eagerly on open; the dependency and include
/// sections are decoded lazily, one forward pass per traversal call.
#[derive(Debug)]
pub struct UnitReader {
    path: PathBuf,
    data: Mmap,
    info: UnitInfo,
    deps_offset: usize,
    includes_offset: usize,
}

impl UnitReader {
    /// Open and parse a unit file's header
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("could not open unit file {}", path.display()))?;
        let data = unsafe { Mmap::map(&file) }
            .with_context(|| format!("could not map unit file {}", path.display()))?;

        let (info, deps_offset, includes_offset) = parse_header(&data)
            .with_context(|| format!("malformed unit file {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            data,
            info,
            deps_offset,
            includes_offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The unit's file name within its store
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .map(|n| n.to_str().unwrap_or(""))
            .unwrap_or("")
    }

    pub fn info(&self) -> &UnitInfo {
        &self.info
    }

    pub fn working_directory(&self) -> &str {
        &self.info.working_directory
    }

    pub fn main_file_path(&self) -> &str {
        &self.info.main_file_path
    }

    pub fn output_file(&self) -> &str {
        &self.info.output_file
    }

    pub fn module_name(&self) -> &str {
        &self.info.module_name
    }

    pub fn provider_identifier(&self) -> &str {
        &self.info.provider_identifier
    }

    pub fn provider_version(&self) -> &str {
        &self.info.provider_version
    }

    pub fn target(&self) -> &str {
        &self.info.target
    }

    pub fn sysroot_path(&self) -> &str {
        &self.info.sysroot_path
    }

    pub fn is_system_unit(&self) -> bool {
        self.info.is_system_unit
    }

    pub fn is_module_unit(&self) -> bool {
        self.info.is_module_unit
    }

    pub fn is_debug_compilation(&self) -> bool {
        self.info.is_debug_compilation
    }

    /// Visit every dependency entry in on-disk order.
    ///
    /// One forward decode pass; stops early (returning `Ok(false)`) when the
    /// visitor returns `false`. Decode failures name the file.
    pub fn foreach_dependency(
        &self,
        mut visit: impl FnMut(&Dependency<'_>) -> bool,
    ) -> Result<bool> {
        let mut cursor = SliceReader::at(&self.data, self.deps_offset)
            .with_context(|| format!("truncated unit file {}", self.path.display()))?;
        let count = self.decode(cursor.get_u32())?;
        for _ in 0..count {
            let kind_raw = self.decode(cursor.get_u8())?;
            let Some(kind) = DependencyKind::from_u8(kind_raw) else {
                bail!(
                    "corrupt dependency entry (kind {}) in unit file {}",
                    kind_raw,
                    self.path.display()
                );
            };
            let flags = self.decode(cursor.get_u8())?;
            let name = self.decode(cursor.get_str())?;
            let file_path = self.decode(cursor.get_str())?;
            let module_name = self.decode(cursor.get_str())?;

            let dependency = Dependency {
                kind,
                is_system: flags & DEP_FLAG_SYSTEM != 0,
                is_missing: flags & DEP_FLAG_MISSING != 0,
                name,
                file_path,
                module_name,
            };
            if !visit(&dependency) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Visit every include edge in on-disk order; same traversal contract
    /// as [`UnitReader::foreach_dependency`].
    pub fn foreach_include(&self, mut visit: impl FnMut(&Include<'_>) -> bool) -> Result<bool> {
        let mut cursor = SliceReader::at(&self.data, self.includes_offset)
            .with_context(|| format!("truncated unit file {}", self.path.display()))?;
        let count = self.decode(cursor.get_u32())?;
        for _ in 0..count {
            let source_path = self.decode(cursor.get_str())?;
            let source_line = self.decode(cursor.get_u32())?;
            let target_path = self.decode(cursor.get_str())?;

            let include = Include {
                source_path,
                source_line,
                target_path,
            };
            if !visit(&include) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn decode<T>(&self, result: Result<T>) -> Result<T> {
        result.with_context(|| format!("truncated unit file {}", self.path.display()))
    }
}

fn parse_header(data: &[u8]) -> Result<(UnitInfo, usize, usize)> {
    let mut cursor = SliceReader::new(data);

    let magic = cursor.get_bytes(4)?;
    if magic != &UNIT_MAGIC[..] {
        bail!("not a unit file (bad magic)");
    }
    let version = cursor.get_u32()?;
    if version != UNIT_FORMAT_VERSION {
        bail!(
            "unsupported unit format version {} (expected {})",
            version,
            UNIT_FORMAT_VERSION
        );
    }

    let flags = cursor.get_u32()?;
    let deps_offset = cursor.get_u64()? as usize;
    let includes_offset = cursor.get_u64()? as usize;
    if deps_offset > data.len() || includes_offset > data.len() {
        bail!("section offset beyond end of file");
    }

    let provider_identifier = cursor.get_str()?.to_string();
    let provider_version = cursor.get_str()?.to_string();
    let working_directory = cursor.get_str()?.to_string();
    let output_file = cursor.get_str()?.to_string();
    let main_file_path = cursor.get_str()?.to_string();
    let module_name = cursor.get_str()?.to_string();
    let target = cursor.get_str()?.to_string();
    let sysroot_path = cursor.get_str()?.to_string();

    let info = UnitInfo {
        provider_identifier,
        provider_version,
        working_directory,
        output_file,
        main_file_path,
        module_name,
        target,
        sysroot_path,
        is_system_unit: flags & UNIT_FLAG_SYSTEM != 0,
        is_module_unit: flags & UNIT_FLAG_MODULE != 0,
        is_debug_compilation: flags & UNIT_FLAG_DEBUG != 0,
    };
    Ok((info, deps_offset, includes_offset))
}
