//! The v5 unit wire format.
//!
//! A unit file records one translation unit's indexing metadata. Layout,
//! all little-endian:
//!
//! ```text
//! magic            4 bytes  "IXUN"
//! version          u32      5
//! flags            u32      system / module / debug-compilation bits
//! deps_offset      u64      absolute offset of the dependency section
//! includes_offset  u64      absolute offset of the include section
//! 8 header strings, each u32 length + bytes:
//!     provider identifier, provider version, working directory,
//!     output file, main file path, module name, target, sysroot
//! dependency section: u32 count, then per entry
//!     kind u8, flags u8, name, file path, module name
//! include section: u32 count, then per entry
//!     source path, source line u32, target path
//! ```
//!
//! The two section offsets let the dependency and include traversals run as
//! independent single passes without decoding each other's entries.

pub const UNIT_MAGIC: [u8; 4] = *b"IXUN";
pub const UNIT_FORMAT_VERSION: u32 = 5;

/// Unit header flag bits
pub const UNIT_FLAG_SYSTEM: u32 = 1 << 0;
pub const UNIT_FLAG_MODULE: u32 = 1 << 1;
pub const UNIT_FLAG_DEBUG: u32 = 1 << 2;

/// Dependency entry flag bits
pub const DEP_FLAG_SYSTEM: u8 = 1 << 0;
/// The referenced path did not exist on disk when the unit was written;
/// the entry is a virtual placeholder, not an error.
pub const DEP_FLAG_MISSING: u8 = 1 << 1;

/// What a dependency entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Unit,
    Record,
    File,
}

impl DependencyKind {
    pub fn as_u8(self) -> u8 {
        match self {
            DependencyKind::Unit => 0,
            DependencyKind::Record => 1,
            DependencyKind::File => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DependencyKind::Unit),
            1 => Some(DependencyKind::Record),
            2 => Some(DependencyKind::File),
            _ => None,
        }
    }

    /// Name used by the dump report
    pub fn name(self) -> &'static str {
        match self {
            DependencyKind::Unit => "Unit",
            DependencyKind::Record => "Record",
            DependencyKind::File => "File",
        }
    }
}

/// One dependency entry, borrowed from the mapped unit file.
///
/// `name` is a unit name or record name and is meaningful only for the
/// Unit and Record kinds; File entries carry no name. `file_path` may be
/// empty for pure name references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency<'a> {
    pub kind: DependencyKind,
    pub is_system: bool,
    pub is_missing: bool,
    pub name: &'a str,
    pub file_path: &'a str,
    pub module_name: &'a str,
}

/// One include edge: `source_path` includes `target_path` at `source_line`
/// (1-based). Not populated by Swift-origin units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Include<'a> {
    pub source_path: &'a str,
    pub source_line: u32,
    pub target_path: &'a str,
}

/// Header attributes of a unit. When handed to the writer, every path field
/// is expected to already be in its final (remapped) form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitInfo {
    pub provider_identifier: String,
    pub provider_version: String,
    pub working_directory: String,
    pub output_file: String,
    pub main_file_path: String,
    pub module_name: String,
    pub target: String,
    pub sysroot_path: String,
    pub is_system_unit: bool,
    pub is_module_unit: bool,
    pub is_debug_compilation: bool,
}
