pub mod reader;
pub mod types;
pub mod writer;

pub use reader::UnitReader;
pub use types::*;
pub use writer::{ModuleNameScope, ModuleRef, UnitWriter, unit_name_for_output_file};
