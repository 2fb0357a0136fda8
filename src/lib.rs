//! # ixm - index-store merge and relocation
//!
//! ixm combines the on-disk index stores produced by a compiler's indexing
//! subsystem into a single, self-consistent store. Unit files are read,
//! every embedded file-system path is rewritten through user-supplied regex
//! rules, the content-addressed record blobs they reference are cloned, and
//! each unit is re-emitted under the name derived from its remapped output
//! path. The usual job is folding indexing output from distributed or
//! remote build systems into the store layout a local developer tool
//! expects to query.
//!
//! ## Architecture
//!
//! - [`unit`] - the v5 unit binary codec (reader, writer, module-name interner)
//! - [`remap`] - regex path remapping and the hash-stable prefix map
//! - [`merge`] - the per-store / per-unit merge pipeline and record cloning
//! - [`store`] - index-store directory layout and sharding
//! - [`parallel`] - fail-soft stride-partitioned batch execution
//! - [`validate`] - existence checking of every referenced path
//! - [`dump`] - YAML-shaped unit reports
//! - [`output`] - diagnostics
//! - [`utils`] - byte codec and path helpers
//!
//! ## Quick Start
//!
//! ```ignore
//! use ixm::merge::{self, MergeOptions};
//! use ixm::remap::{PathPrefixMap, PathRemapper};
//! use std::path::PathBuf;
//!
//! let opts = MergeOptions {
//!     output_store: PathBuf::from("/tmp/merged"),
//!     remapper: PathRemapper::from_args(&["^/build=/out".to_string()]).unwrap(),
//!     prefix_map: PathPrefixMap::empty(),
//!     incremental: false,
//!     verbose: false,
//!     import_filter: None,
//! };
//! ixm::store::init_store(&opts.output_store).unwrap();
//! let ok = merge::merge_stores(&opts, &[PathBuf::from("/tmp/input")], 32);
//! assert!(ok);
//! ```

pub mod dump;
pub mod merge;
pub mod output;
pub mod parallel;
pub mod remap;
pub mod store;
pub mod unit;
pub mod utils;
pub mod validate;
