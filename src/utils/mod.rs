//! Shared helpers used throughout ixm:
//!
//! - [`encoding`] - little-endian scalar and length-prefixed string codec
//! - [`paths`] - path normalization, absolutization, and name hashing

pub mod encoding;
pub mod paths;

pub use encoding::*;
pub use paths::*;
