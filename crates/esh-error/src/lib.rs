#![forbid(unsafe_code)]
//! Error types for extshell.
//!
//! # Error Taxonomy
//!
//! extshell uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `esh-types` | On-disk format violations detected during byte parsing |
//! | Runtime | `EshError` | `esh-error` (this crate) | User-facing errors for the CLI and API consumers |
//!
//! ## Mapping Policy: ParseError → EshError
//!
//! `esh-error` is intentionally independent of `esh-types` and `esh-ondisk`
//! to avoid cyclic dependencies. The conversion from `ParseError` to
//! `EshError` is implemented in `esh-core`, which depends on both crates:
//!
//! | ParseError Variant | EshError Variant | Rationale |
//! |--------------------|------------------|-----------|
//! | `InsufficientData` | `Truncated` | A required read or region was shorter than the format demands |
//! | `InvalidMagic` | `Format` | Wrong magic means not an ext2 image, not corruption |
//! | `InvalidField` | `Format` | Structurally invalid on-disk values |
//! | `IntegerConversion` | `Parse` | Arithmetic overflow in parsed values |
//!
//! ## Propagation Policy
//!
//! Decode failures (`Truncated`, `Format`, `Parse`) abort the current
//! operation; the interactive shell reports them and keeps running, the
//! batch CLI exits non-zero. `NotFound` is a normal query outcome and must
//! never terminate the process. `Output` failures are reported per
//! operation and leave in-memory state untouched.

use thiserror::Error;

/// Unified error type for all extshell operations.
#[derive(Debug, Error)]
pub enum EshError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required read returned fewer bytes than requested: the image is
    /// too short or corrupt.
    #[error("image truncated: need {needed} bytes at offset {offset}, got {actual}")]
    Truncated {
        offset: u64,
        needed: usize,
        actual: usize,
    },

    /// Inode number is zero or beyond the cached inode table.
    #[error("invalid inode number {ino} (table holds {count} inodes)")]
    InvalidInode { ino: u32, count: u32 },

    /// A name lookup found no matching entry. A normal query result, not
    /// a fault.
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory operation was attempted on a non-directory inode.
    #[error("inode {ino} is not a directory")]
    NotDirectory { ino: u32 },

    /// The extraction destination could not be created or written.
    #[error("cannot write {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },

    /// Invalid on-disk format (wrong magic, out-of-range field values).
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// Parse-layer error surfaced to the user.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result alias using `EshError`.
pub type Result<T> = std::result::Result<T, EshError>;
