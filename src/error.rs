//! Crate-wide error surface.
//!
//! Every fallible operation returns a [`FddError`] built from one of the
//! six sub-kinds below. Nothing here is retried internally and nothing is
//! suppressed — nested codec errors propagate unchanged (see `CodecError`
//! in `codec`, which is wrapped rather than flattened).

use std::io;
use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown codec name '{0}'")]
    UnknownCodec(String),
    #[error("Keys in a keyless split cannot be loaded with load_keys()")]
    KeylessLoadKeys,
    #[error("Invalid split expression: {0}")]
    InvalidSplitExpr(String),
    #[error("Invalid open-time option: {0}")]
    InvalidOption(String),
}

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("File is too small to contain a trailer")]
    TruncatedTrailer,
    #[error("Section table length {0} exceeds file size")]
    SectionTableOverflow(u64),
    #[error("Unknown split variant discriminant byte {0:#04x}")]
    UnknownSplitDiscriminant(u8),
    #[error("Section '{0}' referenced but not present in the section table")]
    MissingSection(String),
    #[error("Corrupt section table: {0}")]
    CorruptSectionTable(String),
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Row has {given} cells, schema declares {expected}")]
    Arity { expected: usize, given: usize },
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("File has no column schema (schemaless)")]
    Schemaless,
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Key not found")]
    KeyNotFound,
    #[error("Split '{0}' not found")]
    SplitNotFound(String),
    #[error("Split '{0}' already exists (pass overwrite=true to replace it)")]
    SplitExists(String),
    #[error("Duplicate key on insert")]
    DuplicateKey,
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Row setter already finalized")]
    AlreadyFinalized,
    #[error("Attempted to write through a read-only reader")]
    ReadOnly,
    #[error("Attempted to append after close")]
    AppendAfterClose,
    #[error("Cell size mismatch on in-place overwrite: existing {existing} bytes, new {new} bytes")]
    CellSizeMismatch { existing: usize, new: usize },
    #[error("Writer already closed")]
    AlreadyClosed,
}

#[derive(Error, Debug)]
pub enum FddError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, FddError>;
