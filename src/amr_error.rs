//! AmrReduceError: Unified error type for amr-reduce public APIs
//!
//! Every fallible operation in the crate (tree construction, collaborator
//! I/O, dataset reduction, configuration) reports through this type. None of
//! the conditions are retried locally: each one aborts the reduction of the
//! file being processed and is surfaced to the batch caller.

use crate::io::ElementKind;
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for amr-reduce operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmrReduceError {
    /// A dataset requested by name does not exist (or is not a variable dataset).
    #[error("No dataset named '{0}' found")]
    DatasetNotFound(String),
    /// An operation was attempted after the source or sink was closed.
    #[error("The {0} was closed, no access to datasets")]
    ResourceClosed(&'static str),
    /// A dataset holds an element type the operation cannot handle.
    #[error("Unsupported datatype {kind:?} in dataset '{dataset}'")]
    UnsupportedType { dataset: String, kind: ElementKind },
    /// The parent/children relation encoding is inconsistent.
    #[error("Malformed block relation data: {0}")]
    MalformedRelations(String),
    /// A required integer scalar is missing from the scalar table.
    #[error("There is no integer scalar with the name '{0}'")]
    MissingScalar(String),
    /// Block dimensions must be even and non-zero to be halved.
    #[error("Block dimensions {x}x{y}x{z} cannot be halved (must be even and non-zero)")]
    InvalidDimensions { x: usize, y: usize, z: usize },
    /// A per-block cell array does not have `X*Y*Z` elements.
    #[error("Block {block}: expected {expected} cells, found {found}")]
    BlockLengthMismatch {
        block: u32,
        expected: usize,
        found: usize,
    },
    /// A dataset's shape does not agree with the file's block count.
    #[error("Dataset '{dataset}': expected {expected} elements, found {found}")]
    ShapeMismatch {
        dataset: String,
        expected: usize,
        found: usize,
    },
    /// A block id outside `1..=N` was referenced.
    #[error("Unknown block id {0}")]
    UnknownBlock(i64),
    /// A composite reduction needs a second dataset that is absent.
    #[error("Dataset '{dataset}' needs auxiliary dataset '{auxiliary}', which is missing")]
    MissingAuxiliary { dataset: String, auxiliary: String },
    /// The strategy name is not one of the known reduction strategies.
    #[error("Unknown reducer type '{0}'")]
    UnknownStrategy(String),
    /// The collaborator could not open, create or write a file.
    #[error("I/O failure: {0}")]
    Io(String),
    /// The snapshot container could not be encoded or decoded.
    #[error("Snapshot container error: {0}")]
    Codec(String),
    /// A file within a batch failed; wraps the cause with the file path.
    #[error("An error occurred while processing file '{}': {reason}", path.display())]
    FileFailed { path: PathBuf, reason: String },
}

impl From<std::io::Error> for AmrReduceError {
    fn from(err: std::io::Error) -> Self {
        AmrReduceError::Io(err.to_string())
    }
}

impl From<bincode::Error> for AmrReduceError {
    fn from(err: bincode::Error) -> Self {
        AmrReduceError::Codec(err.to_string())
    }
}
