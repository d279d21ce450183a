//! Error types shared across the solver crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while setting up or running a simulation.
///
/// Configuration, scan-path, and boundary errors are fatal at startup; I/O
/// errors are fatal at the point the output is attempted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read input file '{}': {source}", path.display())]
    InputRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse input file '{}': {source}", path.display())]
    InputParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read scan path file '{}': {source}", path.display())]
    ScanPathRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed scan path segment at line {line}: {reason}")]
    ScanPathParse { line: usize, reason: String },

    #[error("scan path '{}' contains no segments", path.display())]
    ScanPathEmpty { path: PathBuf },

    #[error("boundary condition '{kind}' requires a value")]
    BoundaryValueMissing { kind: String },

    #[error("unknown boundary condition '{kind}'")]
    UnknownBoundary { kind: String },

    #[error("{cells} cells along axis {axis} cannot be split across {ranks} ranks")]
    PartitionInfeasible {
        axis: usize,
        cells: usize,
        ranks: usize,
    },

    #[error("failed to write {what}: {source}")]
    OutputIo {
        what: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
