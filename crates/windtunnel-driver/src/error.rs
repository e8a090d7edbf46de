//! Driver error types using `thiserror`.

use std::path::PathBuf;

use thiserror::Error;
use windtunnel_core::CoreError;

/// Result alias for the driver crate.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors that stop a run.
///
/// None of these are retried: a physical simulation record with a gap in it is
/// worse than no record at all.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The run configuration failed validation.
    #[error("Configuration rejected: {0}")]
    Config(#[from] CoreError),

    /// The configuration file could not be parsed.
    #[error("Cannot parse configuration {path}: {source}")]
    ConfigFile {
        /// File that failed to parse
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// The solver reported a numerical failure.
    #[error("Solver diverged at step {step}: {reason}")]
    SolverDivergence {
        /// Simulation step at which the failure was detected
        step: u64,
        /// Solver-provided description
        reason: String,
    },

    /// The body mesh could not be loaded or placed.
    #[error("Mesh {path}: {reason}")]
    Mesh {
        /// Mesh file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The frame renderer failed.
    #[error("Frame export failed at step {step}: {reason}")]
    Render {
        /// Simulation step of the frame
        step: u64,
        /// Renderer-provided description
        reason: String,
    },

    /// A data file is malformed.
    #[error("Malformed data in {path} line {line}: {reason}")]
    Parse {
        /// File being read
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What could not be parsed
        reason: String,
    },

    /// File system failure on an output or input path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl DriverError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from the numerical solver.
    #[must_use]
    pub fn is_divergence(&self) -> bool {
        matches!(self, Self::SolverDivergence { .. })
    }
}
