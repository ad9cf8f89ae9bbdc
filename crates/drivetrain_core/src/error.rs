//! # Core Error Types
//!
//! All errors that can occur while setting up the canonical state.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the core crate.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Creating, opening or mapping the shared segment failed.
    #[error("shared segment {path} unavailable: {source}")]
    Segment {
        /// Backing file of the segment.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The segment file exists but cannot hold a published state.
    #[error("shared segment {path} is {len} bytes, expected at least {expected}")]
    SegmentTooSmall {
        /// Backing file of the segment.
        path: PathBuf,
        /// Actual file length.
        len: u64,
        /// Required length.
        expected: usize,
    },

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::SimConfig`].
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration parsed but holds values the simulation cannot use.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoreError {
    pub(crate) fn segment(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Segment {
            path: path.into(),
            source,
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
