//! Error types for volume operations

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for volume operations
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("Trouble reading file: {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<VolumeError>,
    },

    #[error("unable to read from file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: Box<VolumeError>,
    },

    #[error("{message}: {}", path.display())]
    DimensionQuery { path: PathBuf, message: String },

    #[error("{message}: {}", path.display())]
    StepQuery { path: PathBuf, message: String },

    #[error("No volumes given")]
    EmptyBatch,

    #[error("Invalid volume format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Checksum mismatch in brick {index} (expected {expected:#010x}, found {found:#010x})")]
    ChecksumMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid data type: expected {expected}, found {found}")]
    InvalidDataType {
        expected: crate::types::DataType,
        found: crate::types::DataType,
    },
}

impl VolumeError {
    /// Wrap a lower-level failure as an open failure of `path`
    pub fn open(path: impl Into<PathBuf>, source: VolumeError) -> Self {
        VolumeError::Open {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a lower-level failure as a read failure of `path`
    pub fn read(path: impl Into<PathBuf>, source: VolumeError) -> Self {
        VolumeError::Read {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Specialized Result type for volume operations
pub type Result<T> = std::result::Result<T, VolumeError>;

impl From<bincode::Error> for VolumeError {
    fn from(err: bincode::Error) -> Self {
        VolumeError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for VolumeError {
    fn from(err: serde_json::Error) -> Self {
        VolumeError::Serialization(err.to_string())
    }
}
