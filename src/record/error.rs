//! Recorder error types

use std::path::PathBuf;

use crate::inlet::InletError;

/// Error type for recorder operations
#[derive(Debug)]
pub enum RecordError {
    /// No recording with the given id
    NotFound(String),
    /// The derived recording directory already exists
    DirectoryExists(PathBuf),
    /// Subscribing to the stream's inlet failed
    Inlet(InletError),
    /// Filesystem failure creating or updating recording artifacts
    Io(std::io::Error),
    /// Archive creation failed
    Archive(zip::result::ZipError),
    /// Metadata serialization failed
    Serialize(serde_json::Error),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::NotFound(id) => write!(f, "Recording not found: {}", id),
            RecordError::DirectoryExists(path) => {
                write!(f, "Recording directory already exists: {}", path.display())
            }
            RecordError::Inlet(err) => write!(f, "Recording inlet error: {}", err),
            RecordError::Io(err) => write!(f, "Recording I/O error: {}", err),
            RecordError::Archive(err) => write!(f, "Recording archive error: {}", err),
            RecordError::Serialize(err) => write!(f, "Recording metadata error: {}", err),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<InletError> for RecordError {
    fn from(err: InletError) -> Self {
        RecordError::Inlet(err)
    }
}

impl From<std::io::Error> for RecordError {
    fn from(err: std::io::Error) -> Self {
        RecordError::Io(err)
    }
}

impl From<zip::result::ZipError> for RecordError {
    fn from(err: zip::result::ZipError) -> Self {
        RecordError::Archive(err)
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::Serialize(err)
    }
}
