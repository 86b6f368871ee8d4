//! Inlet manager error types

use crate::source::SourceError;

/// Error type for inlet manager operations
#[derive(Debug, Clone)]
pub enum InletError {
    /// Upstream open did not complete within the configured timeout
    OpenTimeout(String),
    /// Upstream open failed
    OpenFailed(String, SourceError),
}

impl std::fmt::Display for InletError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InletError::OpenTimeout(uid) => {
                write!(f, "Timed out opening inlet for stream {}", uid)
            }
            InletError::OpenFailed(uid, err) => {
                write!(f, "Failed to open inlet for stream {}: {}", uid, err)
            }
        }
    }
}

impl std::error::Error for InletError {}
