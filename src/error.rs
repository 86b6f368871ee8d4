//! Crate-level error type
//!
//! The managers each have their own error enums; this type aggregates
//! them for the transport-facing operations on [`ServiceContext`].
//!
//! [`ServiceContext`]: crate::context::ServiceContext

use crate::inlet::InletError;
use crate::record::RecordError;
use crate::relay::RelayError;
use crate::source::SourceError;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Uid not present in the resolver cache
    StreamNotFound(String),
    /// Discovery backend failure
    Source(SourceError),
    /// Inlet manager failure
    Inlet(InletError),
    /// Recorder failure
    Record(RecordError),
    /// Relay session failure
    Relay(RelayError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::StreamNotFound(uid) => {
                write!(f, "Stream not found: {}. Resolve streams first", uid)
            }
            Error::Source(err) => write!(f, "{}", err),
            Error::Inlet(err) => write!(f, "{}", err),
            Error::Record(err) => write!(f, "{}", err),
            Error::Relay(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<SourceError> for Error {
    fn from(err: SourceError) -> Self {
        Error::Source(err)
    }
}

impl From<InletError> for Error {
    fn from(err: InletError) -> Self {
        Error::Inlet(err)
    }
}

impl From<RecordError> for Error {
    fn from(err: RecordError) -> Self {
        Error::Record(err)
    }
}

impl From<RelayError> for Error {
    fn from(err: RelayError) -> Self {
        Error::Relay(err)
    }
}

/// Convenience alias for results with the crate error type
pub type Result<T> = std::result::Result<T, Error>;
