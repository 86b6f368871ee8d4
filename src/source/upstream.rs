//! Upstream seam traits
//!
//! The discovery protocol and its wire format live behind these traits:
//! the rest of the crate only ever sees descriptors, openable sources and
//! pullable inlets. Real implementations bind a network discovery library;
//! the [`mock`](super::mock) module provides in-process implementations.
//!
//! Opening an inlet may block on hardware or network for a while, so
//! [`InletSource::open`] is async and the inlet manager bounds it with a
//! timeout. [`Inlet::close`] is synchronous: it is called inside the
//! manager's teardown critical section.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::descriptor::StreamDescriptor;
use super::sample::Sample;

/// Error from the upstream discovery/transport backend
#[derive(Debug, Clone)]
pub enum SourceError {
    /// The backend did not respond within its budget
    Timeout,
    /// The stream endpoint is gone or refused the connection
    Unavailable(String),
    /// Any other backend failure
    Backend(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Timeout => write!(f, "upstream operation timed out"),
            SourceError::Unavailable(msg) => write!(f, "upstream unavailable: {}", msg),
            SourceError::Backend(msg) => write!(f, "upstream backend error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// A stream found by discovery: its descriptor plus a way to open it
pub struct DiscoveredStream {
    /// Immutable metadata snapshot
    pub descriptor: StreamDescriptor,
    /// Handle used to open a live inlet for this stream
    pub source: Arc<dyn InletSource>,
}

/// Network discovery of available streams
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Query the network for up to `timeout` and return everything found
    async fn resolve(&self, timeout: Duration) -> Result<Vec<DiscoveredStream>, SourceError>;
}

/// Factory for live inlets of one discovered stream
///
/// Every call to `open` establishes a fresh connection; the returned inlet
/// is never shared between independent open calls.
#[async_trait]
pub trait InletSource: Send + Sync {
    /// Open a new inlet for this stream
    async fn open(&self) -> Result<Arc<dyn Inlet>, SourceError>;
}

/// An open connection receiving sample data from one upstream stream
#[async_trait]
pub trait Inlet: Send + Sync {
    /// Pull up to `max_samples` samples, waiting at most `timeout`
    ///
    /// An empty vec means no data was available within the budget.
    async fn pull_chunk(
        &self,
        timeout: Duration,
        max_samples: usize,
    ) -> Result<Vec<Sample>, SourceError>;

    /// Close the connection; further pulls fail
    fn close(&self);
}

/// Current wall-clock time as epoch seconds
///
/// Timestamp base used for descriptor creation times, recording bookkeeping
/// and the mock generators.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
