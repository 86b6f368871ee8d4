//! Live relay sessions
//!
//! One relay session per downstream connection: it consumes one subscriber
//! queue and forwards serialized samples to the transport. The transport
//! itself (WebSocket or otherwise) lives behind the [`SampleSink`] seam;
//! this module neither knows nor cares how frames reach the client.
//!
//! Delivery here is best-effort by design: a slow client's queue drops its
//! oldest samples so the view stays current. Durable capture is the
//! recorder's job, not the relay's.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::inlet::{InletError, InletManager};
use crate::resolver::StreamResolver;

/// Error type for relay sessions
#[derive(Debug)]
pub enum RelayError {
    /// Uid not present in the resolver cache; the client must resolve first
    StreamNotFound(String),
    /// Subscribing to the stream's inlet failed
    Inlet(InletError),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::StreamNotFound(uid) => {
                write!(f, "Stream not found: {}. Resolve streams first", uid)
            }
            RelayError::Inlet(err) => write!(f, "Relay inlet error: {}", err),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<InletError> for RelayError {
    fn from(err: InletError) -> Self {
        RelayError::Inlet(err)
    }
}

/// The downstream connection is gone
#[derive(Debug, Clone, Copy)]
pub struct SinkClosed;

impl std::fmt::Display for SinkClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink closed")
    }
}

impl std::error::Error for SinkClosed {}

/// Outbound half of one downstream connection
///
/// Implemented by the transport layer; an error from `send_frame` ends the
/// relay session.
#[async_trait]
pub trait SampleSink: Send {
    /// Transmit one serialized sample frame
    async fn send_frame(&mut self, frame: String) -> Result<(), SinkClosed>;
}

/// Run one relay session until the client disconnects or `shutdown` fires
///
/// Subscribes with the small live queue capacity, forwards every Nth
/// sample per `downsample` (clamped to ≥ 1), and releases the shared
/// inlet on every exit path.
pub async fn run(
    resolver: &StreamResolver,
    inlets: &InletManager,
    uid: &str,
    downsample: u64,
    sink: &mut dyn SampleSink,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let Some((descriptor, source)) = resolver.lookup(uid) else {
        return Err(RelayError::StreamNotFound(uid.to_string()));
    };
    let downsample = downsample.max(1);

    let capacity = inlets.config().live_queue_capacity;
    let mut subscription = inlets.subscribe(&descriptor, &source, capacity).await?;
    let subscriber = subscription.id();
    tracing::debug!(uid = %uid, downsample = downsample, "Relay session started");

    let mut index = 0u64;
    loop {
        let sample = tokio::select! {
            _ = shutdown.cancelled() => break,
            sample = subscription.recv() => match sample {
                Some(sample) => sample,
                // Inlet torn down underneath us
                None => break,
            },
        };

        index += 1;
        if index % downsample != 0 {
            continue;
        }

        let frame = match serde_json::to_string(&sample) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(uid = %uid, error = %err, "Sample serialization failed");
                break;
            }
        };

        if sink.send_frame(frame).await.is_err() {
            tracing::debug!(uid = %uid, "Relay client disconnected");
            break;
        }
    }

    // Unconditional: every loop exit releases the shared inlet
    inlets.unsubscribe(uid, subscriber).await;
    tracing::debug!(uid = %uid, "Relay session ended");
    Ok(())
}
