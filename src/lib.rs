//! Shared-inlet relay and recorder for multi-channel sensor telemetry
//!
//! This crate multiplexes live sensor streams (biosignals and similar)
//! discovered on the local network out to many concurrent consumers, and
//! can record any subscribed stream to disk while relaying continues.
//!
//! # Architecture
//!
//! ```text
//!   discovery ──► StreamResolver ────────────┐
//!   (opaque)      uid → descriptor + source  │ lookup
//!                                            ▼
//!                                     ServiceContext
//!                            ┌───────────────┴───────────────┐
//!                            ▼                               ▼
//!                      InletManager ◄──── subscribe ─── RecorderManager
//!                  one inlet per stream,                one write task per
//!                  one pull task fanning                recording: NDJSON log,
//!                  out to bounded queues                metadata, zip archive
//!                            │
//!                   per-subscriber queues
//!                            ▼
//!                      relay sessions ──► SampleSink (transport seam)
//! ```
//!
//! Live relay is best-effort: subscriber queues are small and drop their
//! oldest samples under backpressure so viewers stay current. The
//! recording path subscribes with a large queue and guarantees that every
//! sample it accepted reaches disk on a graceful stop.
//!
//! The HTTP/WebSocket transport, process bootstrapping and the discovery
//! wire protocol are out of scope here; they plug in via [`Discovery`],
//! [`SampleSink`] and the operations on [`ServiceContext`].

pub mod config;
pub mod context;
pub mod error;
pub mod inlet;
pub mod record;
pub mod relay;
pub mod resolver;
pub mod source;

pub use config::{InletConfig, RecorderConfig};
pub use context::{HealthStatus, ServiceContext};
pub use error::{Error, Result};
pub use inlet::{InletManager, InletStats, Subscription};
pub use record::{RecorderManager, RecordingSession};
pub use relay::{SampleSink, SinkClosed};
pub use resolver::StreamResolver;
pub use source::{
    ChannelFormat, ChannelValues, Discovery, DiscoveredStream, Inlet, InletSource, Sample,
    SourceError, StreamDescriptor,
};
