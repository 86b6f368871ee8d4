//! Upstream stream sources
//!
//! Everything the relay knows about where samples come from: descriptor
//! snapshots, the sample message type, and the trait seam hiding the
//! discovery protocol. The [`mock`] module provides hardware-free
//! implementations for demos and tests.

pub mod descriptor;
pub mod mock;
pub mod sample;
pub mod upstream;

pub use descriptor::{ChannelFormat, StreamDescriptor};
pub use sample::{ChannelValues, Sample};
pub use upstream::{
    epoch_seconds, Discovery, DiscoveredStream, Inlet, InletSource, SourceError,
};
