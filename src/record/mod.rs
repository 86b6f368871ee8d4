//! Stream recording
//!
//! Records a subscribed stream to durable storage while relaying
//! continues: newline-delimited sample records with buffered flushes, a
//! JSON metadata document, and a zip archive bundling both on stop.

pub mod archive;
pub mod error;
pub mod manager;
pub mod session;
mod writer;

pub use archive::{DATA_MEMBER, METADATA_MEMBER};
pub use error::RecordError;
pub use manager::RecorderManager;
pub use session::RecordingSession;
