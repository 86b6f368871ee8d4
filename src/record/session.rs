//! Recording session snapshots and metadata
//!
//! [`RecordingSession`] is the read-only view handed to callers; the
//! recorder owns the mutable state behind it. The metadata document
//! written next to the sample log is rebuilt from that state, so a
//! stopped session's artifacts never change again.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

use crate::source::StreamDescriptor;

/// Read-only snapshot of one recording session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Session id (12 hex chars)
    pub id: String,

    /// Uid of the recorded stream
    pub stream_uid: String,

    /// Name of the recorded stream
    pub stream_name: String,

    /// Session directory
    #[serde(rename = "dir")]
    pub dir_path: PathBuf,

    /// Metadata document path
    #[serde(rename = "metadata")]
    pub meta_path: PathBuf,

    /// Sample log path
    #[serde(rename = "data")]
    pub data_path: PathBuf,

    /// Archive path (exists only after stop)
    #[serde(rename = "archive")]
    pub archive_path: PathBuf,

    /// Start time, epoch seconds
    pub started_at: f64,

    /// Start time, ISO-8601 UTC
    pub started_at_iso: String,

    /// Stop time, epoch seconds; `None` while active
    pub stopped_at: Option<f64>,

    /// Stop time, ISO-8601 UTC; `None` while active
    pub stopped_at_iso: Option<String>,

    /// Samples accepted by the write task so far
    pub sample_count: u64,

    /// Keep-every-Nth decimation factor
    pub downsample: u64,

    /// True until the session is stopped
    pub active: bool,
}

impl RecordingSession {
    /// Suggested filename for serving the archive
    pub fn archive_download_name(&self) -> String {
        format!("{}_{}.zip", safe_slug(&self.stream_name), self.id)
    }
}

/// Fields only known once a recording has stopped
pub(super) struct FinalMetadata {
    pub stopped_at: f64,
    pub duration_seconds: f64,
    pub sample_count: u64,
}

/// Build the metadata document for a session
///
/// Called twice per session: at start without `finished`, and at stop with
/// it. The stop call rebuilds the whole document from the frozen state,
/// which keeps a repeated stop byte-identical.
pub(super) fn metadata_document(
    id: &str,
    label: Option<&str>,
    started_at: f64,
    downsample: u64,
    descriptor: &StreamDescriptor,
    finished: Option<&FinalMetadata>,
) -> serde_json::Value {
    let mut doc = json!({
        "recording": {
            "id": id,
            "label": label,
            "startedAt": started_at,
            "startedAtIso": iso_utc(started_at),
            "downsample": downsample,
        },
        "stream": descriptor,
        "backend": {
            "crate": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
    });

    if let Some(finished) = finished {
        let recording = &mut doc["recording"];
        recording["stoppedAt"] = json!(finished.stopped_at);
        recording["stoppedAtIso"] = json!(iso_utc(finished.stopped_at));
        recording["durationSeconds"] = json!(finished.duration_seconds);
        recording["sampleCount"] = json!(finished.sample_count);
        recording["format"] = json!({
            "data": "ndjson",
            "schema": {"t": "source_timestamp", "d": "channel_data"},
        });
    }

    doc
}

/// Epoch seconds as an ISO-8601 UTC string with a `Z` suffix
pub(crate) fn iso_utc(ts: f64) -> String {
    let secs = ts.div_euclid(1.0) as i64;
    let nanos = (ts.rem_euclid(1.0) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_else(|| "invalid-timestamp".to_string())
}

/// Sanitize a label or stream name for use in a directory name
///
/// Keeps alphanumerics and `-_.`, turns whitespace into `-`, drops the
/// rest, trims separator characters from both ends and caps the length.
pub(crate) fn safe_slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.trim().chars() {
        if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        } else if ch.is_whitespace() {
            out.push('-');
        }
    }
    let slug: String = out
        .trim_matches(|c: char| matches!(c, '-' | '.' | '_'))
        .chars()
        .take(80)
        .collect();
    if slug.is_empty() {
        "stream".to_string()
    } else {
        slug
    }
}
