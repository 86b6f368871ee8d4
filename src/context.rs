//! Service context
//!
//! Explicit dependency object bundling the resolver and both managers.
//! Transport handlers hold an `Arc<ServiceContext>` and call these
//! operations; nothing in the crate lives in process-wide state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{InletConfig, RecorderConfig};
use crate::error::{Error, Result};
use crate::inlet::InletManager;
use crate::record::{RecorderManager, RecordingSession};
use crate::relay::{self, SampleSink};
use crate::resolver::StreamResolver;
use crate::source::{epoch_seconds, Discovery, StreamDescriptor};

/// Liveness report
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Always "ok" when the context is reachable
    pub status: &'static str,
    /// Current time, epoch seconds
    pub time: f64,
}

/// Shared state behind every transport handler
pub struct ServiceContext {
    resolver: StreamResolver,
    inlets: Arc<InletManager>,
    recorder: RecorderManager,
}

impl ServiceContext {
    /// Create a context with default configuration
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self::with_config(discovery, InletConfig::default(), RecorderConfig::default())
    }

    /// Create a context with custom inlet and recorder configuration
    pub fn with_config(
        discovery: Arc<dyn Discovery>,
        inlet_config: InletConfig,
        recorder_config: RecorderConfig,
    ) -> Self {
        let inlets = Arc::new(InletManager::with_config(inlet_config));
        let recorder = RecorderManager::with_config(Arc::clone(&inlets), recorder_config);
        Self {
            resolver: StreamResolver::new(discovery),
            inlets,
            recorder,
        }
    }

    /// The descriptor cache
    pub fn resolver(&self) -> &StreamResolver {
        &self.resolver
    }

    /// The shared inlet manager
    pub fn inlets(&self) -> &Arc<InletManager> {
        &self.inlets
    }

    /// The recording manager
    pub fn recorder(&self) -> &RecorderManager {
        &self.recorder
    }

    /// Re-discover streams and return the fresh descriptor set
    pub async fn resolve_streams(
        &self,
        timeout: Duration,
    ) -> Result<Vec<Arc<StreamDescriptor>>> {
        Ok(self.resolver.resolve(timeout).await?)
    }

    /// Descriptor for one stream in the current cache generation
    pub fn describe_stream(&self, uid: &str) -> Result<Arc<StreamDescriptor>> {
        self.resolver
            .descriptor(uid)
            .ok_or_else(|| Error::StreamNotFound(uid.to_string()))
    }

    /// Run a live relay session for one downstream connection
    pub async fn relay(
        &self,
        uid: &str,
        downsample: u64,
        sink: &mut dyn SampleSink,
        shutdown: CancellationToken,
    ) -> Result<()> {
        relay::run(&self.resolver, &self.inlets, uid, downsample, sink, shutdown).await?;
        Ok(())
    }

    /// Start recording a resolved stream
    ///
    /// Not-found for an unknown uid, before any recorder state is touched.
    pub async fn start_recording(
        &self,
        uid: &str,
        label: Option<&str>,
        downsample: u64,
    ) -> Result<RecordingSession> {
        let Some((descriptor, source)) = self.resolver.lookup(uid) else {
            return Err(Error::StreamNotFound(uid.to_string()));
        };
        Ok(self
            .recorder
            .start(&descriptor, &source, label, downsample)
            .await?)
    }

    /// Stop a recording; idempotent
    pub async fn stop_recording(&self, id: &str) -> Result<RecordingSession> {
        Ok(self.recorder.stop(id).await?)
    }

    /// Snapshots of all recordings
    pub async fn list_recordings(&self) -> Vec<RecordingSession> {
        self.recorder.list().await
    }

    /// Snapshot of one recording
    pub async fn get_recording(&self, id: &str) -> Option<RecordingSession> {
        self.recorder.get(id).await
    }

    /// Archive location and suggested download name, once the archive exists
    pub async fn recording_archive(&self, id: &str) -> Option<(PathBuf, String)> {
        let session = self.recorder.get(id).await?;
        if !session.archive_path.exists() {
            return None;
        }
        let name = session.archive_download_name();
        Some((session.archive_path, name))
    }

    /// Liveness report
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            time: epoch_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::MockDiscovery;

    fn context(root: &std::path::Path) -> ServiceContext {
        ServiceContext::with_config(
            Arc::new(MockDiscovery::standard()),
            InletConfig::default()
                .pull_timeout(Duration::from_millis(5))
                .idle_backoff(Duration::from_millis(1)),
            RecorderConfig::with_root(root),
        )
    }

    #[tokio::test]
    async fn test_describe_requires_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        assert!(matches!(
            ctx.describe_stream("mock-eeg-001"),
            Err(Error::StreamNotFound(_))
        ));

        let streams = ctx.resolve_streams(Duration::from_millis(10)).await.unwrap();
        assert_eq!(streams.len(), 3);
        assert!(ctx.describe_stream("mock-eeg-001").is_ok());
    }

    #[tokio::test]
    async fn test_recording_unknown_uid_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.resolve_streams(Duration::from_millis(10)).await.unwrap();

        let result = ctx.start_recording("uid-missing", None, 1).await;
        assert!(matches!(result, Err(Error::StreamNotFound(_))));
        assert!(ctx.list_recordings().await.is_empty());
        assert_eq!(ctx.inlets().inlet_count().await, 0);
    }

    #[tokio::test]
    async fn test_record_mock_stream_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.resolve_streams(Duration::from_millis(10)).await.unwrap();

        let session = ctx
            .start_recording("mock-eeg-001", Some("demo"), 1)
            .await
            .unwrap();
        assert!(session.active);
        assert!(ctx.recording_archive(&session.id).await.is_none());

        // Let the 256 Hz generator produce a few samples
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stopped = ctx.stop_recording(&session.id).await.unwrap();

        assert!(!stopped.active);
        let (archive_path, download_name) =
            ctx.recording_archive(&session.id).await.unwrap();
        assert!(archive_path.exists());
        assert!(download_name.starts_with("MockEEG_"));
        assert_eq!(ctx.inlets().inlet_count().await, 0);
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let health = ctx.health();
        assert_eq!(health.status, "ok");
        assert!(health.time > 0.0);

        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["status"], "ok");
    }
}
