//! Recording manager
//!
//! Layered on top of the inlet manager: each active recording owns one
//! inlet subscription with a large queue and one write task draining it to
//! disk. Stopping is idempotent and finalizes the session's artifacts
//! (metadata rewrite plus archive) exactly once.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RecorderConfig;
use crate::inlet::{InletManager, SubscriberId};
use crate::source::{epoch_seconds, InletSource, StreamDescriptor};

use super::archive;
use super::error::RecordError;
use super::session::{iso_utc, metadata_document, safe_slug, FinalMetadata, RecordingSession};
use super::writer::{write_loop, WriterParams};

/// Mutable state of one recording, owned by the manager
struct ActiveRecording {
    id: String,
    stream_uid: String,
    stream_name: String,
    label: Option<String>,
    descriptor: Arc<StreamDescriptor>,
    dir_path: PathBuf,
    meta_path: PathBuf,
    data_path: PathBuf,
    archive_path: PathBuf,
    started_at: f64,
    downsample: u64,
    sample_count: Arc<AtomicU64>,
    stopped_at: Option<f64>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    subscriber: SubscriberId,
}

impl ActiveRecording {
    fn snapshot(&self) -> RecordingSession {
        RecordingSession {
            id: self.id.clone(),
            stream_uid: self.stream_uid.clone(),
            stream_name: self.stream_name.clone(),
            dir_path: self.dir_path.clone(),
            meta_path: self.meta_path.clone(),
            data_path: self.data_path.clone(),
            archive_path: self.archive_path.clone(),
            started_at: self.started_at,
            started_at_iso: iso_utc(self.started_at),
            stopped_at: self.stopped_at,
            stopped_at_iso: self.stopped_at.map(iso_utc),
            sample_count: self.sample_count.load(Ordering::Relaxed),
            downsample: self.downsample,
            active: self.stopped_at.is_none(),
        }
    }
}

/// Manages recording sessions over shared inlets
pub struct RecorderManager {
    config: RecorderConfig,
    inlets: Arc<InletManager>,
    sessions: Mutex<HashMap<String, ActiveRecording>>,
}

impl RecorderManager {
    /// Create a recorder with default configuration
    pub fn new(inlets: Arc<InletManager>) -> Self {
        Self::with_config(inlets, RecorderConfig::default())
    }

    /// Create a recorder with custom configuration
    pub fn with_config(inlets: Arc<InletManager>, config: RecorderConfig) -> Self {
        Self {
            config,
            inlets,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Get the recorder configuration
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Start recording a stream
    ///
    /// Allocates the session id and an exclusive directory, writes the
    /// initial metadata document, subscribes to the stream's inlet with
    /// the recorder's large queue capacity and starts the write task.
    pub async fn start(
        &self,
        descriptor: &Arc<StreamDescriptor>,
        source: &Arc<dyn InletSource>,
        label: Option<&str>,
        downsample: u64,
    ) -> Result<RecordingSession, RecordError> {
        let downsample = downsample.max(1);
        let mut sessions = self.sessions.lock().await;

        let id: String = Uuid::new_v4().simple().to_string()[..12].to_string();
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let slug = safe_slug(label.unwrap_or(&descriptor.name));
        let dir_path = self.config.root_dir.join(format!("{}_{}_{}", stamp, slug, id));

        fs::create_dir_all(&self.config.root_dir)?;
        if let Err(err) = fs::create_dir(&dir_path) {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                return Err(RecordError::DirectoryExists(dir_path));
            }
            return Err(err.into());
        }

        let meta_path = dir_path.join(archive::METADATA_MEMBER);
        let data_path = dir_path.join(archive::DATA_MEMBER);
        let archive_path = dir_path.join("recording.zip");
        let started_at = epoch_seconds();

        let doc = metadata_document(&id, label, started_at, downsample, descriptor, None);
        fs::write(&meta_path, serde_json::to_string_pretty(&doc)?)?;

        let subscription = match self
            .inlets
            .subscribe(descriptor, source, self.config.queue_capacity)
            .await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                // The directory holds nothing irreplaceable yet
                let _ = fs::remove_dir_all(&dir_path);
                return Err(err.into());
            }
        };
        let subscriber = subscription.id();

        let cancel = CancellationToken::new();
        let sample_count = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(write_loop(
            subscription,
            WriterParams {
                rec_id: id.clone(),
                data_path: data_path.clone(),
                downsample,
                flush_max_lines: self.config.flush_max_lines,
                flush_interval: self.config.flush_interval,
                sample_count: Arc::clone(&sample_count),
                cancel: cancel.clone(),
            },
        ));

        tracing::info!(
            id = %id,
            uid = %descriptor.uid,
            name = %descriptor.name,
            downsample = downsample,
            dir = %dir_path.display(),
            "Recording started"
        );

        let recording = ActiveRecording {
            id: id.clone(),
            stream_uid: descriptor.uid.clone(),
            stream_name: descriptor.name.clone(),
            label: label.map(str::to_string),
            descriptor: Arc::clone(descriptor),
            dir_path,
            meta_path,
            data_path,
            archive_path,
            started_at,
            downsample,
            sample_count,
            stopped_at: None,
            cancel,
            task: Some(task),
            subscriber,
        };
        let snapshot = recording.snapshot();
        sessions.insert(id, recording);
        Ok(snapshot)
    }

    /// Stop a recording; repeated stops return the frozen state unchanged
    ///
    /// The write task is cancelled and awaited; its final flush completes
    /// before the metadata is finalized and the archive is built, so the
    /// archive always bundles the complete sample log.
    pub async fn stop(&self, id: &str) -> Result<RecordingSession, RecordError> {
        let mut sessions = self.sessions.lock().await;
        let Some(recording) = sessions.get_mut(id) else {
            return Err(RecordError::NotFound(id.to_string()));
        };

        if recording.stopped_at.is_some() {
            return Ok(recording.snapshot());
        }

        let stopped_at = epoch_seconds();
        recording.stopped_at = Some(stopped_at);
        recording.cancel.cancel();
        if let Some(task) = recording.task.take() {
            if let Err(err) = task.await {
                tracing::error!(id = %id, error = %err, "Write task did not shut down cleanly");
            }
        }

        self.inlets
            .unsubscribe(&recording.stream_uid, recording.subscriber)
            .await;

        let sample_count = recording.sample_count.load(Ordering::Relaxed);
        let finished = FinalMetadata {
            stopped_at,
            duration_seconds: (stopped_at - recording.started_at).max(0.0),
            sample_count,
        };
        let doc = metadata_document(
            &recording.id,
            recording.label.as_deref(),
            recording.started_at,
            recording.downsample,
            &recording.descriptor,
            Some(&finished),
        );
        fs::write(&recording.meta_path, serde_json::to_string_pretty(&doc)?)?;

        if let Err(err) = archive::bundle(
            &recording.archive_path,
            &recording.meta_path,
            &recording.data_path,
        ) {
            tracing::error!(id = %id, error = %err, "Failed to create recording archive");
        }

        tracing::info!(id = %id, samples = sample_count, "Recording stopped");
        Ok(recording.snapshot())
    }

    /// Snapshots of all sessions, oldest first
    pub async fn list(&self) -> Vec<RecordingSession> {
        let sessions = self.sessions.lock().await;
        let mut all: Vec<RecordingSession> = sessions.values().map(|r| r.snapshot()).collect();
        all.sort_by(|a, b| {
            a.started_at
                .partial_cmp(&b.started_at)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        all
    }

    /// Snapshot of one session
    pub async fn get(&self, id: &str) -> Option<RecordingSession> {
        let sessions = self.sessions.lock().await;
        sessions.get(id).map(|r| r.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::InletConfig;
    use crate::source::mock::{scripted_descriptor, ScriptedSource};
    use crate::source::Sample;

    fn inlet_manager() -> Arc<InletManager> {
        Arc::new(InletManager::with_config(
            InletConfig::default()
                .pull_timeout(Duration::from_millis(5))
                .idle_backoff(Duration::from_millis(1)),
        ))
    }

    fn recorder(inlets: &Arc<InletManager>, root: &std::path::Path) -> RecorderManager {
        RecorderManager::with_config(
            Arc::clone(inlets),
            RecorderConfig::with_root(root).flush_interval(Duration::from_millis(20)),
        )
    }

    fn samples(n: u64) -> Vec<Sample> {
        (1..=n).map(|i| Sample::numeric(i as f64, vec![i as f64])).collect()
    }

    async fn wait_for_count(recorder: &RecorderManager, id: &str, n: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let count = recorder.get(id).await.map(|s| s.sample_count).unwrap_or(0);
            if count >= n {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "recording never reached {} samples (at {})",
                n,
                count
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_record_start_stop_full_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = recorder(&inlets, dir.path());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "Test Stream"));
        let source: Arc<dyn InletSource> =
            Arc::new(ScriptedSource::new(samples(10)).chunk_size(4));

        let session = recorder
            .start(&descriptor, &source, Some("run one"), 1)
            .await
            .unwrap();
        assert!(session.active);
        assert_eq!(session.downsample, 1);
        assert!(session.dir_path.exists());
        assert!(session.meta_path.exists());
        assert_eq!(inlets.inlet_count().await, 1);

        wait_for_count(&recorder, &session.id, 10).await;
        let stopped = recorder.stop(&session.id).await.unwrap();

        assert!(!stopped.active);
        assert_eq!(stopped.sample_count, 10);
        assert_eq!(inlets.inlet_count().await, 0);

        // sampleCount matches the lines actually on disk
        let data = fs::read_to_string(&stopped.data_path).unwrap();
        assert_eq!(data.lines().count(), 10);
        assert_eq!(
            data.lines().next().unwrap(),
            "{\"t\":1.0,\"d\":[1.0]}"
        );

        // Metadata carries the final fields
        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&stopped.meta_path).unwrap()).unwrap();
        assert_eq!(meta["recording"]["sampleCount"], 10);
        assert_eq!(meta["recording"]["label"], "run one");
        assert_eq!(meta["stream"]["uid"], "uid-x");
        assert!(meta["recording"]["durationSeconds"].as_f64().unwrap() >= 0.0);

        // Archive bundles exactly the two fixed members
        let mut zip =
            zip::ZipArchive::new(fs::File::open(&stopped.archive_path).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        assert!(zip.by_name(archive::METADATA_MEMBER).is_ok());
        assert!(zip.by_name(archive::DATA_MEMBER).is_ok());
    }

    #[tokio::test]
    async fn test_downsample_keeps_every_nth_sample() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = recorder(&inlets, dir.path());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "Test"));
        let source: Arc<dyn InletSource> =
            Arc::new(ScriptedSource::new(samples(9)).chunk_size(2));

        let session = recorder.start(&descriptor, &source, None, 3).await.unwrap();
        wait_for_count(&recorder, &session.id, 3).await;
        let stopped = recorder.stop(&session.id).await.unwrap();

        assert_eq!(stopped.sample_count, 3);
        let data = fs::read_to_string(&stopped.data_path).unwrap();
        let kept: Vec<String> = data.lines().map(str::to_string).collect();
        assert_eq!(
            kept,
            vec![
                "{\"t\":3.0,\"d\":[3.0]}",
                "{\"t\":6.0,\"d\":[6.0]}",
                "{\"t\":9.0,\"d\":[9.0]}",
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = recorder(&inlets, dir.path());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "Test"));
        let source: Arc<dyn InletSource> = Arc::new(ScriptedSource::new(samples(4)));

        let session = recorder.start(&descriptor, &source, None, 1).await.unwrap();
        wait_for_count(&recorder, &session.id, 4).await;

        let first = recorder.stop(&session.id).await.unwrap();
        let meta_bytes = fs::read(&first.meta_path).unwrap();
        let archive_bytes = fs::read(&first.archive_path).unwrap();

        let second = recorder.stop(&session.id).await.unwrap();
        assert_eq!(second.stopped_at, first.stopped_at);
        assert_eq!(second.sample_count, first.sample_count);
        assert_eq!(fs::read(&first.meta_path).unwrap(), meta_bytes);
        assert_eq!(fs::read(&first.archive_path).unwrap(), archive_bytes);
    }

    #[tokio::test]
    async fn test_stop_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = recorder(&inlets, dir.path());

        assert!(matches!(
            recorder.stop("nope").await,
            Err(RecordError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_start_failure_leaves_no_session_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = recorder(&inlets, dir.path());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "Test"));
        let source: Arc<dyn InletSource> =
            Arc::new(ScriptedSource::new(Vec::new()).fail_open());

        let result = recorder.start(&descriptor, &source, None, 1).await;
        assert!(matches!(result, Err(RecordError::Inlet(_))));
        assert!(recorder.list().await.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(inlets.inlet_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_recording_still_produces_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = recorder(&inlets, dir.path());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "Test"));
        let source: Arc<dyn InletSource> = Arc::new(ScriptedSource::new(Vec::new()));

        let session = recorder.start(&descriptor, &source, None, 1).await.unwrap();
        // Give the write task a moment to create the data file
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stopped = recorder.stop(&session.id).await.unwrap();

        assert_eq!(stopped.sample_count, 0);
        assert_eq!(fs::read_to_string(&stopped.data_path).unwrap(), "");
        assert!(stopped.archive_path.exists());
    }

    #[tokio::test]
    async fn test_intermediate_flush_before_stop() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = RecorderManager::with_config(
            Arc::clone(&inlets),
            RecorderConfig::with_root(dir.path())
                .flush_max_lines(2)
                .flush_interval(Duration::from_secs(60)),
        );
        let descriptor = Arc::new(scripted_descriptor("uid-x", "Test"));
        let source: Arc<dyn InletSource> =
            Arc::new(ScriptedSource::new(samples(5)).chunk_size(1));

        let session = recorder.start(&descriptor, &source, None, 1).await.unwrap();
        wait_for_count(&recorder, &session.id, 5).await;

        // Two line-count flushes should already be on disk before stop
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let on_disk = fs::read_to_string(&session.data_path)
                .map(|s| s.lines().count())
                .unwrap_or(0);
            if on_disk >= 4 {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no intermediate flush observed"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // The final buffered line arrives with the stop flush
        let stopped = recorder.stop(&session.id).await.unwrap();
        let data = fs::read_to_string(&stopped.data_path).unwrap();
        assert_eq!(data.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_list_reports_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let inlets = inlet_manager();
        let recorder = recorder(&inlets, dir.path());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "Test"));
        let source: Arc<dyn InletSource> = Arc::new(ScriptedSource::new(Vec::new()));

        let a = recorder.start(&descriptor, &source, Some("a"), 1).await.unwrap();
        let b = recorder.start(&descriptor, &source, Some("b"), 1).await.unwrap();

        let listed = recorder.list().await;
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s.active));

        recorder.stop(&a.id).await.unwrap();
        recorder.stop(&b.id).await.unwrap();
        assert!(recorder.list().await.iter().all(|s| !s.active));
        assert!(recorder.get(&a.id).await.is_some());
        assert!(recorder.get("nope").await.is_none());
    }
}
