//! Buffered sample log writer
//!
//! One write task per active recording. Samples are serialized into an
//! in-memory line buffer and appended to the data file whenever the buffer
//! hits a line-count threshold or a time interval has passed since the
//! last flush, bounding both memory growth and on-disk staleness.
//!
//! Cancellation contract: unlike the pull task, this task must not die at
//! an arbitrary point. Stop cancels the token and then awaits the task;
//! the task performs exactly one final flush of buffered lines before it
//! exits, so a graceful stop never loses an accepted sample. Only abrupt
//! process death between flushes can lose the buffered tail.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::inlet::Subscription;

/// Everything the write task needs, fixed at recording start
pub(super) struct WriterParams {
    pub rec_id: String,
    pub data_path: PathBuf,
    pub downsample: u64,
    pub flush_max_lines: usize,
    pub flush_interval: Duration,
    pub sample_count: Arc<AtomicU64>,
    pub cancel: CancellationToken,
}

/// Consume a subscription and append kept samples to the data file
pub(super) async fn write_loop(mut subscription: Subscription, params: WriterParams) {
    let mut file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&params.data_path)
    {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(
                id = %params.rec_id,
                error = %err,
                "Failed to open recording data file"
            );
            return;
        }
    };

    let downsample = params.downsample.max(1);
    let mut buf = String::new();
    let mut buffered_lines = 0usize;
    let mut pulled = 0u64;
    let mut last_flush = Instant::now();

    loop {
        let sample = tokio::select! {
            biased;
            _ = params.cancel.cancelled() => None,
            sample = subscription.recv() => sample,
        };

        let Some(sample) = sample else {
            // Cancelled, or the inlet was torn down: one final flush
            if buffered_lines > 0 {
                if let Err(err) = flush(&mut file, &mut buf) {
                    tracing::error!(id = %params.rec_id, error = %err, "Final flush failed");
                }
            }
            tracing::debug!(id = %params.rec_id, "Write task exiting");
            return;
        };

        pulled += 1;
        if pulled % downsample != 0 {
            continue;
        }

        match serde_json::to_string(&sample) {
            Ok(line) => {
                buf.push_str(&line);
                buf.push('\n');
                buffered_lines += 1;
                params.sample_count.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::error!(id = %params.rec_id, error = %err, "Sample serialization failed");
                continue;
            }
        }

        if buffered_lines >= params.flush_max_lines
            || last_flush.elapsed() >= params.flush_interval
        {
            if let Err(err) = flush(&mut file, &mut buf) {
                tracing::error!(
                    id = %params.rec_id,
                    error = %err,
                    "Recording write failed, terminating write task"
                );
                return;
            }
            buffered_lines = 0;
            last_flush = Instant::now();
        }
    }
}

fn flush(file: &mut File, buf: &mut String) -> std::io::Result<()> {
    file.write_all(buf.as_bytes())?;
    file.flush()?;
    buf.clear();
    Ok(())
}
