//! Relay configuration

use std::path::PathBuf;
use std::time::Duration;

/// Inlet manager configuration options
#[derive(Debug, Clone)]
pub struct InletConfig {
    /// Upstream open must complete within this time
    pub open_timeout: Duration,

    /// Budget for a single upstream pull
    pub pull_timeout: Duration,

    /// Maximum samples requested per pull
    pub max_chunk: usize,

    /// Pause between pulls when the upstream is idle
    pub idle_backoff: Duration,

    /// Queue capacity handed to live relay subscribers
    pub live_queue_capacity: usize,
}

impl Default for InletConfig {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(5),
            pull_timeout: Duration::from_millis(50),
            max_chunk: 32,
            idle_backoff: Duration::from_millis(5),
            live_queue_capacity: 512,
        }
    }
}

impl InletConfig {
    /// Set the upstream open timeout
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Set the per-pull budget
    pub fn pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Set the maximum samples per pull
    pub fn max_chunk(mut self, max: usize) -> Self {
        self.max_chunk = max.max(1);
        self
    }

    /// Set the idle backoff between empty pulls
    pub fn idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Set the live subscriber queue capacity
    pub fn live_queue_capacity(mut self, capacity: usize) -> Self {
        self.live_queue_capacity = capacity.max(1);
        self
    }
}

/// Recorder configuration options
///
/// Recording subscribers get a much larger queue than live viewers: the
/// archival path favors completeness, the live path favors recency.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory recordings are created under
    pub root_dir: PathBuf,

    /// Queue capacity for recording subscriptions
    pub queue_capacity: usize,

    /// Flush the line buffer after this many buffered lines
    pub flush_max_lines: usize,

    /// Flush the line buffer at least this often while samples arrive
    pub flush_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("recordings"),
            queue_capacity: 8192,
            flush_max_lines: 2048,
            flush_interval: Duration::from_millis(500),
        }
    }
}

impl RecorderConfig {
    /// Create a config rooted at the given directory
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Set the recordings root directory
    pub fn root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Set the recording queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the line-count flush threshold
    pub fn flush_max_lines(mut self, lines: usize) -> Self {
        self.flush_max_lines = lines.max(1);
        self
    }

    /// Set the time-based flush threshold
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}
