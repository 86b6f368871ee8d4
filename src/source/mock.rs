//! Mock stream sources
//!
//! In-process [`Discovery`]/[`Inlet`] implementations for running the relay
//! without real hardware: deterministic signal generators for demos, and a
//! scripted source with failure injection for tests.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::descriptor::{ChannelFormat, StreamDescriptor};
use super::sample::Sample;
use super::upstream::{epoch_seconds, Discovery, DiscoveredStream, Inlet, InletSource, SourceError};

/// Discovery over a fixed set of mock streams
pub struct MockDiscovery {
    streams: Vec<DiscoveredStream>,
}

impl MockDiscovery {
    /// Discovery returning exactly the given streams
    pub fn new(streams: Vec<DiscoveredStream>) -> Self {
        Self { streams }
    }

    /// The standard demo set: EEG + markers + accelerometer
    pub fn standard() -> Self {
        Self::new(vec![mock_eeg(), mock_markers(), mock_accel()])
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn resolve(&self, _timeout: Duration) -> Result<Vec<DiscoveredStream>, SourceError> {
        Ok(self
            .streams
            .iter()
            .map(|s| DiscoveredStream {
                descriptor: s.descriptor.clone(),
                source: Arc::clone(&s.source),
            })
            .collect())
    }
}

/// Mock 4-channel sine-mixture stream at 256 Hz
pub fn mock_eeg() -> DiscoveredStream {
    let channels = [
        ("Fp1", 50.0, 10.0),
        ("Fp2", 30.0, 12.0),
        ("O1", 40.0, 8.0),
        ("O2", 25.0, 20.0),
    ];
    generator_stream(
        "mock-eeg-001",
        "MockEEG",
        "EEG",
        256.0,
        channels.iter().map(|(n, _, _)| n.to_string()).collect(),
        Signal::Sines(channels.iter().map(|&(_, a, f)| (a, f)).collect()),
    )
}

/// Mock 3-channel accelerometer stream at 50 Hz
pub fn mock_accel() -> DiscoveredStream {
    let channels = [("X", 0.02, 0.5), ("Y", 0.01, 0.3), ("Z", 0.01, 0.7)];
    generator_stream(
        "mock-accel-001",
        "MockAccel",
        "Accelerometer",
        50.0,
        channels.iter().map(|(n, _, _)| n.to_string()).collect(),
        Signal::Sines(channels.iter().map(|&(_, a, f)| (a, f)).collect()),
    )
}

/// Mock event marker stream, one string channel, one marker every 2 s
pub fn mock_markers() -> DiscoveredStream {
    let markers = [
        "trial_start",
        "stimulus_on",
        "response",
        "stimulus_off",
        "trial_end",
    ];
    let descriptor = StreamDescriptor {
        uid: "mock-markers-001".to_string(),
        name: "MockMarkers".to_string(),
        stream_type: "Markers".to_string(),
        channel_count: 1,
        nominal_srate: 0.0,
        channel_format: ChannelFormat::String,
        source_id: "mock-markers-001".to_string(),
        hostname: "localhost".to_string(),
        created_at: epoch_seconds(),
        raw_desc: String::new(),
        channel_names: vec!["marker".to_string()],
    };
    DiscoveredStream {
        descriptor,
        source: Arc::new(GeneratorSource {
            rate: 0.5,
            signal: Signal::Markers(markers.iter().map(|m| m.to_string()).collect()),
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }),
    }
}

fn generator_stream(
    uid: &str,
    name: &str,
    stream_type: &str,
    rate: f64,
    channel_names: Vec<String>,
    signal: Signal,
) -> DiscoveredStream {
    let descriptor = StreamDescriptor {
        uid: uid.to_string(),
        name: name.to_string(),
        stream_type: stream_type.to_string(),
        channel_count: channel_names.len() as u32,
        nominal_srate: rate,
        channel_format: ChannelFormat::Float32,
        source_id: uid.to_string(),
        hostname: "localhost".to_string(),
        created_at: epoch_seconds(),
        raw_desc: String::new(),
        channel_names,
    };
    DiscoveredStream {
        descriptor,
        source: Arc::new(GeneratorSource {
            rate,
            signal,
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }),
    }
}

#[derive(Clone)]
enum Signal {
    /// Per-channel (amplitude, frequency Hz) sine generators
    Sines(Vec<(f64, f64)>),
    /// Cycled string markers
    Markers(Vec<String>),
}

impl Signal {
    fn sample_at(&self, index: u64, t_rel: f64, timestamp: f64) -> Sample {
        match self {
            Signal::Sines(channels) => Sample::numeric(
                timestamp,
                channels
                    .iter()
                    .map(|&(amp, freq)| amp * (TAU * freq * t_rel).sin())
                    .collect(),
            ),
            Signal::Markers(markers) => Sample::text(
                timestamp,
                vec![markers[index as usize % markers.len()].clone()],
            ),
        }
    }
}

/// Clock-paced generator source
struct GeneratorSource {
    rate: f64,
    signal: Signal,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl InletSource for GeneratorSource {
    async fn open(&self) -> Result<Arc<dyn Inlet>, SourceError> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(GeneratorInlet {
            rate: self.rate,
            signal: self.signal.clone(),
            started_at: epoch_seconds(),
            emitted: Mutex::new(0),
            closed: AtomicBool::new(false),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct GeneratorInlet {
    rate: f64,
    signal: Signal,
    started_at: f64,
    emitted: Mutex<u64>,
    closed: AtomicBool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Inlet for GeneratorInlet {
    async fn pull_chunk(
        &self,
        timeout: Duration,
        max_samples: usize,
    ) -> Result<Vec<Sample>, SourceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SourceError::Unavailable("inlet closed".to_string()));
        }

        let due = {
            let emitted = self.emitted.lock().unwrap();
            let elapsed = epoch_seconds() - self.started_at;
            ((elapsed * self.rate) as u64).saturating_sub(*emitted)
        };

        if due == 0 {
            tokio::time::sleep(timeout).await;
            return Ok(Vec::new());
        }

        let n = (due as usize).min(max_samples.max(1));
        let mut emitted = self.emitted.lock().unwrap();
        let dt = 1.0 / self.rate;
        let samples = (0..n)
            .map(|i| {
                let index = *emitted + i as u64;
                let t_rel = index as f64 * dt;
                self.signal.sample_at(index, t_rel, self.started_at + t_rel)
            })
            .collect();
        *emitted += n as u64;
        Ok(samples)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.closes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Scripted source for tests: yields a fixed sample list, then idles
///
/// Failure injection covers the error paths the managers must handle:
/// refusing to open, opening slower than the manager's timeout, and dying
/// mid-pull.
pub struct ScriptedSource {
    samples: Vec<Sample>,
    chunk: usize,
    fail_open: bool,
    open_delay: Option<Duration>,
    fail_pull_when_drained: bool,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Source that will replay `samples` on each opened inlet
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples,
            chunk: 8,
            fail_open: false,
            open_delay: None,
            fail_pull_when_drained: false,
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Largest batch a single pull returns
    pub fn chunk_size(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// Every open attempt fails
    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Delay each open, for exercising the manager's open timeout
    pub fn open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Fail the pull after the script is drained instead of idling
    pub fn fail_pull_when_drained(mut self) -> Self {
        self.fail_pull_when_drained = true;
        self
    }

    /// Number of inlets opened so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// Number of inlets closed so far
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl InletSource for ScriptedSource {
    async fn open(&self) -> Result<Arc<dyn Inlet>, SourceError> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_open {
            return Err(SourceError::Unavailable("scripted open failure".to_string()));
        }
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(ScriptedInlet {
            pending: Mutex::new(self.samples.iter().cloned().collect()),
            chunk: self.chunk,
            fail_when_drained: self.fail_pull_when_drained,
            closed: AtomicBool::new(false),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct ScriptedInlet {
    pending: Mutex<VecDeque<Sample>>,
    chunk: usize,
    fail_when_drained: bool,
    closed: AtomicBool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Inlet for ScriptedInlet {
    async fn pull_chunk(
        &self,
        timeout: Duration,
        max_samples: usize,
    ) -> Result<Vec<Sample>, SourceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SourceError::Unavailable("inlet closed".to_string()));
        }

        let batch: Vec<Sample> = {
            let mut pending = self.pending.lock().unwrap();
            let n = self.chunk.min(max_samples.max(1)).min(pending.len());
            pending.drain(..n).collect()
        };

        if batch.is_empty() {
            if self.fail_when_drained {
                return Err(SourceError::Backend("scripted pull failure".to_string()));
            }
            tokio::time::sleep(timeout).await;
        }
        Ok(batch)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.closes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Minimal descriptor for scripted test streams
pub fn scripted_descriptor(uid: &str, name: &str) -> StreamDescriptor {
    StreamDescriptor {
        uid: uid.to_string(),
        name: name.to_string(),
        stream_type: "Test".to_string(),
        channel_count: 1,
        nominal_srate: 100.0,
        channel_format: ChannelFormat::Float64,
        source_id: uid.to_string(),
        hostname: "localhost".to_string(),
        created_at: epoch_seconds(),
        raw_desc: String::new(),
        channel_names: vec!["ch0".to_string()],
    }
}
