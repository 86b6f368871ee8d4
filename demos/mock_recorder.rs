//! Mock recorder demo - records a generated stream to disk
//!
//! Run with: cargo run --example mock_recorder -- [output_dir]
//!
//! This demo demonstrates:
//! - Starting a recording session against a resolved stream
//! - The artifacts a session leaves behind: NDJSON sample log, metadata
//!   document, and the zip archive produced on stop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use inlet_relay::source::mock::MockDiscovery;
use inlet_relay::{InletConfig, RecorderConfig, ServiceContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inlet_relay=info".parse()?),
        )
        .init();

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("recordings"));

    let ctx = ServiceContext::with_config(
        Arc::new(MockDiscovery::standard()),
        InletConfig::default(),
        RecorderConfig::with_root(&output_dir),
    );

    println!("Mock Recorder Demo");
    println!("==================");
    println!("Output dir: {}", output_dir.display());
    println!();

    ctx.resolve_streams(Duration::from_millis(100)).await?;

    let session = ctx
        .start_recording("mock-eeg-001", Some("demo run"), 1)
        .await?;
    println!("Recording {} started, capturing for 2 seconds...", session.id);

    tokio::time::sleep(Duration::from_secs(2)).await;

    let stopped = ctx.stop_recording(&session.id).await?;
    println!();
    println!("Session: {}", serde_json::to_string_pretty(&stopped)?);

    if let Some((archive, name)) = ctx.recording_archive(&stopped.id).await {
        println!();
        println!("Archive ready: {} (serve as '{}')", archive.display(), name);
    }

    Ok(())
}
