//! Mock relay demo - streams generated samples to stdout
//!
//! Run with: cargo run --example mock_relay -- [downsample]
//!
//! This demo demonstrates:
//! - Resolving streams from an in-process mock discovery
//! - Running a relay session against a `SampleSink` implementation
//! - Sharing one inlet between two concurrent relay sessions

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use inlet_relay::source::mock::MockDiscovery;
use inlet_relay::{SampleSink, ServiceContext, SinkClosed};

/// Sink that prints each frame with a session tag
struct StdoutSink {
    tag: &'static str,
}

#[async_trait]
impl SampleSink for StdoutSink {
    async fn send_frame(&mut self, frame: String) -> Result<(), SinkClosed> {
        println!("[{}] {}", self.tag, frame);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inlet_relay=info".parse()?),
        )
        .init();

    let downsample: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(32);

    let ctx = Arc::new(ServiceContext::new(Arc::new(MockDiscovery::standard())));

    println!("Mock Relay Demo");
    println!("===============");
    let streams = ctx.resolve_streams(Duration::from_millis(100)).await?;
    for stream in &streams {
        println!(
            "  {} '{}' ({} ch @ {} Hz, {})",
            stream.uid, stream.name, stream.channel_count, stream.nominal_srate,
            stream.channel_format
        );
    }
    println!();
    println!("Relaying MockEEG with downsample={} for 3 seconds...", downsample);
    println!();

    let shutdown = CancellationToken::new();

    // Two concurrent viewers of the same stream share one inlet
    let fast = {
        let ctx = Arc::clone(&ctx);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut sink = StdoutSink { tag: "fast" };
            ctx.relay("mock-eeg-001", downsample, &mut sink, shutdown).await
        })
    };
    let slow = {
        let ctx = Arc::clone(&ctx);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut sink = StdoutSink { tag: "slow" };
            ctx.relay("mock-eeg-001", downsample * 4, &mut sink, shutdown).await
        })
    };

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(3)) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted");
        }
    }
    shutdown.cancel();

    fast.await??;
    slow.await??;

    println!();
    println!("Done. Open inlets remaining: {}", ctx.inlets().inlet_count().await);
    Ok(())
}
