//! Synthetic pressure sensor.
//!
//! Stands in for the ESP32 firmware during development: listens on TCP,
//! waits for the client's start message, then streams raw little-endian
//! int16 codes of a noisy sine wave. Chunk sizes are deliberately
//! irregular so the client's reassembly is exercised the way a real
//! network would.
//!
//! # Usage
//! ```bash
//! simulate-sensor --port 3333 --frequency 500 --amplitude 0.4 --offset 1.6
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;
use rand_distr::Normal;
use std::f64::consts::PI;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Inverse of the client's code→pressure conversion.
const CODES_PER_UNIT: f64 = 32767.0 / 4096.0 * 1000.0 / 1.25;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug, Clone)]
#[command(name = "simulate-sensor")]
#[command(about = "Synthetic pressure sensor for presscope testing")]
#[command(version)]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "3333")]
    port: u16,

    /// Tone frequency (Hz)
    #[arg(short, long, default_value = "500.0")]
    frequency: f64,

    /// Tone amplitude in pressure units
    #[arg(short, long, default_value = "0.4")]
    amplitude: f64,

    /// DC offset in pressure units (stock transducer idles near 1.6)
    #[arg(short, long, default_value = "1.6")]
    offset: f64,

    /// Gaussian noise sigma in pressure units
    #[arg(short, long, default_value = "0.01")]
    noise: f64,

    /// Sample rate of the synthetic ADC (Hz)
    #[arg(short, long, default_value = "100000.0")]
    sample_rate: f64,

    /// Don't wait for a start message before streaming
    #[arg(long)]
    no_handshake: bool,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;
    info!(port = args.port, frequency = args.frequency, "Simulated sensor listening");

    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        info!(peer = %peer, "Client connected");
        let args = args.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_client(stream, args).await {
                warn!(error = %e, "Client session ended");
            }
        });
    }
}

/// Stream int16 sine codes to one client until the socket breaks.
async fn serve_client(mut stream: TcpStream, args: Args) -> Result<()> {
    if !args.no_handshake {
        // The firmware starts streaming on any client message.
        stream.readable().await?;
        let mut request = [0u8; 128];
        let n = match stream.try_read(&mut request) {
            Ok(0) => anyhow::bail!("client hung up before start message"),
            Ok(n) => n,
            Err(e) => return Err(e.into()),
        };
        info!(
            message = %String::from_utf8_lossy(&request[..n]),
            "Start message received — streaming"
        );
    }

    let noise = Normal::new(0.0, args.noise.max(f64::MIN_POSITIVE))
        .context("invalid noise sigma")?;
    let mut rng = StdRng::from_entropy();
    let mut t: u64 = 0;

    // Pace output in bursts of ~10 ms worth of samples.
    let burst = (args.sample_rate / 100.0) as usize;
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(10));

    loop {
        ticker.tick().await;

        let mut wire = Vec::with_capacity(burst * 2);
        for _ in 0..burst {
            let phase = 2.0 * PI * args.frequency * t as f64 / args.sample_rate;
            let value = args.offset + args.amplitude * phase.sin() + noise.sample(&mut rng);
            let code = (value * CODES_PER_UNIT)
                .round()
                .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
            wire.extend_from_slice(&code.to_le_bytes());
            t = t.wrapping_add(1);
        }

        // Irregular chunking: split the burst at random points.
        let mut offset = 0;
        while offset < wire.len() {
            let take = rng.gen_range(1..=512.min(wire.len() - offset));
            stream.write_all(&wire[offset..offset + take]).await?;
            offset += take;
        }
    }
}
