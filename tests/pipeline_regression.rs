//! End-to-end pipeline regression: synthetic sine over TCP through trigger
//! and spectrum ticks to the collaborator sinks.

use presscope::acquisition::AcquisitionError;
use presscope::config::{
    AcquisitionConfig, SamplingConfig, StreamConfig, TickConfig, TriggerConfig,
};
use presscope::pipeline::{DisplaySink, Pipeline, RecordingSink};
use presscope::processing::{Spectrum, TriggeredWave, WaveMeasurement};
use presscope::SampleFormat;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Tone parameters shared by the test server and assertions.
const TONE_HZ: f64 = 100.0;
const SAMPLE_RATE: f64 = 10_000.0;
const CODE_AMPLITUDE: f64 = 2000.0;
const CONVERSION: f64 = 0.001;

/// Serve an endless i16 sine stream to one client after its start message.
async fn sine_server(listener: TcpListener) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut start = [0u8; 64];
    let n = stream.read(&mut start).await.unwrap();
    assert_eq!(&start[..n], b"connection_request");

    let mut t: u64 = 0;
    loop {
        let mut wire = Vec::with_capacity(512);
        for _ in 0..256 {
            let code =
                (CODE_AMPLITUDE * (2.0 * PI * TONE_HZ * t as f64 / SAMPLE_RATE).sin()) as i16;
            wire.extend_from_slice(&code.to_le_bytes());
            t += 1;
        }
        if stream.write_all(&wire).await.is_err() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
    }
}

fn test_pipeline_config(port: u16) -> AcquisitionConfig {
    AcquisitionConfig {
        stream: StreamConfig {
            address: "127.0.0.1".to_string(),
            port,
            max_packet_len: 128,
            sample_format: SampleFormat::I16Le,
            start_message: Some("connection_request".to_string()),
        },
        sampling: SamplingConfig {
            sample_rate_hz: SAMPLE_RATE,
            conversion_constant: CONVERSION,
            buffer_len: 4096,
            max_display_len: 1024,
        },
        trigger: TriggerConfig {
            enabled: true,
            level: 0.0,
            hysteresis: 0.1,
            n_waves: 2,
        },
        ticks: TickConfig {
            display_ms: 10,
            spectrum_ms: 50,
        },
    }
}

// ============================================================================
// Sinks
// ============================================================================

#[derive(Default)]
struct SinkLog {
    measurements: Mutex<Vec<WaveMeasurement>>,
    spectra: Mutex<Vec<Spectrum>>,
    raw_tails: Mutex<usize>,
    disconnects: Mutex<Vec<String>>,
}

impl DisplaySink for SinkLog {
    fn on_waveform(&self, wave: &TriggeredWave, measurement: Option<WaveMeasurement>) {
        assert!(!wave.samples.is_empty());
        assert!(wave.center_offset < wave.samples.len());
        if let Some(m) = measurement {
            self.measurements.lock().unwrap().push(m);
        }
    }

    fn on_raw_tail(&self, _samples: &[f64]) {
        *self.raw_tails.lock().unwrap() += 1;
    }

    fn on_spectrum(&self, spectrum: &Spectrum) {
        self.spectra.lock().unwrap().push(spectrum.clone());
    }

    fn on_disconnect(&self, error: &AcquisitionError) {
        self.disconnects.lock().unwrap().push(error.to_string());
    }
}

struct BatchRecorder {
    rows: Arc<Mutex<Vec<(f64, usize)>>>,
}

impl RecordingSink for BatchRecorder {
    fn on_samples(&mut self, base_timestamp: f64, samples: &[f64]) {
        self.rows.lock().unwrap().push((base_timestamp, samples.len()));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn pipeline_measures_tone_and_spectrum() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(sine_server(listener));

    let sink = Arc::new(SinkLog::default());
    let rows = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::start(
        test_pipeline_config(port),
        Arc::clone(&sink) as Arc<dyn DisplaySink>,
        Some(Box::new(BatchRecorder {
            rows: Arc::clone(&rows),
        })),
    )
    .await
    .unwrap();

    assert!(pipeline.is_streaming());

    // Let the buffer fill past warm-up and both ticks fire several times.
    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;
    pipeline.shutdown().await;
    server.abort();

    // Trigger tick measured the tone.
    let measurements = sink.measurements.lock().unwrap();
    assert!(!measurements.is_empty(), "no triggered waveform seen");
    let last = measurements.last().unwrap();
    assert!(
        (last.frequency_hz - TONE_HZ).abs() < 10.0,
        "measured {} Hz, expected ~{TONE_HZ}",
        last.frequency_hz
    );
    let expected_pp = 2.0 * CODE_AMPLITUDE * CONVERSION;
    assert!(
        (last.peak_to_peak - expected_pp).abs() / expected_pp < 0.1,
        "peak-to-peak {} far from {expected_pp}",
        last.peak_to_peak
    );

    // Spectrum tick found the tone once the window was mostly sine.
    let spectra = sink.spectra.lock().unwrap();
    assert!(!spectra.is_empty(), "no spectrum seen");
    let (peak_hz, _) = spectra.last().unwrap().peak().unwrap();
    let bin_width = SAMPLE_RATE / 4096.0;
    assert!(
        (peak_hz - TONE_HZ).abs() <= 2.0 * bin_width,
        "spectrum peak {peak_hz} Hz, expected ~{TONE_HZ}"
    );

    // Recording saw every batch with a monotonically advancing time base.
    let rows = rows.lock().unwrap();
    assert!(!rows.is_empty(), "recorder got no batches");
    assert!(rows.iter().all(|&(_, len)| len == 64)); // 128-byte frames
    // Tolerance covers f64 rounding on a Unix-seconds base.
    assert!(rows.windows(2).all(|w| {
        let dt = w[1].0 - w[0].0;
        (dt - 64.0 / SAMPLE_RATE).abs() < 1e-4
    }));

    // Clean shutdown reports no disconnect.
    assert!(sink.disconnects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pipeline_without_trigger_forwards_raw_tail() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(sine_server(listener));

    let mut config = test_pipeline_config(port);
    config.trigger.enabled = false;

    let sink = Arc::new(SinkLog::default());
    let pipeline = Pipeline::start(config, Arc::clone(&sink) as Arc<dyn DisplaySink>, None)
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
    pipeline.shutdown().await;
    server.abort();

    assert!(*sink.raw_tails.lock().unwrap() > 0);
    assert!(sink.measurements.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pipeline_reports_disconnect_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut start = [0u8; 64];
        let _ = stream.read(&mut start).await.unwrap();
        // Two frames, then hang up.
        let frame = vec![0u8; 256];
        stream.write_all(&frame).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    });

    let sink = Arc::new(SinkLog::default());
    let pipeline = Pipeline::start(
        test_pipeline_config(port),
        Arc::clone(&sink) as Arc<dyn DisplaySink>,
        None,
    )
    .await
    .unwrap();

    // Wait for the watchdog to notice the hangup.
    for _ in 0..100 {
        if !pipeline.is_streaming() && !sink.disconnects.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }

    assert_eq!(sink.disconnects.lock().unwrap().len(), 1);
    pipeline.shutdown().await;
    server.abort();
}
