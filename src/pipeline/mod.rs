//! Acquisition pipeline — binds the ingest loop, the shared buffer and the
//! consumer ticks for one sensor connection.
//!
//! Exactly one producer (the receive task) appends to the buffer through
//! the ingest callback; the trigger/display tick and the spectrum tick are
//! independent consumers working on snapshots. Downstream collaborators
//! plug in through the [`DisplaySink`] and [`RecordingSink`] traits and
//! never touch pipeline state.

use crate::acquisition::{AcquisitionError, SampleCallback, StreamIngestor};
use crate::buffer::SampleBuffer;
use crate::config::defaults::{BUFFER_FILL_VALUE, WATCHDOG_TICK_MS};
use crate::config::AcquisitionConfig;
use crate::processing::{compute_spectrum, find_wave, Spectrum, TriggeredWave, WaveMeasurement};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Collaborator Boundaries
// ============================================================================

/// Display / plot collaborator. Receives core outputs on consumer ticks;
/// must not block — rendering happens on the collaborator's own schedule.
pub trait DisplaySink: Send + Sync + 'static {
    /// A trigger-aligned waveform was extracted this tick.
    fn on_waveform(&self, wave: &TriggeredWave, measurement: Option<WaveMeasurement>);

    /// Trigger disabled: the raw tail of the buffer instead.
    fn on_raw_tail(&self, samples: &[f64]);

    /// A fresh spectrum from the slow tick.
    fn on_spectrum(&self, spectrum: &Spectrum);

    /// The stream died after connect; the pipeline will produce no further
    /// updates until recreated.
    fn on_disconnect(&self, error: &AcquisitionError);
}

/// Recording collaborator. Runs synchronously inside the ingest callback,
/// so it must not block materially; row persistence belongs elsewhere.
pub trait RecordingSink: Send + 'static {
    /// One decoded batch in arrival order. `base_timestamp` is Unix seconds
    /// of the first sample; successive calls advance it by
    /// `len / sample_rate`.
    fn on_samples(&mut self, base_timestamp: f64, samples: &[f64]);
}

// ============================================================================
// Pipeline
// ============================================================================

/// A live acquisition pipeline for one sensor connection.
///
/// Owns the buffer for the connection's lifetime; dropped or
/// [`shutdown`](Pipeline::shutdown) when the connection closes.
pub struct Pipeline {
    buffer: Arc<SampleBuffer>,
    ingestor: StreamIngestor,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Connect to the sensor and start the consumer ticks.
    ///
    /// Fails with the ingestor's error if the connection or the first-data
    /// wait fails; nothing is left running in that case.
    pub async fn start(
        config: AcquisitionConfig,
        display: Arc<dyn DisplaySink>,
        recorder: Option<Box<dyn RecordingSink>>,
    ) -> Result<Self, AcquisitionError> {
        let buffer = Arc::new(SampleBuffer::new(
            config.sampling.buffer_len,
            BUFFER_FILL_VALUE,
        ));

        let callback = ingest_callback(
            Arc::clone(&buffer),
            recorder,
            config.sampling.sample_rate_hz,
        );
        let ingestor =
            StreamIngestor::connect(&config.stream, config.sampling.conversion_constant, callback)
                .await?;

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(display_tick(
            config.clone(),
            Arc::clone(&buffer),
            Arc::clone(&display),
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(spectrum_tick(
            config.clone(),
            Arc::clone(&buffer),
            Arc::clone(&display),
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(stream_watchdog(
            ingestor.health(),
            display,
            cancel.clone(),
        )));

        info!(
            buffer_len = config.sampling.buffer_len,
            display_ms = config.ticks.display_ms,
            spectrum_ms = config.ticks.spectrum_ms,
            "Acquisition pipeline started"
        );

        Ok(Self {
            buffer,
            ingestor,
            cancel,
            tasks,
        })
    }

    /// The shared sample buffer (read-only use: snapshots).
    pub fn buffer(&self) -> Arc<SampleBuffer> {
        Arc::clone(&self.buffer)
    }

    /// True while the ingest loop is alive.
    pub fn is_streaming(&self) -> bool {
        self.ingestor.is_running()
    }

    /// Stop everything: close the connection (joining the receive task, so
    /// no further appends), then cancel and join the consumer ticks.
    pub async fn shutdown(self) {
        self.ingestor.close().await;
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Pipeline task join failed");
            }
        }
        info!("Acquisition pipeline stopped");
    }
}

// ============================================================================
// Ingest Callback
// ============================================================================

/// Build the per-batch callback: buffer append plus optional recording
/// hand-off, both inside the single callback invocation so rows stay in
/// arrival order.
fn ingest_callback(
    buffer: Arc<SampleBuffer>,
    mut recorder: Option<Box<dyn RecordingSink>>,
    sample_rate: f64,
) -> SampleCallback {
    let mut base_timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    Box::new(move |samples: &[f64]| {
        buffer.append(samples);
        if let Some(rec) = recorder.as_mut() {
            rec.on_samples(base_timestamp, samples);
            base_timestamp += samples.len() as f64 / sample_rate;
        }
    })
}

// ============================================================================
// Consumer Ticks
// ============================================================================

/// Fast tick: trigger extraction (or raw tail when the trigger is off).
async fn display_tick(
    config: AcquisitionConfig,
    buffer: Arc<SampleBuffer>,
    display: Arc<dyn DisplaySink>,
    cancel: CancellationToken,
) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_millis(config.ticks.display_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        if !config.trigger.enabled {
            let tail = buffer.tail(config.sampling.max_display_len);
            display.on_raw_tail(&tail);
            continue;
        }

        let snapshot = buffer.snapshot();
        // Untriggerable snapshots mean "no update this tick", not an error.
        if let Some(wave) = find_wave(
            &snapshot,
            config.trigger.n_waves,
            config.trigger.level,
            config.trigger.hysteresis,
        ) {
            let measurement = wave.measure(config.sampling.sample_rate_hz);
            display.on_waveform(&wave, measurement);
        }
    }
}

/// Slow tick: full-snapshot spectrum.
async fn spectrum_tick(
    config: AcquisitionConfig,
    buffer: Arc<SampleBuffer>,
    display: Arc<dyn DisplaySink>,
    cancel: CancellationToken,
) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_millis(config.ticks.spectrum_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let snapshot = buffer.snapshot();
        match compute_spectrum(&snapshot, config.sampling.sample_rate_hz) {
            Ok(spectrum) => display.on_spectrum(&spectrum),
            Err(e) => debug!(error = %e, "Spectrum skipped this tick"),
        }
    }
}

/// Watches the ingest loop and reports a post-connect stream failure once.
/// A clean close records no error and stays silent.
async fn stream_watchdog(
    health: crate::acquisition::IngestHealth,
    display: Arc<dyn DisplaySink>,
    cancel: CancellationToken,
) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_millis(WATCHDOG_TICK_MS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        if !health.is_running() {
            if let Some(error) = health.take_error() {
                warn!(error = %error, "Sensor stream lost");
                display.on_disconnect(&error);
            }
            break;
        }
    }
}
