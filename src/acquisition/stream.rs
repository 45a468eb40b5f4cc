//! TCP stream ingestor.
//!
//! Owns the sensor socket and a single background receive task that
//! reassembles raw reads into fixed-length frames, decodes them into scaled
//! samples, and hands each batch to the caller through a callback. The
//! callback is the only producer path into the sample buffer; consumers
//! never touch the socket.

use super::codec::{decode_frame, FrameAssembler, SampleFormat};
use super::AcquisitionError;
use crate::config::defaults::{
    CONNECT_TIMEOUT_SECS, FIRST_DATA_POLL_MS, FIRST_DATA_RETRIES, RECV_CHUNK_LEN,
};
use crate::config::StreamConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-batch sample callback. Invoked on the receive task for every decoded
/// frame, in network arrival order. Must not block materially — the sample
/// buffer append and any recording hand-off happen inside it.
pub type SampleCallback = Box<dyn FnMut(&[f64]) + Send>;

/// State shared between the receive task and the owning handle.
struct IngestState {
    /// Set once the first frame has been decoded and delivered.
    receiving: AtomicBool,
    /// Cleared when the receive loop exits, for any reason.
    running: AtomicBool,
    /// Error captured by the receive loop on read failure.
    error: Mutex<Option<AcquisitionError>>,
}

impl IngestState {
    fn record_error(&self, err: AcquisitionError) {
        let mut slot = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

/// Cheap cloneable view of the receive loop's health, for watchdogs that
/// outlive a borrow of the ingestor.
#[derive(Clone)]
pub struct IngestHealth {
    state: Arc<IngestState>,
}

impl IngestHealth {
    /// True while the receive loop is alive.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Take the error captured by the receive loop, if any.
    pub fn take_error(&self) -> Option<AcquisitionError> {
        self.state
            .error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

/// Handle to a live sensor connection.
///
/// Created by [`connect`](StreamIngestor::connect); dropped or explicitly
/// [`close`](StreamIngestor::close)d to tear the connection down. After
/// `close` returns, no further callback invocation occurs.
pub struct StreamIngestor {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    state: Arc<IngestState>,
}

impl StreamIngestor {
    /// Connect to the sensor and start the background receive loop.
    ///
    /// Sends the configured start message (if any), then blocks until the
    /// first frame has been decoded or the bounded retry window
    /// ([`FIRST_DATA_RETRIES`] polls at [`FIRST_DATA_POLL_MS`]) elapses.
    /// If the receive loop dies before first data, its captured error is
    /// returned instead of the timeout. On any failure the worker is
    /// cancelled and joined before this function returns.
    pub async fn connect(
        config: &StreamConfig,
        conversion_constant: f64,
        on_samples: SampleCallback,
    ) -> Result<Self, AcquisitionError> {
        let addr = format!("{}:{}", config.address, config.port);
        info!(address = %addr, "Connecting to sensor");

        let connect_timeout = tokio::time::Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| AcquisitionError::ConnectionFailed(format!("{addr}: connect timeout")))?
            .map_err(|e| AcquisitionError::ConnectionFailed(format!("{addr}: {e}")))?;

        // Enable TCP keepalive to detect dead connections
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(30))
            .with_interval(std::time::Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        if let Some(msg) = &config.start_message {
            stream
                .write_all(msg.as_bytes())
                .await
                .map_err(|e| AcquisitionError::ConnectionFailed(format!("start message: {e}")))?;
            debug!(message = %msg, "Start message sent");
        }

        let state = Arc::new(IngestState {
            receiving: AtomicBool::new(false),
            running: AtomicBool::new(true),
            error: Mutex::new(None),
        });
        let cancel = CancellationToken::new();

        let task = tokio::spawn(receive_loop(
            stream,
            config.max_packet_len,
            config.sample_format,
            conversion_constant,
            on_samples,
            Arc::clone(&state),
            cancel.clone(),
        ));

        let mut ingestor = Self {
            cancel,
            task: Some(task),
            state,
        };

        // Block until the loop has decoded its first frame, bounded.
        for _ in 0..FIRST_DATA_RETRIES {
            tokio::time::sleep(tokio::time::Duration::from_millis(FIRST_DATA_POLL_MS)).await;

            if ingestor.state.receiving.load(Ordering::Acquire) {
                info!("Sensor stream established");
                return Ok(ingestor);
            }
            if !ingestor.state.running.load(Ordering::Acquire) {
                let err = ingestor
                    .take_error()
                    .unwrap_or(AcquisitionError::ConnectionClosed);
                ingestor.stop().await;
                return Err(err);
            }
        }

        ingestor.stop().await;
        Err(AcquisitionError::ReceiveTimeout)
    }

    /// True while the receive loop is alive.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Take the error captured by the receive loop, if any.
    pub fn take_error(&self) -> Option<AcquisitionError> {
        self.state
            .error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Health view that can be handed to a watchdog task.
    pub fn health(&self) -> IngestHealth {
        IngestHealth {
            state: Arc::clone(&self.state),
        }
    }

    /// Stop the receive loop and wait for it to exit.
    ///
    /// Cancelling drops the pending read and closes the socket; the join
    /// guarantees no callback fires after this returns. Safe to call at any
    /// time, including when the loop already terminated on its own.
    pub async fn close(mut self) {
        self.stop().await;
        info!("Sensor connection closed");
    }

    async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Receive task join failed");
            }
        }
    }
}

impl Drop for StreamIngestor {
    fn drop(&mut self) {
        // Best effort: callers should use close() for join semantics.
        self.cancel.cancel();
    }
}

/// The background receive loop: read → reassemble → decode → callback.
///
/// Reads a fixed [`RECV_CHUNK_LEN`] regardless of the frame length; the
/// assembler makes the output invariant to chunking.
async fn receive_loop(
    mut stream: TcpStream,
    max_packet_len: usize,
    format: SampleFormat,
    conversion_constant: f64,
    mut on_samples: SampleCallback,
    state: Arc<IngestState>,
    cancel: CancellationToken,
) {
    let mut assembler = FrameAssembler::new(max_packet_len);
    let mut chunk = vec![0u8; RECV_CHUNK_LEN];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Receive loop cancelled");
                break;
            }
            read = stream.read(&mut chunk) => match read {
                Ok(0) => {
                    warn!("Sensor closed the connection");
                    state.record_error(AcquisitionError::ConnectionClosed);
                    break;
                }
                Ok(n) => {
                    for frame in assembler.push(&chunk[..n]) {
                        let samples = decode_frame(&frame, format, conversion_constant);
                        on_samples(&samples);
                        state.receiving.store(true, Ordering::Release);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Sensor read failed — stopping receive loop");
                    state.record_error(AcquisitionError::StreamFailure(e.to_string()));
                    break;
                }
            }
        }
    }

    state.running.store(false, Ordering::Release);
}
