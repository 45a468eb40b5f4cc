//! Integration tests for the TCP stream ingestor against a local server.

use presscope::acquisition::{AcquisitionError, SampleFormat, StreamIngestor};
use presscope::config::StreamConfig;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Stream config pointing at a local test server.
fn test_config(port: u16, max_packet_len: usize) -> StreamConfig {
    StreamConfig {
        address: "127.0.0.1".to_string(),
        port,
        max_packet_len,
        sample_format: SampleFormat::I16Le,
        start_message: Some("connection_request".to_string()),
    }
}

/// Collects decoded batches from the ingest callback.
#[derive(Clone, Default)]
struct Collected {
    samples: Arc<Mutex<Vec<f64>>>,
    batches: Arc<Mutex<usize>>,
}

impl Collected {
    fn callback(&self) -> presscope::acquisition::SampleCallback {
        let samples = Arc::clone(&self.samples);
        let batches = Arc::clone(&self.batches);
        Box::new(move |batch: &[f64]| {
            samples.lock().unwrap().extend_from_slice(batch);
            *batches.lock().unwrap() += 1;
        })
    }

    fn samples(&self) -> Vec<f64> {
        self.samples.lock().unwrap().clone()
    }
}

/// Little-endian i16 wire bytes for a code sequence.
fn wire_bytes(codes: &[i16]) -> Vec<u8> {
    codes.iter().flat_map(|c| c.to_le_bytes()).collect()
}

/// Serve one client: read the start message, then write `payload` split at
/// the given chunk sizes (cycled), then hold the socket open.
async fn serve_once(listener: TcpListener, payload: Vec<u8>, chunk_sizes: Vec<usize>) {
    let (mut stream, _) = listener.accept().await.unwrap();

    let mut start = [0u8; 64];
    let n = stream.read(&mut start).await.unwrap();
    assert_eq!(&start[..n], b"connection_request");

    let mut offset = 0;
    let mut sizes = chunk_sizes.iter().cycle();
    while offset < payload.len() {
        let take = (*sizes.next().unwrap()).min(payload.len() - offset);
        stream.write_all(&payload[offset..offset + take]).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
        offset += take;
    }

    // Keep the connection open until the client goes away.
    let mut sink = [0u8; 16];
    let _ = stream.read(&mut sink).await;
}

async fn local_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

// ============================================================================
// Reassembly
// ============================================================================

/// The decoded sample sequence is identical however the transport chunks
/// the byte stream.
#[tokio::test]
async fn decoded_frames_are_chunk_invariant() {
    let codes: Vec<i16> = (0..640).map(|i| (i * 7 % 2000) as i16 - 1000).collect();
    let payload = wire_bytes(&codes);
    // 64-byte frames over 1280 bytes → 20 complete frames.
    let frame_len = 64;
    let expected: Vec<f64> = codes.iter().map(|&c| f64::from(c) * 0.5).collect();

    for chunk_sizes in [vec![1], vec![3, 5, 7], vec![512], vec![63, 64, 65]] {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(serve_once(listener, payload.clone(), chunk_sizes.clone()));

        let collected = Collected::default();
        let ingestor = StreamIngestor::connect(
            &test_config(port, frame_len),
            0.5,
            collected.callback(),
        )
        .await
        .unwrap();

        // Wait for the full payload to come through. The 1-byte chunking
        // case takes a while: 1280 writes with a 1ms sleep each, inflated
        // by timer granularity, so the budget here is generous.
        for _ in 0..500 {
            if collected.samples().len() >= expected.len() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        ingestor.close().await;
        server.abort();

        assert_eq!(
            collected.samples(),
            expected,
            "chunking {chunk_sizes:?} changed the decoded stream"
        );
    }
}

/// Leftover bytes beyond a frame boundary start the next frame rather than
/// being dropped.
#[tokio::test]
async fn partial_trailing_frame_is_not_delivered() {
    let codes: Vec<i16> = (0..48).collect();
    let payload = wire_bytes(&codes); // 96 bytes
    let frame_len = 64; // one full frame + 32 leftover bytes

    let (listener, port) = local_listener().await;
    let server = tokio::spawn(serve_once(listener, payload, vec![96]));

    let collected = Collected::default();
    let ingestor = StreamIngestor::connect(&test_config(port, frame_len), 1.0, collected.callback())
        .await
        .unwrap();
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    ingestor.close().await;
    server.abort();

    let expected: Vec<f64> = (0..32).map(f64::from).collect();
    assert_eq!(collected.samples(), expected);
}

// ============================================================================
// Lifecycle
// ============================================================================

/// After close() returns, the callback never fires again even though the
/// server keeps streaming.
#[tokio::test]
async fn close_stops_callbacks() {
    let (listener, port) = local_listener().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut start = [0u8; 64];
        let _ = stream.read(&mut start).await.unwrap();
        // Stream forever.
        let frame = wire_bytes(&vec![42i16; 32]);
        loop {
            if stream.write_all(&frame).await.is_err() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
        }
    });

    let collected = Collected::default();
    let ingestor = StreamIngestor::connect(&test_config(port, 64), 1.0, collected.callback())
        .await
        .unwrap();
    assert!(ingestor.is_running());

    ingestor.close().await;
    let count_at_close = collected.samples().len();
    assert!(count_at_close > 0);

    tokio::time::sleep(tokio::time::Duration::from_millis(150)).await;
    assert_eq!(
        collected.samples().len(),
        count_at_close,
        "callback fired after close() returned"
    );
    server.abort();
}

/// Nothing listening: connect fails synchronously with ConnectionFailed.
#[tokio::test]
async fn connect_to_closed_port_fails() {
    let (listener, port) = local_listener().await;
    drop(listener);

    let result = StreamIngestor::connect(
        &test_config(port, 64),
        1.0,
        Box::new(|_samples: &[f64]| {}),
    )
    .await;
    assert!(matches!(result, Err(AcquisitionError::ConnectionFailed(_))));
}

/// A server that accepts but never sends data trips the bounded
/// first-data wait, not an indefinite hang.
#[tokio::test]
async fn silent_server_times_out() {
    let (listener, port) = local_listener().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut sink = [0u8; 64];
        let _ = stream.read(&mut sink).await;
        // Hold the socket open, send nothing.
        tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
    });

    let started = std::time::Instant::now();
    let result = StreamIngestor::connect(
        &test_config(port, 64),
        1.0,
        Box::new(|_samples: &[f64]| {}),
    )
    .await;

    assert!(matches!(result, Err(AcquisitionError::ReceiveTimeout)));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    server.abort();
}

/// The server hanging up mid-stream is captured as a stream error and the
/// loop stops; the error is observable from the handle.
#[tokio::test]
async fn server_hangup_is_captured() {
    let (listener, port) = local_listener().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut start = [0u8; 64];
        let _ = stream.read(&mut start).await.unwrap();
        let frame = wire_bytes(&vec![7i16; 32]);
        stream.write_all(&frame).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
        // Drop closes the socket.
    });

    let collected = Collected::default();
    let ingestor = StreamIngestor::connect(&test_config(port, 64), 1.0, collected.callback())
        .await
        .unwrap();

    for _ in 0..100 {
        if !ingestor.is_running() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }

    assert!(!ingestor.is_running());
    assert!(matches!(
        ingestor.take_error(),
        Some(AcquisitionError::ConnectionClosed)
    ));
    // Still safe to close after the loop died on its own.
    ingestor.close().await;
    server.abort();
}
