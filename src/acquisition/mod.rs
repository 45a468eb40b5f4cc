//! Sensor stream acquisition — TCP transport, frame reassembly, decode.

mod codec;
mod stream;

pub use codec::{decode_frame, FrameAssembler, SampleFormat};
pub use stream::{IngestHealth, SampleCallback, StreamIngestor};

use thiserror::Error;

/// Acquisition errors.
///
/// Connection and timeout failures surface synchronously from
/// [`StreamIngestor::connect`]; stream failures after a connection was
/// established are captured by the receive loop and exposed through
/// [`StreamIngestor::take_error`].
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timed out waiting for first data from the sensor")]
    ReceiveTimeout,

    #[error("Stream read failed: {0}")]
    StreamFailure(String),

    #[error("Connection closed by the sensor")]
    ConnectionClosed,
}
