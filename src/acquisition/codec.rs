//! Wire format decode and frame reassembly.
//!
//! The sensor streams raw little-endian integer codes with no framing
//! markers; logical frames are reassembled purely by byte count. Reassembly
//! is required to be invariant to how the transport chunks the stream —
//! decoding the same bytes delivered in one read or many must yield an
//! identical frame sequence.

use serde::{Deserialize, Serialize};

// ============================================================================
// Sample Format
// ============================================================================

/// Element width and signedness of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// 16-bit signed little-endian (firmware default)
    I16Le,
    /// 16-bit unsigned little-endian
    U16Le,
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self::I16Le
    }
}

impl SampleFormat {
    /// Bytes per wire element.
    pub const fn width(self) -> usize {
        match self {
            Self::I16Le | Self::U16Le => 2,
        }
    }

    /// Decode one element starting at `bytes[0..width]`.
    fn decode_one(self, bytes: &[u8]) -> f64 {
        match self {
            Self::I16Le => f64::from(i16::from_le_bytes([bytes[0], bytes[1]])),
            Self::U16Le => f64::from(u16::from_le_bytes([bytes[0], bytes[1]])),
        }
    }
}

/// Decode a complete logical frame into scaled physical-unit samples.
///
/// `frame.len()` must be a multiple of the element width; trailing partial
/// elements never occur because frame length is validated at config time.
pub fn decode_frame(frame: &[u8], format: SampleFormat, scale: f64) -> Vec<f64> {
    frame
        .chunks_exact(format.width())
        .map(|chunk| format.decode_one(chunk) * scale)
        .collect()
}

// ============================================================================
// Frame Assembler
// ============================================================================

/// Reassembles an arbitrarily-chunked byte stream into fixed-length frames.
///
/// Bytes accumulate until exactly `frame_len` are available; the completed
/// frame is handed out and any excess bytes begin the next frame. There is
/// no synchronization marker — the declared header byte is not validated
/// (see `config::defaults::PACKET_HEADER`).
#[derive(Debug)]
pub struct FrameAssembler {
    frame_len: usize,
    pending: Vec<u8>,
}

impl FrameAssembler {
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len * 2),
        }
    }

    /// Feed received bytes; returns every frame completed by this chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_len {
            let rest = self.pending.split_off(self.frame_len);
            frames.push(std::mem::replace(&mut self.pending, rest));
        }
        frames
    }

    /// Bytes held over for the next frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
