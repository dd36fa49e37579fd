//! Audio frame types and telephony <-> speech-endpoint transcoding.
//!
//! Two fixed formats travel through the bridge:
//!
//! - **Telephony narrowband**: G.711 u-law, 8 kHz, mono, 8 bits per sample.
//!   This is what the telephony media stream carries in both directions.
//! - **Wideband PCM**: linear PCM 16-bit signed little-endian, 16 kHz, mono.
//!   This is what the speech endpoint consumes and produces.
//!
//! Frames are tagged with their encoding, and the transcoder in
//! [`transcode`] is the only code allowed to change that tag. Writing a
//! frame to a channel whose format does not match fails with
//! [`AudioError::EncodingMismatch`] instead of reinterpreting bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod transcode;

pub use transcode::{to_narrowband, to_wideband};

/// Sample rate of the telephony media stream.
pub const NARROWBAND_SAMPLE_RATE: u32 = 8_000;

/// Sample rate of the speech endpoint's PCM format.
pub const WIDEBAND_SAMPLE_RATE: u32 = 16_000;

/// Errors raised by audio transcoding.
///
/// These fail the single operation only; the owning session keeps running
/// and skips the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// The frame's encoding does not match the requested conversion
    #[error("encoding mismatch: expected {expected}, got {found}")]
    EncodingMismatch {
        /// Encoding the conversion requires
        expected: AudioEncoding,
        /// Encoding the frame actually carries
        found: AudioEncoding,
    },

    /// The payload is malformed or truncated
    #[error("malformed audio payload: {0}")]
    Decode(String),
}

/// Encoding of an audio frame in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEncoding {
    /// G.711 u-law, 8 kHz, mono, 1 byte per sample
    TelephonyNarrowband,
    /// Linear PCM 16-bit signed little-endian, 16 kHz, mono
    Pcm16Wideband,
}

impl AudioEncoding {
    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate_hz(&self) -> u32 {
        match self {
            Self::TelephonyNarrowband => NARROWBAND_SAMPLE_RATE,
            Self::Pcm16Wideband => WIDEBAND_SAMPLE_RATE,
        }
    }

    /// Bytes per sample.
    #[inline]
    pub fn sample_width_bytes(&self) -> usize {
        match self {
            Self::TelephonyNarrowband => 1,
            Self::Pcm16Wideband => 2,
        }
    }

    /// Channel count. Both formats are mono.
    #[inline]
    pub fn channel_count(&self) -> u32 {
        1
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TelephonyNarrowband => write!(f, "telephony_narrowband"),
            Self::Pcm16Wideband => write!(f, "pcm16_wideband"),
        }
    }
}

/// A unit of audio data in flight through the bridge.
///
/// `sequence` is a per-direction monotonic counter. Telephony media frames
/// arrive at a fixed real-time cadence and must not be reordered, so the
/// relay preserves sequence order within each direction.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Raw audio bytes in the tagged encoding
    pub payload: Bytes,
    /// Encoding of `payload`
    pub encoding: AudioEncoding,
    /// Monotonic ordering hint within one direction
    pub sequence: u64,
}

impl AudioFrame {
    /// Create a narrowband (telephony) frame.
    pub fn narrowband(payload: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            payload: payload.into(),
            encoding: AudioEncoding::TelephonyNarrowband,
            sequence,
        }
    }

    /// Create a wideband (speech endpoint) frame.
    pub fn wideband(payload: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            payload: payload.into(),
            encoding: AudioEncoding::Pcm16Wideband,
            sequence,
        }
    }

    /// Number of samples in the frame.
    pub fn sample_count(&self) -> usize {
        self.payload.len() / self.encoding.sample_width_bytes()
    }

    /// Playback duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.sample_count() as u64 * 1_000) / self.encoding.sample_rate_hz() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_properties() {
        assert_eq!(AudioEncoding::TelephonyNarrowband.sample_rate_hz(), 8_000);
        assert_eq!(AudioEncoding::Pcm16Wideband.sample_rate_hz(), 16_000);
        assert_eq!(AudioEncoding::TelephonyNarrowband.sample_width_bytes(), 1);
        assert_eq!(AudioEncoding::Pcm16Wideband.sample_width_bytes(), 2);
        assert_eq!(AudioEncoding::TelephonyNarrowband.channel_count(), 1);
    }

    #[test]
    fn test_frame_duration() {
        // 160 u-law bytes = 160 samples = one 20ms telephony frame
        let frame = AudioFrame::narrowband(vec![0u8; 160], 0);
        assert_eq!(frame.sample_count(), 160);
        assert_eq!(frame.duration_ms(), 20);

        // 640 PCM16 bytes = 320 samples = 20ms at 16kHz
        let frame = AudioFrame::wideband(vec![0u8; 640], 0);
        assert_eq!(frame.sample_count(), 320);
        assert_eq!(frame.duration_ms(), 20);
    }

    #[test]
    fn test_encoding_display() {
        assert_eq!(
            AudioEncoding::TelephonyNarrowband.to_string(),
            "telephony_narrowband"
        );
        assert_eq!(AudioEncoding::Pcm16Wideband.to_string(), "pcm16_wideband");
    }
}
