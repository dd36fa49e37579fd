//! Central error taxonomy for the bridge.
//!
//! Errors fall into two classes: per-operation failures that are contained
//! (a single frame that cannot be transcoded, one malformed upstream
//! message) and channel-level failures that terminate the owning session
//! (peer disconnect, speech endpoint unreachable). Nothing here is retried;
//! a failed call ends and the caller must originate a new one.

use thiserror::Error;

use crate::core::audio::AudioError;

/// Errors that can occur while bridging a call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Audio transcoding failed for one frame (contained, not session-fatal)
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// The telephony media stream is gone; the call cannot be resumed
    #[error("media channel closed")]
    ChannelClosed,

    /// The speech endpoint could not be reached or dropped the connection
    #[error("speech endpoint unavailable: {0}")]
    UpstreamUnavailable(String),

    /// One malformed message from the speech endpoint (logged and skipped)
    #[error("malformed upstream message: {0}")]
    UpstreamMessage(String),

    /// The peer violated the media-stream handshake protocol
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
