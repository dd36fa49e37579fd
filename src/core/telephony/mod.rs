//! Telephony media-stream channel.
//!
//! The telephony platform opens a WebSocket to the bridge and streams the
//! call's audio as JSON-framed events. This module owns that duplex
//! channel for one call:
//!
//! ## Platform -> Bridge
//!
//! - **connected**: protocol preamble, ignored
//! - **start**: carries the stream id; always precedes any audio
//! - **media**: base64 u-law audio from the caller
//! - **stop**: the platform ended the stream
//!
//! ## Bridge -> Platform
//!
//! - **media**: base64 u-law audio for playback to the caller
//!
//! Events are delivered strictly in arrival order; nothing is reordered or
//! dropped. Once the peer disconnects the channel is dead for good; a torn
//! down telephony leg cannot be resumed.

pub mod channel;
pub mod messages;

pub use channel::{MediaEvents, MediaSink, TelephonyEvent, TwilioMediaChannel, TwilioMediaSink};
pub use messages::{InboundStreamMessage, MediaPayload, OutboundStreamMessage, StreamStartInfo};
