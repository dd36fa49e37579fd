//! Duplex media channel over the telephony platform's WebSocket.
//!
//! The channel owns the socket for one call. Inbound frames are parsed into
//! [`TelephonyEvent`]s in strict arrival order; outbound audio goes through
//! an mpsc queue drained by a writer task, so the relay's two directions
//! never contend for the socket.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use base64::prelude::*;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::messages::{InboundStreamMessage, OutboundMediaPayload, OutboundStreamMessage};
use crate::core::audio::{AudioEncoding, AudioError, AudioFrame};
use crate::errors::{BridgeError, BridgeResult};

/// Outbound queue depth. Audio is paced to real-time playback, so this only
/// needs to absorb short bursts from the speech endpoint.
const OUTBOUND_CHANNEL_CAPACITY: usize = 1024;

/// Event received from the telephony side of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum TelephonyEvent {
    /// Media stream opened; always precedes any audio
    StreamStart {
        /// Platform-assigned stream identifier
        stream_id: String,
    },
    /// One narrowband audio frame from the caller
    Audio(AudioFrame),
    /// The platform ended the stream
    StreamStop,
    /// Peer disconnected; the channel is dead and cannot be resumed
    Closed,
}

/// Receiving half of a telephony media channel.
#[async_trait]
pub trait MediaEvents: Send {
    /// Wait for the next inbound event, in arrival order.
    async fn next_event(&mut self) -> TelephonyEvent;
}

/// Sending half of a telephony media channel.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Queue one narrowband frame for playback to the caller.
    async fn send_audio(&self, frame: AudioFrame) -> BridgeResult<()>;
}

/// Media channel over the telephony platform's WebSocket.
pub struct TwilioMediaChannel {
    inbound: SplitStream<WebSocket>,
    outbound: mpsc::Sender<Message>,
    writer: JoinHandle<()>,
    sequence: u64,
}

impl TwilioMediaChannel {
    /// Wrap an upgraded WebSocket. Spawns the writer task that drains
    /// outbound messages; it exits once every sink handle is dropped.
    pub fn new(socket: WebSocket) -> Self {
        let (sink, inbound) = socket.split();
        let (tx, rx) = mpsc::channel::<Message>(OUTBOUND_CHANNEL_CAPACITY);
        let writer = tokio::spawn(drain_outbound(sink, rx));

        Self {
            inbound,
            outbound: tx,
            writer,
            sequence: 0,
        }
    }

    /// Wait for the next inbound event. Used directly during the handshake,
    /// before the channel is split.
    pub async fn next_event(&mut self) -> TelephonyEvent {
        next_inbound(&mut self.inbound, &mut self.sequence).await
    }

    /// Split into the event half and a cloneable sink handle bound to the
    /// stream identifier learned during the handshake.
    pub fn split(self, stream_sid: String) -> (TwilioMediaEvents, TwilioMediaSink) {
        (
            TwilioMediaEvents {
                inbound: self.inbound,
                sequence: self.sequence,
                _writer: self.writer,
            },
            TwilioMediaSink {
                outbound: self.outbound,
                stream_sid,
            },
        )
    }
}

/// Receiving half of a [`TwilioMediaChannel`].
pub struct TwilioMediaEvents {
    inbound: SplitStream<WebSocket>,
    sequence: u64,
    _writer: JoinHandle<()>,
}

#[async_trait]
impl MediaEvents for TwilioMediaEvents {
    async fn next_event(&mut self) -> TelephonyEvent {
        next_inbound(&mut self.inbound, &mut self.sequence).await
    }
}

/// Cloneable sending half of a [`TwilioMediaChannel`].
#[derive(Clone)]
pub struct TwilioMediaSink {
    outbound: mpsc::Sender<Message>,
    stream_sid: String,
}

#[async_trait]
impl MediaSink for TwilioMediaSink {
    async fn send_audio(&self, frame: AudioFrame) -> BridgeResult<()> {
        if frame.encoding != AudioEncoding::TelephonyNarrowband {
            return Err(AudioError::EncodingMismatch {
                expected: AudioEncoding::TelephonyNarrowband,
                found: frame.encoding,
            }
            .into());
        }

        let msg = OutboundStreamMessage::Media {
            stream_sid: self.stream_sid.clone(),
            media: OutboundMediaPayload {
                payload: BASE64_STANDARD.encode(&frame.payload),
            },
        };
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize outbound media message: {e}");
                return Ok(());
            }
        };

        // Queue backpressure paces us to the peer's consumption rate; a
        // closed queue means the socket writer is gone.
        self.outbound
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }
}

/// Writer task: drains queued messages into the socket until the queue
/// closes or the peer rejects a write.
async fn drain_outbound(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            debug!("media stream send failed: {e}");
            break;
        }
    }
}

/// Parse inbound socket messages into events, in order. Unknown or
/// unparseable messages are logged and skipped; they never desynchronize
/// the stream.
async fn next_inbound(stream: &mut SplitStream<WebSocket>, sequence: &mut u64) -> TelephonyEvent {
    loop {
        let msg = match stream.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!("media stream error: {e}");
                return TelephonyEvent::Closed;
            }
            None => return TelephonyEvent::Closed,
        };

        match msg {
            Message::Text(text) => {
                let parsed: InboundStreamMessage = match serde_json::from_str(&text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!("unparseable media-stream message: {e}");
                        continue;
                    }
                };

                match parsed {
                    InboundStreamMessage::Connected { protocol } => {
                        debug!(?protocol, "media stream connected");
                    }
                    InboundStreamMessage::Start { start } => {
                        debug!(
                            stream_sid = %start.stream_sid,
                            call_sid = ?start.call_sid,
                            "media stream started"
                        );
                        return TelephonyEvent::StreamStart {
                            stream_id: start.stream_sid,
                        };
                    }
                    InboundStreamMessage::Media { media } => {
                        match BASE64_STANDARD.decode(&media.payload) {
                            Ok(bytes) => {
                                let seq = *sequence;
                                *sequence += 1;
                                return TelephonyEvent::Audio(AudioFrame::narrowband(bytes, seq));
                            }
                            Err(e) => {
                                warn!("dropping undecodable media payload: {e}");
                            }
                        }
                    }
                    InboundStreamMessage::Mark { .. } => {}
                    InboundStreamMessage::Stop { .. } => return TelephonyEvent::StreamStop,
                }
            }
            Message::Close(_) => return TelephonyEvent::Closed,
            // axum answers pings automatically
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Binary(_) => {
                debug!("ignoring unexpected binary frame on media stream");
            }
        }
    }
}
