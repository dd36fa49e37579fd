//! Speech endpoint WebSocket client.
//!
//! One connection per call. The socket is split and driven by a single
//! connection task: outgoing client events arrive over an mpsc queue,
//! incoming server events are translated into [`SpeechEvent`]s and handed
//! to the session. There is deliberately no reconnection: a channel-level
//! failure is the end of the call.

use async_trait::async_trait;
use base64::prelude::*;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::SpeechConfig;
use super::messages::{
    ClientEvent, InputAudioTranscription, ResponseConfig, ServerEvent, SessionConfig,
    TurnDetection,
};
use crate::core::audio::{AudioEncoding, AudioError, AudioFrame};
use crate::errors::{BridgeError, BridgeResult};

/// Channel capacity for both directions of the connection task.
const CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event received from the speech endpoint, already decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// One wideband PCM frame of assistant audio
    Audio(AudioFrame),
    /// Final transcript of what the caller said
    CallerTranscript(String),
    /// Final transcript of what the assistant said
    AssistantTranscript(String),
    /// The endpoint detected caller speech starting
    TurnStarted,
    /// The assistant finished a spoken turn
    TurnComplete,
    /// The connection is gone; fatal to the session
    Closed,
}

/// Receiving half of a speech channel.
#[async_trait]
pub trait SpeechEvents: Send {
    /// Wait for the next event from the endpoint.
    async fn next_event(&mut self) -> SpeechEvent;
}

/// Sending half of a speech channel.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    /// Forward one wideband PCM frame of caller audio.
    async fn send_audio(&self, frame: AudioFrame) -> BridgeResult<()>;

    /// Ask the assistant to speak the given line (re-prompt, closing
    /// utterance).
    async fn speak(&self, instructions: &str) -> BridgeResult<()>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

enum Command {
    Event(ClientEvent),
    Shutdown,
}

/// Speech channel over the endpoint's WebSocket.
#[derive(Debug)]
pub struct OpenAISpeechChannel {
    events: mpsc::Receiver<SpeechEvent>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl OpenAISpeechChannel {
    /// Connect to the endpoint and seed the session: audio formats, input
    /// transcription, server VAD, and the opening instruction, followed by
    /// a response request so the assistant greets the caller first.
    ///
    /// Fails with [`BridgeError::UpstreamUnavailable`] if the endpoint
    /// cannot be reached within the configured bound. That is fatal to the
    /// session; there is no retry.
    pub async fn open(config: &SpeechConfig) -> BridgeResult<Self> {
        let url = format!("{}?model={}", config.endpoint, config.model.as_str());
        let request = build_ws_request(&url, &config.api_key)?;

        let (ws, _response) = tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| {
            BridgeError::UpstreamUnavailable(format!(
                "connect timed out after {:?}",
                config.connect_timeout
            ))
        })?
        .map_err(|e| BridgeError::UpstreamUnavailable(e.to_string()))?;

        info!(model = %config.model, "connected to speech endpoint");

        let (sink, stream) = ws.split();
        let (event_tx, events) = mpsc::channel(CHANNEL_CAPACITY);
        let (commands, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(run_connection(sink, stream, command_rx, event_tx));

        let channel = Self {
            events,
            commands,
            task,
        };

        channel
            .send_event(ClientEvent::SessionUpdate {
                session: build_session_config(config),
            })
            .await?;
        channel
            .send_event(ClientEvent::ResponseCreate { response: None })
            .await?;

        Ok(channel)
    }

    async fn send_event(&self, event: ClientEvent) -> BridgeResult<()> {
        self.commands
            .send(Command::Event(event))
            .await
            .map_err(|_| BridgeError::UpstreamUnavailable("connection task ended".to_string()))
    }

    /// Split into the event half and a cloneable sink handle.
    pub fn split(self) -> (OpenAISpeechEvents, OpenAISpeechSink) {
        (
            OpenAISpeechEvents {
                events: self.events,
                _task: self.task,
            },
            OpenAISpeechSink {
                commands: self.commands,
            },
        )
    }
}

/// Receiving half of an [`OpenAISpeechChannel`].
pub struct OpenAISpeechEvents {
    events: mpsc::Receiver<SpeechEvent>,
    _task: JoinHandle<()>,
}

#[async_trait]
impl SpeechEvents for OpenAISpeechEvents {
    async fn next_event(&mut self) -> SpeechEvent {
        self.events.recv().await.unwrap_or(SpeechEvent::Closed)
    }
}

/// Cloneable sending half of an [`OpenAISpeechChannel`].
#[derive(Clone)]
pub struct OpenAISpeechSink {
    commands: mpsc::Sender<Command>,
}

#[async_trait]
impl SpeechSink for OpenAISpeechSink {
    async fn send_audio(&self, frame: AudioFrame) -> BridgeResult<()> {
        if frame.encoding != AudioEncoding::Pcm16Wideband {
            return Err(AudioError::EncodingMismatch {
                expected: AudioEncoding::Pcm16Wideband,
                found: frame.encoding,
            }
            .into());
        }

        self.commands
            .send(Command::Event(ClientEvent::audio_append(&frame.payload)))
            .await
            .map_err(|_| BridgeError::UpstreamUnavailable("speech connection closed".to_string()))
    }

    async fn speak(&self, instructions: &str) -> BridgeResult<()> {
        self.commands
            .send(Command::Event(ClientEvent::ResponseCreate {
                response: Some(ResponseConfig {
                    instructions: Some(instructions.to_string()),
                }),
            }))
            .await
            .map_err(|_| BridgeError::UpstreamUnavailable("speech connection closed".to_string()))
    }

    async fn close(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

/// Build the WebSocket upgrade request with authentication headers.
fn build_ws_request(url: &str, api_key: &str) -> BridgeResult<http::Request<()>> {
    let parsed = Url::parse(url).map_err(|e| BridgeError::Config(e.to_string()))?;
    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => {
            return Err(BridgeError::Config(format!(
                "speech endpoint URL has no host: {url}"
            )));
        }
    };

    http::Request::builder()
        .uri(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("OpenAI-Beta", "realtime=v1")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Host", host)
        .body(())
        .map_err(|e| BridgeError::UpstreamUnavailable(e.to_string()))
}

/// Build the seed session configuration.
fn build_session_config(config: &SpeechConfig) -> SessionConfig {
    SessionConfig {
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
        instructions: Some(config.instructions().to_string()),
        voice: Some(config.voice.as_str().to_string()),
        input_audio_format: Some("pcm16".to_string()),
        output_audio_format: Some("pcm16".to_string()),
        input_audio_transcription: Some(InputAudioTranscription {
            model: "whisper-1".to_string(),
        }),
        turn_detection: Some(TurnDetection::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
            create_response: Some(true),
        }),
    }
}

/// Connection task: pumps queued client events out and server events in
/// until either side goes away. No reconnection.
async fn run_connection(
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<SpeechEvent>,
) {
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Event(event)) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("failed to serialize client event: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(json.into())).await {
                        error!("speech endpoint send failed: {e}");
                        break;
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if let Some(event) = translate_event(event, &mut sequence)
                                && events.send(event).await.is_err()
                            {
                                break;
                            }
                        }
                        // A single malformed message is per-message loss,
                        // not a channel failure
                        Err(e) => {
                            let e = BridgeError::UpstreamMessage(e.to_string());
                            warn!("skipping: {e}");
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        error!("failed to send pong: {e}");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("speech endpoint closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("speech endpoint websocket error: {e}");
                    break;
                }
                None => break,
            },
        }
    }

    let _ = events.send(SpeechEvent::Closed).await;
    debug!("speech connection task ended");
}

/// Map a wire event to a session-facing event. Returns `None` for events
/// the relay does not act on.
fn translate_event(event: ServerEvent, sequence: &mut u64) -> Option<SpeechEvent> {
    match event {
        ServerEvent::SessionCreated { session } => {
            info!(session_id = %session.id, "speech session created");
            None
        }
        ServerEvent::SessionUpdated { .. } => None,
        ServerEvent::SpeechStarted { audio_start_ms } => {
            debug!(audio_start_ms, "caller speech started");
            Some(SpeechEvent::TurnStarted)
        }
        ServerEvent::SpeechStopped { .. } => None,
        ServerEvent::TranscriptionCompleted { transcript, .. } => {
            Some(SpeechEvent::CallerTranscript(transcript))
        }
        ServerEvent::AudioTranscriptDone { transcript, .. } => {
            Some(SpeechEvent::AssistantTranscript(transcript))
        }
        ServerEvent::AudioDelta { delta, .. } => match BASE64_STANDARD.decode(&delta) {
            Ok(bytes) => {
                let seq = *sequence;
                *sequence += 1;
                Some(SpeechEvent::Audio(AudioFrame::wideband(bytes, seq)))
            }
            Err(e) => {
                warn!("skipping undecodable audio delta: {e}");
                None
            }
        },
        ServerEvent::ResponseDone { response } => {
            debug!(response_id = %response.id, status = ?response.status, "assistant turn complete");
            Some(SpeechEvent::TurnComplete)
        }
        ServerEvent::Error { error } => {
            // Endpoint-level application errors are logged and skipped; a
            // real disconnect surfaces as Closed
            warn!(
                "speech endpoint error: {} - {}",
                error.error_type, error.message
            );
            None
        }
        ServerEvent::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_translate_audio_delta_assigns_sequence() {
        let mut sequence = 0;
        let event = ServerEvent::AudioDelta {
            delta: BASE64_STANDARD.encode([0u8, 1, 2, 3]),
            item_id: None,
            response_id: None,
        };

        let Some(SpeechEvent::Audio(frame)) = translate_event(event, &mut sequence) else {
            panic!("expected audio event");
        };
        assert_eq!(frame.encoding, AudioEncoding::Pcm16Wideband);
        assert_eq!(frame.payload.as_ref(), &[0u8, 1, 2, 3]);
        assert_eq!(frame.sequence, 0);
        assert_eq!(sequence, 1);
    }

    #[test]
    fn test_translate_skips_undecodable_delta() {
        let mut sequence = 0;
        let event = ServerEvent::AudioDelta {
            delta: "not base64!!".to_string(),
            item_id: None,
            response_id: None,
        };
        assert_eq!(translate_event(event, &mut sequence), None);
        assert_eq!(sequence, 0);
    }

    #[test]
    fn test_translate_turn_lifecycle() {
        let mut sequence = 0;
        let done = ServerEvent::ResponseDone {
            response: super::super::messages::ResponseInfo {
                id: "resp_1".to_string(),
                status: Some("completed".to_string()),
            },
        };
        assert_eq!(
            translate_event(done, &mut sequence),
            Some(SpeechEvent::TurnComplete)
        );

        let started = ServerEvent::SpeechStarted { audio_start_ms: 10 };
        assert_eq!(
            translate_event(started, &mut sequence),
            Some(SpeechEvent::TurnStarted)
        );
    }

    #[tokio::test]
    async fn test_open_fails_fast_when_endpoint_unreachable() {
        let config = SpeechConfig {
            api_key: "test_key".to_string(),
            endpoint: "ws://127.0.0.1:1/realtime".to_string(),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        };

        let err = OpenAISpeechChannel::open(&config).await.unwrap_err();
        assert!(matches!(err, BridgeError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_sink_rejects_narrowband_frames() {
        let (tx, _rx) = mpsc::channel(8);
        let sink = OpenAISpeechSink { commands: tx };

        let err = sink
            .send_audio(AudioFrame::narrowband(vec![0u8; 160], 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Audio(AudioError::EncodingMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_sink_fails_when_connection_task_is_gone() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let sink = OpenAISpeechSink { commands: tx };

        let err = sink
            .send_audio(AudioFrame::wideband(vec![0u8; 320], 0))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UpstreamUnavailable(_)));
    }
}
