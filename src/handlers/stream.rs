//! Telephony media-stream WebSocket handler.
//!
//! This is where a call becomes a session: the platform connects, the
//! handshake extracts the stream id from the `start` event, the speech
//! channel is opened and seeded, and the relay runs until either side ends
//! the call. The registry entry lives exactly as long as the session.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tracing::{error, info, warn};

use crate::core::session::{SessionState, StreamSession};
use crate::core::speech::OpenAISpeechChannel;
use crate::core::telephony::{TelephonyEvent, TwilioMediaChannel};
use crate::errors::BridgeError;
use crate::state::{AppState, SessionEntry};

/// `GET /stream` - WebSocket upgrade for the telephony media stream.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("media stream connection upgrade requested");
    ws.on_upgrade(move |socket| handle_media_stream(socket, state))
}

/// Drive one call from handshake to teardown.
async fn handle_media_stream(socket: WebSocket, state: Arc<AppState>) {
    let mut channel = TwilioMediaChannel::new(socket);

    // Handshake: a connection that never produces a valid start within the
    // bound is a protocol violation and is dropped
    let handshake_timeout = state.config.handshake_timeout();
    let stream_id =
        match tokio::time::timeout(handshake_timeout, wait_for_start(&mut channel)).await {
            Ok(Ok(stream_id)) => stream_id,
            Ok(Err(e)) => {
                warn!("dropping media stream connection: {e}");
                return;
            }
            Err(_) => {
                let e = BridgeError::ProtocolViolation(format!(
                    "no start event within {handshake_timeout:?}"
                ));
                warn!("dropping media stream connection: {e}");
                return;
            }
        };

    info!(stream_id = %stream_id, "media stream handshake complete");
    state.sessions.insert(
        stream_id.clone(),
        SessionEntry {
            state: SessionState::Connecting,
            started_at: Instant::now(),
        },
    );

    // One speech session per call, seeded at open. Failure is fatal: the
    // caller hears silence and the call ends; nothing is retried.
    let speech = match OpenAISpeechChannel::open(&state.config.speech_config()).await {
        Ok(speech) => speech,
        Err(e) => {
            error!(stream_id = %stream_id, "failed to open speech channel: {e}");
            state.sessions.remove(&stream_id);
            return;
        }
    };

    state.set_session_state(&stream_id, SessionState::Active);

    let (telephony_events, telephony_sink) = channel.split(stream_id.clone());
    let (speech_events, speech_sink) = speech.split();
    let session = StreamSession::new(stream_id.clone(), state.config.session_timeouts());
    session
        .run(telephony_events, telephony_sink, speech_events, speech_sink)
        .await;

    state.sessions.remove(&stream_id);
    info!(stream_id = %stream_id, "media stream connection terminated");
}

/// Consume pre-start events until the start arrives. Audio before start is
/// a protocol violation; stop or disconnect before start ends the attempt.
async fn wait_for_start(channel: &mut TwilioMediaChannel) -> Result<String, BridgeError> {
    loop {
        match channel.next_event().await {
            TelephonyEvent::StreamStart { stream_id } => return Ok(stream_id),
            TelephonyEvent::Audio(_) => {
                return Err(BridgeError::ProtocolViolation(
                    "audio before start event".to_string(),
                ));
            }
            TelephonyEvent::StreamStop | TelephonyEvent::Closed => {
                return Err(BridgeError::ChannelClosed);
            }
        }
    }
}
