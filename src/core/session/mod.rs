//! Stream session: ties one telephony call to one speech session.
//!
//! The relay is two independent forwarding tasks sharing one session:
//!
//! - **uplink** (caller -> AI): telephony media frames are transcoded to
//!   wideband and forwarded to the speech endpoint.
//! - **downlink** (AI -> caller): speech audio deltas are transcoded to
//!   narrowband and queued for playback; transcripts and turn boundaries
//!   feed the conversation controller, which decides re-prompts and
//!   end-of-call.
//!
//! Both tasks share a cancellation token: a stop event, a peer disconnect
//! or a termination decision on either side cancels the other within one
//! receive cycle. The tasks are joined explicitly, never detached, and the
//! channels are released exactly once regardless of which side triggered
//! teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::audio;
use crate::core::conversation::ConversationController;
use crate::core::speech::{SpeechEvent, SpeechEvents, SpeechSink};
use crate::core::telephony::{MediaEvents, MediaSink, TelephonyEvent};

/// Lifecycle state of a session, kept in the server's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Media stream handshake done, speech channel not yet open
    Connecting,
    /// Relay running
    Active,
    /// Termination decided, closing utterance draining
    Closing,
    /// Torn down
    Closed,
}

/// Timing bounds for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    /// Bound on receiving the first assistant audio after connecting.
    /// Exceeding it is fatal to the session.
    pub first_audio: Duration,
    /// Listening time without recognized caller speech before the single
    /// re-prompt is issued.
    pub silence: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            first_audio: Duration::from_secs(15),
            silence: Duration::from_secs(8),
        }
    }
}

/// What the downlink is currently waiting on, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    /// First assistant audio after connect (fatal if exceeded)
    FirstAudio,
    /// Caller speech after an assistant turn (re-prompt if exceeded)
    CallerSpeech,
}

/// One telephony call bridged to one speech session.
pub struct StreamSession {
    stream_id: String,
    controller: Arc<Mutex<ConversationController>>,
    token: CancellationToken,
    timeouts: SessionTimeouts,
}

impl StreamSession {
    /// Create a session for a handshaken media stream.
    pub fn new(stream_id: impl Into<String>, timeouts: SessionTimeouts) -> Self {
        Self {
            stream_id: stream_id.into(),
            controller: Arc::new(Mutex::new(ConversationController::new())),
            token: CancellationToken::new(),
            timeouts,
        }
    }

    /// The session's stream identifier.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Shared handle to the conversation controller.
    pub fn controller(&self) -> Arc<Mutex<ConversationController>> {
        self.controller.clone()
    }

    /// Token observed by both relay directions; cancelling it tears the
    /// session down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run the relay until the call ends. Consumes the session; on return
    /// both channels have been released.
    pub async fn run<TE, TS, SE, SS>(self, telephony: TE, playback: TS, speech_events: SE, speech: SS)
    where
        TE: MediaEvents + 'static,
        TS: MediaSink + 'static,
        SE: SpeechEvents + 'static,
        SS: SpeechSink + Clone + 'static,
    {
        info!(stream_id = %self.stream_id, "session relay starting");

        let uplink = tokio::spawn(relay_caller_audio(
            telephony,
            speech.clone(),
            self.token.clone(),
        ));
        let downlink = tokio::spawn(relay_assistant_audio(
            speech_events,
            playback,
            speech.clone(),
            self.controller.clone(),
            self.token.clone(),
            self.timeouts,
        ));

        let (uplink, downlink) = tokio::join!(uplink, downlink);
        if let Err(e) = uplink {
            warn!(stream_id = %self.stream_id, "uplink task failed: {e}");
        }
        if let Err(e) = downlink {
            warn!(stream_id = %self.stream_id, "downlink task failed: {e}");
        }

        // Release the speech channel exactly once, whichever side ended
        speech.close().await;
        info!(stream_id = %self.stream_id, "session closed");
    }
}

/// Caller -> AI: forward telephony audio upstream, transcoded to wideband.
async fn relay_caller_audio<TE, SS>(mut telephony: TE, speech: SS, token: CancellationToken)
where
    TE: MediaEvents,
    SS: SpeechSink,
{
    let mut forwarded: u64 = 0;

    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = telephony.next_event() => event,
        };

        match event {
            TelephonyEvent::Audio(frame) => {
                // Per-frame decode errors are contained; the frame is
                // skipped and the call continues
                let wide = match audio::to_wideband(&frame) {
                    Ok(wide) => wide,
                    Err(e) => {
                        warn!("skipping caller frame: {e}");
                        continue;
                    }
                };
                if let Err(e) = speech.send_audio(wide).await {
                    warn!("speech endpoint rejected audio: {e}");
                    token.cancel();
                    break;
                }
                forwarded += 1;
            }
            TelephonyEvent::StreamStart { stream_id } => {
                // The handshake already consumed the real start event
                debug!(%stream_id, "ignoring duplicate stream start");
            }
            TelephonyEvent::StreamStop => {
                info!("caller stream stopped");
                token.cancel();
                break;
            }
            TelephonyEvent::Closed => {
                info!("caller stream closed");
                token.cancel();
                break;
            }
        }
    }

    debug!(forwarded, "uplink ended");
}

/// AI -> caller: forward assistant audio downstream, transcoded to
/// narrowband, and drive the conversation controller.
async fn relay_assistant_audio<SE, TS, SS>(
    mut events: SE,
    playback: TS,
    speech: SS,
    controller: Arc<Mutex<ConversationController>>,
    token: CancellationToken,
    timeouts: SessionTimeouts,
) where
    SE: SpeechEvents,
    TS: MediaSink,
    SS: SpeechSink,
{
    let mut deadline: Option<(Instant, Waiting)> = Some((
        Instant::now() + timeouts.first_audio,
        Waiting::FirstAudio,
    ));
    let mut closing_sent = false;
    let mut relayed: u64 = 0;

    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.next_event() => Some(event),
            _ = tokio::time::sleep_until(
                deadline.map(|(at, _)| at).unwrap_or_else(Instant::now)
            ), if deadline.is_some() => None,
        };

        let Some(event) = event else {
            // A deadline fired
            let Some((_, waiting)) = deadline.take() else {
                continue;
            };
            match waiting {
                Waiting::FirstAudio => {
                    warn!("no assistant audio within {:?}, closing", timeouts.first_audio);
                    token.cancel();
                    break;
                }
                Waiting::CallerSpeech => {
                    let prompt = controller.lock().await.note_silence();
                    if let Some(prompt) = prompt {
                        debug!("silent turn, re-prompting caller");
                        if speech.speak(&prompt).await.is_err() {
                            token.cancel();
                            break;
                        }
                    }
                }
            }
            continue;
        };

        match event {
            SpeechEvent::Audio(frame) => {
                if matches!(deadline, Some((_, Waiting::FirstAudio))) {
                    deadline = None;
                }
                let narrow = match audio::to_narrowband(&frame) {
                    Ok(narrow) => narrow,
                    Err(e) => {
                        warn!("skipping assistant frame: {e}");
                        continue;
                    }
                };
                if let Err(e) = playback.send_audio(narrow).await {
                    warn!("media stream rejected audio: {e}");
                    token.cancel();
                    break;
                }
                relayed += 1;
            }

            SpeechEvent::TurnStarted => {
                // The caller is speaking; stop waiting for them
                if matches!(deadline, Some((_, Waiting::CallerSpeech))) {
                    deadline = None;
                }
            }

            SpeechEvent::CallerTranscript(text) => {
                debug!(caller = %text, "caller transcript");
                deadline = None;
                controller.lock().await.observe_caller(&text);
            }

            SpeechEvent::AssistantTranscript(text) => {
                debug!(assistant = %text, "assistant transcript");
                controller.lock().await.observe_assistant(&text);
            }

            SpeechEvent::TurnComplete => {
                let mut guard = controller.lock().await;
                if guard.should_terminate() {
                    if closing_sent {
                        drop(guard);
                        info!("closing utterance delivered, tearing down");
                        token.cancel();
                        break;
                    }
                    let line = guard.closing_utterance();
                    drop(guard);
                    if let Some(line) = line {
                        closing_sent = true;
                        if speech.speak(&line).await.is_err() {
                            token.cancel();
                            break;
                        }
                    }
                } else {
                    guard.on_assistant_turn_complete();
                    drop(guard);
                    deadline = Some((Instant::now() + timeouts.silence, Waiting::CallerSpeech));
                }
            }

            SpeechEvent::Closed => {
                info!("speech channel closed");
                token.cancel();
                break;
            }
        }
    }

    debug!(relayed, "downlink ended");
}
