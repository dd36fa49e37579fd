//! Speech endpoint WebSocket message types.
//!
//! JSON events tagged by a `type` field, following the OpenAI Realtime API
//! protocol. Only the subset the bridge actually exchanges is modelled:
//!
//! Client events (sent to the endpoint):
//! - `session.update` - seed the session (instruction, formats, VAD)
//! - `input_audio_buffer.append` - append caller audio
//! - `response.create` - request a spoken response
//!
//! Server events (received from the endpoint):
//! - `session.created` / `session.updated`
//! - `input_audio_buffer.speech_started` / `speech_stopped`
//! - `conversation.item.input_audio_transcription.completed`
//! - `response.audio.delta` / `response.audio_transcript.done`
//! - `response.done`
//! - `error`
//!
//! Anything else deserializes to [`ServerEvent::Unknown`] and is skipped.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration carried by `session.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instruction for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        /// Whether to create a response on turn end
        #[serde(skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
    },
}

/// Response configuration for `response.create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// One-off instruction overriding the session instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// =============================================================================
// Client Events (sent to the endpoint)
// =============================================================================

/// Client events sent to the speech endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Request the model to generate a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Optional per-response configuration
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
}

impl ClientEvent {
    /// Build an audio-append event from raw PCM bytes.
    pub fn audio_append(audio: &[u8]) -> Self {
        Self::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(audio),
        }
    }
}

// =============================================================================
// Server Events (received from the endpoint)
// =============================================================================

/// Session details from `session.created` / `session.updated`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// Endpoint-assigned session ID
    pub id: String,
}

/// Response details from `response.done`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseInfo {
    /// Response ID
    pub id: String,
    /// Completion status
    #[serde(default)]
    pub status: Option<String>,
}

/// Error details from an `error` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// Server events received from the speech endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session details
        session: SessionInfo,
    },

    /// Session configuration updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session details
        session: SessionInfo,
    },

    /// VAD detected caller speech starting
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Audio timestamp in milliseconds
        #[serde(default)]
        audio_start_ms: u64,
    },

    /// VAD detected caller speech stopping
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        /// Audio timestamp in milliseconds
        #[serde(default)]
        audio_end_ms: u64,
    },

    /// Final transcript of caller speech
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        /// Conversation item the transcript belongs to
        #[serde(default)]
        item_id: Option<String>,
        /// Transcribed text
        transcript: String,
    },

    /// Final transcript of assistant speech
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        /// Conversation item the transcript belongs to
        #[serde(default)]
        item_id: Option<String>,
        /// Transcribed text
        transcript: String,
    },

    /// One chunk of assistant audio, base64-encoded PCM
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded audio
        delta: String,
        /// Conversation item the audio belongs to
        #[serde(default)]
        item_id: Option<String>,
        /// Response the audio belongs to
        #[serde(default)]
        response_id: Option<String>,
    },

    /// A response finished; marks the end of an assistant turn
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response details
        response: ResponseInfo,
    },

    /// Endpoint-reported error
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ErrorInfo,
    },

    /// Any event type the bridge does not care about
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_update_serialization() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: Some(vec!["text".to_string(), "audio".to_string()]),
                instructions: Some("Greet the caller.".to_string()),
                voice: Some("alloy".to_string()),
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
            },
        };

        let json = serde_json::to_string(&event).expect("should serialize");
        assert!(json.contains(r#""type":"session.update""#));
        assert!(json.contains(r#""instructions":"Greet the caller.""#));
        assert!(json.contains(r#""type":"server_vad""#));
    }

    #[test]
    fn test_audio_append_encodes_base64() {
        let event = ClientEvent::audio_append(&[1u8, 2, 3, 4]);
        let json = serde_json::to_string(&event).expect("should serialize");
        assert!(json.contains(r#""type":"input_audio_buffer.append""#));
        assert!(json.contains(&BASE64_STANDARD.encode([1u8, 2, 3, 4])));
    }

    #[test]
    fn test_response_create_without_config_omits_field() {
        let event = ClientEvent::ResponseCreate { response: None };
        let json = serde_json::to_string(&event).expect("should serialize");
        assert_eq!(json, r#"{"type":"response.create"}"#);
    }

    #[test]
    fn test_audio_delta_deserialization() {
        let json = r#"{
            "type": "response.audio.delta",
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "content_index": 0,
            "delta": "AAAA"
        }"#;

        let event: ServerEvent = serde_json::from_str(json).expect("should deserialize");
        match event {
            ServerEvent::AudioDelta { delta, response_id, .. } => {
                assert_eq!(delta, "AAAA");
                assert_eq!(response_id.as_deref(), Some("resp_1"));
            }
            _ => panic!("Expected AudioDelta variant"),
        }
    }

    #[test]
    fn test_transcription_completed_deserialization() {
        let json = r#"{
            "type": "conversation.item.input_audio_transcription.completed",
            "item_id": "item_7",
            "content_index": 0,
            "transcript": "thank you, bye"
        }"#;

        let event: ServerEvent = serde_json::from_str(json).expect("should deserialize");
        match event {
            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                assert_eq!(transcript, "thank you, bye");
            }
            _ => panic!("Expected TranscriptionCompleted variant"),
        }
    }

    #[test]
    fn test_unknown_event_types_are_tolerated() {
        let json = r#"{"type": "rate_limits.updated", "rate_limits": []}"#;
        let event: ServerEvent = serde_json::from_str(json).expect("should deserialize");
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn test_error_event_deserialization() {
        let json = r#"{
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "bad audio"}
        }"#;

        let event: ServerEvent = serde_json::from_str(json).expect("should deserialize");
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.error_type, "invalid_request_error");
                assert_eq!(error.message, "bad audio");
            }
            _ => panic!("Expected Error variant"),
        }
    }
}
