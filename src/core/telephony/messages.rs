//! Telephony media-stream wire messages.
//!
//! These mirror the Twilio Media Streams WebSocket protocol: JSON objects
//! tagged by an `event` field, with audio payloads base64-encoded u-law.

use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound (platform -> bridge)
// =============================================================================

/// Messages received from the telephony platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundStreamMessage {
    /// Protocol preamble sent once after the socket opens
    Connected {
        /// Protocol name/version advertised by the platform
        #[serde(default)]
        protocol: Option<String>,
    },

    /// Media stream metadata; precedes all audio
    Start {
        /// Stream description
        start: StreamStartInfo,
    },

    /// One chunk of caller audio
    Media {
        /// Audio payload
        media: MediaPayload,
    },

    /// Playback checkpoint echo (response to an outbound mark)
    Mark {
        /// Mark label
        #[serde(default)]
        mark: Option<serde_json::Value>,
    },

    /// The platform ended the stream
    Stop {
        /// Stop details (call/account ids), unused by the bridge
        #[serde(default)]
        stop: Option<serde_json::Value>,
    },
}

/// Metadata from the `start` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamStartInfo {
    /// Platform-assigned stream identifier, stable for the call
    #[serde(rename = "streamSid")]
    pub stream_sid: String,

    /// Call identifier on the telephony platform
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,

    /// Account identifier
    #[serde(rename = "accountSid", default)]
    pub account_sid: Option<String>,

    /// Tracks present on the stream (e.g. "inbound")
    #[serde(default)]
    pub tracks: Vec<String>,
}

/// Audio payload of a `media` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded u-law audio
    pub payload: String,

    /// Track the audio belongs to
    #[serde(default)]
    pub track: Option<String>,

    /// Chunk counter assigned by the platform
    #[serde(default)]
    pub chunk: Option<String>,

    /// Presentation timestamp in milliseconds
    #[serde(default)]
    pub timestamp: Option<String>,
}

// =============================================================================
// Outbound (bridge -> platform)
// =============================================================================

/// Messages sent to the telephony platform.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundStreamMessage {
    /// One chunk of assistant audio for playback
    Media {
        /// Stream this audio belongs to
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Audio payload
        media: OutboundMediaPayload,
    },
}

/// Audio payload of an outbound `media` event.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMediaPayload {
    /// Base64-encoded u-law audio
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_message_deserialization() {
        let json = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "streamSid": "MZ1234",
                "callSid": "CA5678",
                "accountSid": "AC9999",
                "tracks": ["inbound"]
            }
        }"#;

        let msg: InboundStreamMessage = serde_json::from_str(json).expect("should deserialize");
        match msg {
            InboundStreamMessage::Start { start } => {
                assert_eq!(start.stream_sid, "MZ1234");
                assert_eq!(start.call_sid.as_deref(), Some("CA5678"));
                assert_eq!(start.tracks, vec!["inbound"]);
            }
            _ => panic!("Expected Start variant"),
        }
    }

    #[test]
    fn test_media_message_deserialization() {
        let json = r#"{
            "event": "media",
            "media": {
                "track": "inbound",
                "chunk": "3",
                "timestamp": "60",
                "payload": "////"
            }
        }"#;

        let msg: InboundStreamMessage = serde_json::from_str(json).expect("should deserialize");
        match msg {
            InboundStreamMessage::Media { media } => {
                assert_eq!(media.payload, "////");
                assert_eq!(media.track.as_deref(), Some("inbound"));
            }
            _ => panic!("Expected Media variant"),
        }
    }

    #[test]
    fn test_stop_and_connected_deserialization() {
        let stop: InboundStreamMessage =
            serde_json::from_str(r#"{"event": "stop", "stop": {"callSid": "CA1"}}"#).unwrap();
        assert!(matches!(stop, InboundStreamMessage::Stop { .. }));

        let connected: InboundStreamMessage =
            serde_json::from_str(r#"{"event": "connected", "protocol": "Call"}"#).unwrap();
        assert!(matches!(connected, InboundStreamMessage::Connected { .. }));
    }

    #[test]
    fn test_outbound_media_serialization() {
        let msg = OutboundStreamMessage::Media {
            stream_sid: "MZ1234".to_string(),
            media: OutboundMediaPayload {
                payload: "AAAA".to_string(),
            },
        };

        let json = serde_json::to_string(&msg).expect("should serialize");
        assert!(json.contains(r#""event":"media""#));
        assert!(json.contains(r#""streamSid":"MZ1234""#));
        assert!(json.contains(r#""payload":"AAAA""#));
    }
}
