//! Speech endpoint configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Speech endpoint WebSocket URL.
pub const SPEECH_ENDPOINT_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default bound on establishing the speech connection. Exceeding it is
/// fatal to the session; the call is never retried inline.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session seed instruction sent when a call begins.
pub const DEFAULT_SESSION_INSTRUCTIONS: &str = "You are a friendly bilingual voice assistant on a \
     phone call. Detect whether the caller speaks Tamil or English and reply in the same \
     language. Greet the caller as soon as the call begins. Keep responses short and natural \
     for voice. If the caller says goodbye or thanks you, end the conversation politely.";

/// Supported speech endpoint models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpeechModel {
    /// GPT-4o Realtime Preview model
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Mini Realtime Preview
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
}

impl SpeechModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt-4o-realtime-preview" => Self::Gpt4oRealtimePreview,
            "gpt-4o-mini-realtime-preview" => Self::Gpt4oMiniRealtimePreview,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for SpeechModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Available voices for assistant audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    /// Coral voice
    Coral,
    /// Sage voice
    Sage,
    /// Verse voice
    Verse,
}

impl SpeechVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Coral => "coral",
            Self::Sage => "sage",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "alloy" => Self::Alloy,
            "coral" => Self::Coral,
            "sage" => Self::Sage,
            "verse" => Self::Verse,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for SpeechVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for one speech endpoint connection.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// API key for authentication
    pub api_key: String,
    /// WebSocket endpoint (overridable for tests)
    pub endpoint: String,
    /// Model to use
    pub model: SpeechModel,
    /// Voice for assistant audio
    pub voice: SpeechVoice,
    /// Session seed instruction; `None` uses the default
    pub instructions: Option<String>,
    /// Bound on establishing the connection
    pub connect_timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: SPEECH_ENDPOINT_URL.to_string(),
            model: SpeechModel::default(),
            voice: SpeechVoice::default(),
            instructions: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SpeechConfig {
    /// The seed instruction for the session.
    pub fn instructions(&self) -> &str {
        self.instructions
            .as_deref()
            .unwrap_or(DEFAULT_SESSION_INSTRUCTIONS)
    }
}
