//! Configuration for the bridge server.
//!
//! Configuration comes from environment variables (optionally via a `.env`
//! file loaded in `main`), with CLI overrides for host and port. Secrets
//! are zeroized when the configuration is dropped.
//!
//! # Required variables
//!
//! - `PUBLIC_URL` - externally reachable base URL of this server; the
//!   telephony platform is pointed at `wss://<PUBLIC_URL>/stream`
//! - `OPENAI_API_KEY` - speech endpoint API key
//! - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_FROM_NUMBER` -
//!   telephony dial-out credentials
//!
//! # Optional variables
//!
//! - `HOST` (default `0.0.0.0`), `PORT` (default `8080`)
//! - `SPEECH_MODEL`, `SPEECH_VOICE`, `SESSION_INSTRUCTIONS`
//! - `SPEECH_ENDPOINT` - override the speech WebSocket URL
//! - `TELEPHONY_API_BASE` - override the telephony REST base URL
//! - `HANDSHAKE_TIMEOUT_SECS`, `SPEECH_CONNECT_TIMEOUT_SECS`,
//!   `FIRST_AUDIO_TIMEOUT_SECS`, `SILENCE_TIMEOUT_SECS`

use std::env;
use std::time::Duration;

use crate::core::session::SessionTimeouts;
use crate::core::speech::{SPEECH_ENDPOINT_URL, SpeechConfig, SpeechModel, SpeechVoice};
use crate::errors::{BridgeError, BridgeResult};

/// Default telephony REST API base URL.
pub const DEFAULT_TELEPHONY_API_BASE: &str = "https://api.twilio.com";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Externally reachable base URL of this server
    pub public_url: String,

    /// Telephony account identifier
    pub telephony_account_sid: String,
    /// Telephony auth token
    pub telephony_auth_token: String,
    /// Caller id for outbound calls
    pub telephony_from_number: String,
    /// Telephony REST API base URL (overridable for tests)
    pub telephony_api_base: String,

    /// Speech endpoint API key
    pub speech_api_key: String,
    /// Speech endpoint WebSocket URL
    pub speech_endpoint: String,
    /// Speech model
    pub speech_model: SpeechModel,
    /// Voice for assistant audio
    pub speech_voice: SpeechVoice,
    /// Session seed instruction override
    pub session_instructions: Option<String>,

    /// Bound on the media-stream handshake (start event arrival)
    pub handshake_timeout_secs: u64,
    /// Bound on establishing the speech connection
    pub speech_connect_timeout_secs: u64,
    /// Bound on receiving the first assistant audio
    pub first_audio_timeout_secs: u64,
    /// Listening time before the single silence re-prompt
    pub silence_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: String::new(),
            telephony_account_sid: String::new(),
            telephony_auth_token: String::new(),
            telephony_from_number: String::new(),
            telephony_api_base: DEFAULT_TELEPHONY_API_BASE.to_string(),
            speech_api_key: String::new(),
            speech_endpoint: SPEECH_ENDPOINT_URL.to_string(),
            speech_model: SpeechModel::default(),
            speech_voice: SpeechVoice::default(),
            session_instructions: None,
            handshake_timeout_secs: 10,
            speech_connect_timeout_secs: 10,
            first_audio_timeout_secs: 15,
            silence_timeout_secs: 8,
        }
    }
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for BridgeConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.telephony_auth_token.zeroize();
        self.speech_api_key.zeroize();
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> BridgeResult<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|_| BridgeError::Config(format!("invalid PORT: {port}")))?;
        }

        config.public_url = required_var("PUBLIC_URL")?
            .trim_end_matches('/')
            .to_string();
        config.telephony_account_sid = required_var("TWILIO_ACCOUNT_SID")?;
        config.telephony_auth_token = required_var("TWILIO_AUTH_TOKEN")?;
        config.telephony_from_number = required_var("TWILIO_FROM_NUMBER")?;
        config.speech_api_key = required_var("OPENAI_API_KEY")?;

        if let Ok(base) = env::var("TELEPHONY_API_BASE") {
            config.telephony_api_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(endpoint) = env::var("SPEECH_ENDPOINT") {
            config.speech_endpoint = endpoint;
        }
        if let Ok(model) = env::var("SPEECH_MODEL") {
            config.speech_model = SpeechModel::from_str_or_default(&model);
        }
        if let Ok(voice) = env::var("SPEECH_VOICE") {
            config.speech_voice = SpeechVoice::from_str_or_default(&voice);
        }
        if let Ok(instructions) = env::var("SESSION_INSTRUCTIONS") {
            config.session_instructions = Some(instructions);
        }

        config.handshake_timeout_secs =
            duration_var("HANDSHAKE_TIMEOUT_SECS", config.handshake_timeout_secs)?;
        config.speech_connect_timeout_secs = duration_var(
            "SPEECH_CONNECT_TIMEOUT_SECS",
            config.speech_connect_timeout_secs,
        )?;
        config.first_audio_timeout_secs =
            duration_var("FIRST_AUDIO_TIMEOUT_SECS", config.first_audio_timeout_secs)?;
        config.silence_timeout_secs =
            duration_var("SILENCE_TIMEOUT_SECS", config.silence_timeout_secs)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> BridgeResult<()> {
        if !self.public_url.starts_with("http://") && !self.public_url.starts_with("https://") {
            return Err(BridgeError::Config(format!(
                "PUBLIC_URL must be an http(s) URL, got: {}",
                self.public_url
            )));
        }
        Ok(())
    }

    /// Bind address for the listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL the telephony platform should stream media to.
    pub fn stream_url(&self) -> String {
        let ws_base = self
            .public_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{ws_base}/stream")
    }

    /// Bound on the media-stream handshake.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Per-session timing bounds for the relay.
    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            first_audio: Duration::from_secs(self.first_audio_timeout_secs),
            silence: Duration::from_secs(self.silence_timeout_secs),
        }
    }

    /// Configuration for one speech endpoint connection.
    pub fn speech_config(&self) -> SpeechConfig {
        SpeechConfig {
            api_key: self.speech_api_key.clone(),
            endpoint: self.speech_endpoint.clone(),
            model: self.speech_model,
            voice: self.speech_voice,
            instructions: self.session_instructions.clone(),
            connect_timeout: Duration::from_secs(self.speech_connect_timeout_secs),
        }
    }
}

fn required_var(name: &str) -> BridgeResult<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(BridgeError::Config(format!(
            "missing required environment variable: {name}"
        ))),
    }
}

fn duration_var(name: &str, default: u64) -> BridgeResult<u64> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| BridgeError::Config(format!("invalid {name}: {value}"))),
        Err(_) => Ok(default),
    }
}
