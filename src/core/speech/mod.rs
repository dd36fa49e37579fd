//! Speech endpoint channel.
//!
//! The bridge holds one duplex WebSocket per call to a hosted
//! speech-to-speech endpoint (OpenAI Realtime API wire protocol). Caller
//! audio goes up as base64 PCM append events; assistant audio, transcripts
//! and turn-lifecycle markers come back down.
//!
//! The channel is opened once per call, seeded with the session instruction,
//! and never reconnected: a greeting that was dropped mid-call cannot be
//! replayed without the caller noticing, so a lost connection ends the call.

pub mod client;
pub mod config;
pub mod messages;

pub use client::{
    OpenAISpeechChannel, OpenAISpeechEvents, OpenAISpeechSink, SpeechEvent, SpeechEvents,
    SpeechSink,
};
pub use config::{
    DEFAULT_SESSION_INSTRUCTIONS, SPEECH_ENDPOINT_URL, SpeechConfig, SpeechModel, SpeechVoice,
};
