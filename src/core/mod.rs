pub mod audio;
pub mod conversation;
pub mod session;
pub mod speech;
pub mod telephony;

// Re-export commonly used types for convenience
pub use audio::{AudioEncoding, AudioError, AudioFrame, to_narrowband, to_wideband};
pub use conversation::{ConversationController, Language, Speaker, TranscriptEntry, TurnPhase};
pub use session::{SessionState, SessionTimeouts, StreamSession};
pub use speech::{
    OpenAISpeechChannel, SpeechConfig, SpeechEvent, SpeechEvents, SpeechModel, SpeechSink,
    SpeechVoice,
};
pub use telephony::{MediaEvents, MediaSink, TelephonyEvent, TwilioMediaChannel, TwilioMediaSink};
