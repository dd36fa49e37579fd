//! Per-call conversation state and end-of-call detection.
//!
//! The controller tracks the turn state machine
//! `Greeting -> Listening -> Responding -> (Listening | Ending)`, keeps the
//! append-only transcript, infers the caller's language, and decides when
//! the call should end based on a fixed farewell lexicon.
//!
//! Matching is a case-insensitive substring test against both the caller's
//! utterance and the assistant's reply, in either supported language. The
//! decision to end is made once and is idempotent; re-detecting a farewell
//! after the session has started closing has no effect.

use std::time::SystemTime;

/// English farewell/thanks cues that end a call.
const FAREWELLS_EN: &[&str] = &["bye", "goodbye", "thank", "see you", "talk later"];

/// Tamil farewell/thanks cues. Tamil has no letter case, matched verbatim.
const FAREWELLS_TA: &[&str] = &["நன்றி", "போய் வருகிறேன்", "விடை"];

/// Re-prompt spoken after a silent turn.
const REPROMPT_EN: &str = "Sorry, I didn't catch that. Could you say that again?";
const REPROMPT_TA: &str = "மன்னிக்கவும், எனக்கு கேட்கவில்லை. மீண்டும் சொல்லுங்கள்.";

/// Closing line spoken before hanging up.
const CLOSING_EN: &str = "Alright, take care. Goodbye!";
const CLOSING_TA: &str = "சரி, பார்த்துக்கொள்ளுங்கள். போய் வருகிறேன்.";

/// Spoken language inferred from recognized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// English (default until Tamil script is observed)
    #[default]
    English,
    /// Tamil
    Tamil,
}

impl Language {
    /// Infer the language of one utterance. Any Tamil-block code point
    /// marks the utterance as Tamil.
    pub fn of(text: &str) -> Self {
        if text.chars().any(|c| ('\u{0B80}'..='\u{0BFF}').contains(&c)) {
            Self::Tamil
        } else {
            Self::English
        }
    }
}

/// Who spoke a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The human on the phone
    Caller,
    /// The AI assistant
    Assistant,
}

/// One recognized utterance.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    /// Who spoke
    pub speaker: Speaker,
    /// What was recognized
    pub text: String,
    /// When it was appended
    pub at: SystemTime,
}

/// Turn state of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    /// Waiting for the assistant's opening greeting
    #[default]
    Greeting,
    /// Waiting for caller speech
    Listening,
    /// The assistant is producing a reply
    Responding,
    /// A farewell was detected; the call is wrapping up
    Ending,
}

/// Conversation controller for one session.
#[derive(Debug, Default)]
pub struct ConversationController {
    phase: TurnPhase,
    language: Language,
    transcript: Vec<TranscriptEntry>,
    reprompted: bool,
    closing_requested: bool,
}

impl ConversationController {
    /// Create a controller in the greeting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current turn phase.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Currently inferred caller language.
    pub fn language(&self) -> Language {
        self.language
    }

    /// The transcript so far, in order.
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Record a recognized caller utterance. Updates the language, clears
    /// the pending silence re-prompt, and arms the end-of-call check.
    pub fn observe_caller(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.push(Speaker::Caller, text);
        self.language = Language::of(text);
        self.reprompted = false;

        if self.phase != TurnPhase::Ending {
            self.phase = if is_farewell(text) {
                TurnPhase::Ending
            } else {
                TurnPhase::Responding
            };
        }
    }

    /// Record the assistant's reply. The farewell check also applies to the
    /// assistant's own words.
    pub fn observe_assistant(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.push(Speaker::Assistant, text);

        if self.phase != TurnPhase::Ending && is_farewell(text) {
            self.phase = TurnPhase::Ending;
        }
    }

    /// The assistant finished a spoken turn; hand the floor back to the
    /// caller.
    pub fn on_assistant_turn_complete(&mut self) {
        if matches!(self.phase, TurnPhase::Greeting | TurnPhase::Responding) {
            self.phase = TurnPhase::Listening;
        }
    }

    /// A listening turn elapsed with no recognized caller speech. Returns
    /// the re-prompt line at most once per silence; the allowance resets when
    /// the caller next speaks.
    pub fn note_silence(&mut self) -> Option<String> {
        if self.phase != TurnPhase::Listening || self.reprompted {
            return None;
        }
        self.reprompted = true;
        Some(
            match self.language {
                Language::English => REPROMPT_EN,
                Language::Tamil => REPROMPT_TA,
            }
            .to_string(),
        )
    }

    /// Whether the call should be wound down.
    pub fn should_terminate(&self) -> bool {
        self.phase == TurnPhase::Ending
    }

    /// The closing line to speak before teardown. Yields a value exactly
    /// once; later calls return `None` so teardown cannot double-speak.
    pub fn closing_utterance(&mut self) -> Option<String> {
        if self.phase != TurnPhase::Ending || self.closing_requested {
            return None;
        }
        self.closing_requested = true;
        Some(
            match self.language {
                Language::English => CLOSING_EN,
                Language::Tamil => CLOSING_TA,
            }
            .to_string(),
        )
    }

    fn push(&mut self, speaker: Speaker, text: &str) {
        self.transcript.push(TranscriptEntry {
            speaker,
            text: text.to_string(),
            at: SystemTime::now(),
        });
    }
}

/// Case-insensitive substring match against the farewell lexicon.
fn is_farewell(text: &str) -> bool {
    let lowered = text.to_lowercase();
    FAREWELLS_EN.iter().any(|cue| lowered.contains(cue))
        || FAREWELLS_TA.iter().any(|cue| text.contains(cue))
}
