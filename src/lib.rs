//! Chefie: hands-free voice control for following a recipe.
//!
//! The crate holds the voice session core of a cooking assistant:
//! wake-word activation, step-by-step narration, kitchen timers and
//! free-form questions answered by a chat-completions endpoint.
//!
//! # Architecture
//!
//! A [`VoiceSession`] runs as one tokio task that owns all session state.
//! Platform speech engines sit behind the traits in [`engines`] and report
//! back through channels, so the session never blocks on audio:
//! - **Recognition**: platform speech-to-text, restarted between phrases
//! - **Echo guard**: drops transcripts of the app's own voice
//! - **Commands**: keyword grammar over transcripts
//! - **Synthesis**: platform text-to-speech with a microphone hand-off
//! - **Assistant**: HTTP chat completions for anything not a command
//!
//! The [`host`] module exposes the session over newline-delimited JSON so a
//! native shell can supply the engines.

pub mod assistant;
pub mod config;
pub mod echo_guard;
pub mod engines;
pub mod error;
pub mod host;
pub mod navigator;
pub mod recipe;
pub mod session;
pub mod timer;
pub mod voice_command;

pub use assistant::{AssistantService, HttpAssistant, UnavailableAssistant};
pub use config::{SpeechRate, VoiceConfig};
pub use error::{Result, VoiceError};
pub use recipe::{Recipe, Step};
pub use session::{
    Collaborators, SessionEvent, SessionSnapshot, SessionState, VoiceSession, VoiceSessionHandle,
};
pub use voice_command::{VoiceCommand, parse_command};
