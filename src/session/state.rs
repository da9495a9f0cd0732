//! Session states and the UI-facing snapshot.

use crate::config::SpeechRate;
use crate::timer::TimerSnapshot;
use serde::Serialize;

/// Step of the activation handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStage {
    /// Waiting for "ready".
    Ready,
    /// Waiting for "first step" or a question.
    Command,
}

/// Top-level voice session state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    WakeListening,
    Activating(ActivationStage),
    Cooking,
    Paused,
}

impl SessionState {
    /// Any state other than `Idle`.
    #[must_use]
    pub fn is_voice_mode(self) -> bool {
        self != Self::Idle
    }

    #[must_use]
    pub fn is_activating(self) -> bool {
        matches!(self, Self::Activating(_))
    }

    /// Stable name used in logs and host events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WakeListening => "wake_listening",
            Self::Activating(ActivationStage::Ready) => "activating_ready",
            Self::Activating(ActivationStage::Command) => "activating_command",
            Self::Cooking => "cooking",
            Self::Paused => "paused",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reactive view of the session, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub is_listening: bool,
    pub is_speaking: bool,
    pub current_step_index: Option<usize>,
    pub total_steps: usize,
    pub recognized_text: Option<String>,
    pub timer: Option<TimerSnapshot>,
    pub speech_rate: SpeechRate,
}

impl SessionSnapshot {
    pub(crate) fn initial(total_steps: usize, speech_rate: SpeechRate) -> Self {
        Self {
            state: SessionState::Idle,
            is_listening: false,
            is_speaking: false,
            current_step_index: None,
            total_steps,
            recognized_text: None,
            timer: None,
            speech_rate,
        }
    }
}
