//! Events broadcast by the session for UI and host observers.
//!
//! Lightweight and lossy: a lagging subscriber misses events but the
//! session never blocks on delivery.

use crate::engines::RecognitionErrorCode;
use crate::session::state::SessionState;
use serde::Serialize;

/// What the session just did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// A transcript arrived; `accepted` is false when the echo guard dropped it.
    Heard { text: String, accepted: bool },
    /// An utterance was handed to the synthesizer.
    Spoke { text: String },
    StepChanged { index: usize, total: usize },
    TimerStarted { total_seconds: u32 },
    TimerFinished,
    /// User-facing problem report.
    Notice { notice: Notice },
}

/// Problems surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Notice {
    PermissionDenied,
    /// Recognition failed in a way that will not be retried automatically.
    RecognitionFailed { error: String },
    /// The recognizer refused to start.
    RecognitionUnavailable { message: String },
}

impl Notice {
    pub(crate) fn recognition_failed(code: &RecognitionErrorCode) -> Self {
        Self::RecognitionFailed {
            error: code.as_str().to_owned(),
        }
    }

    /// Text suitable for a toast or banner.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Microphone access is needed for hands-free cooking.".to_owned()
            }
            Self::RecognitionFailed { error } => {
                format!("Voice recognition stopped ({error}). Tap the mic to try again.")
            }
            Self::RecognitionUnavailable { message } => {
                format!("Voice recognition is unavailable: {message}")
            }
        }
    }
}
