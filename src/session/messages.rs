//! Inputs processed by the session actor.
//!
//! Everything that can change session state arrives as one [`SessionInput`]
//! on a single inbox, so ordering is arrival order and no locking is needed.

use crate::config::SpeechRate;
use crate::engines::{PermissionStatus, RecognitionErrorCode};
use crate::error::{Result, VoiceError};
use tokio::sync::oneshot;

/// One item in the session inbox.
#[derive(Debug)]
pub(crate) enum SessionInput {
    /// Request from the UI or host.
    Intent(SessionIntent),
    /// Outcome of a microphone permission request.
    Permission { status: PermissionStatus },
    /// Event from recognition run `run`.
    Recognition { run: u64, event: RecognitionEvent },
    /// Callback for utterance `utterance`.
    Synthesis { utterance: u64, event: SynthesisEvent },
    /// One-second tick for countdown `timer`.
    TimerTick { timer: u64 },
    /// A delayed action scheduled during session epoch `epoch`.
    Deferred { epoch: u64, action: Deferred },
    /// Answer from the AI fallback for a question asked during `epoch`.
    AssistantReply {
        epoch: u64,
        origin: QuestionOrigin,
        answer: Result<String>,
    },
}

/// Recognizer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Result(String),
    /// The engine stopped on its own.
    End,
    Error(RecognitionErrorCode),
}

/// Synthesizer progress for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Started,
    Done,
    Failed(String),
}

/// Delayed continuations of the speak/listen handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deferred {
    /// Mic release grace or lead-in pause elapsed; hand `utterance` to the synthesizer.
    BeginSynthesis { utterance: u64 },
    /// Settle buffer after `utterance` elapsed; clear the speaking flag.
    SettleSpeech { utterance: u64 },
    /// Post-speech runway elapsed; reopen the microphone if still wanted.
    ResumeListening,
    /// Restart recognition after a benign end or error.
    RestartRecognition,
}

/// Where a free-form question was asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuestionOrigin {
    /// During the activation handshake, before cooking started.
    Activation,
    /// While cooking.
    Cooking,
}

/// Operations requested through [`VoiceSessionHandle`](super::VoiceSessionHandle).
#[derive(Debug)]
pub(crate) enum SessionIntent {
    ScreenFocused,
    ScreenBlurred,
    /// Replies whether the press was consumed by an active voice mode.
    BackPressed(oneshot::Sender<bool>),
    StartSession,
    StopSession,
    Pause,
    Resume,
    SetSpeechRate(SpeechRate, oneshot::Sender<std::result::Result<(), VoiceError>>),
    ManualInterrupt,
    DismissTimer,
    Shutdown(oneshot::Sender<()>),
}
