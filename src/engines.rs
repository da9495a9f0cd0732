//! Interfaces to the platform services the session drives.
//!
//! The speech engines are asynchronous: `start` and `speak` return
//! immediately and report progress later through a [`RecognitionSink`] or
//! [`SpeechReporter`] handed to the engine. Every sink and reporter is tagged
//! with the recognition run or utterance it belongs to, so reports that
//! arrive after the session moved on are discarded.

use crate::error::Result;
use crate::session::messages::{RecognitionEvent, SessionInput, SynthesisEvent};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Microphone permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Error codes reported by the recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionErrorCode {
    NoSpeech,
    Client,
    Aborted,
    Network,
    NotAllowed,
    ServiceNotAllowed,
    AudioCapture,
    Other(String),
}

impl RecognitionErrorCode {
    /// Parse a wire code such as `no-speech` or `audio-capture`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "no-speech" => Self::NoSpeech,
            "client" => Self::Client,
            "aborted" => Self::Aborted,
            "network" => Self::Network,
            "not-allowed" => Self::NotAllowed,
            "service-not-allowed" => Self::ServiceNotAllowed,
            "audio-capture" => Self::AudioCapture,
            other => Self::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoSpeech => "no-speech",
            Self::Client => "client",
            Self::Aborted => "aborted",
            Self::Network => "network",
            Self::NotAllowed => "not-allowed",
            Self::ServiceNotAllowed => "service-not-allowed",
            Self::AudioCapture => "audio-capture",
            Self::Other(code) => code,
        }
    }

    /// Fatal errors are surfaced to the user and never auto-restarted.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::NotAllowed | Self::ServiceNotAllowed | Self::AudioCapture
        )
    }
}

impl std::fmt::Display for RecognitionErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a recognition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionOptions {
    pub language: String,
    /// Keep listening until `stop` is called.
    pub continuous: bool,
    pub contextual_hints: Vec<String>,
}

/// Options for one synthesized utterance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeakOptions {
    pub rate: f32,
}

/// Vibration feedback patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticPattern {
    /// Simple command acknowledged.
    Single,
    /// Pause or resume.
    Double,
    /// Session stopped.
    Triple,
    /// Timer finished.
    Alarm,
}

impl HapticPattern {
    /// Alternating wait/vibrate durations in milliseconds.
    #[must_use]
    pub fn durations_ms(self) -> &'static [u64] {
        match self {
            Self::Single => &[0, 80],
            Self::Double => &[0, 80, 120, 80],
            Self::Triple => &[0, 80, 120, 80, 120, 80],
            Self::Alarm => &[0, 500, 200, 500, 200, 500],
        }
    }
}

/// Continuous speech-to-text engine.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Ask for microphone access. Called before the first `start`.
    async fn request_permission(&self) -> PermissionStatus;

    /// Begin recognizing. Results, spontaneous ends and errors go to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start at all.
    fn start(&self, options: &RecognitionOptions, sink: RecognitionSink) -> Result<()>;

    /// Stop recognizing. Must be a no-op when not running.
    fn stop(&self);
}

/// Text-to-speech engine.
pub trait SpeechSynthesizer: Send + Sync {
    /// Start speaking `text`; completion is reported through `reporter`.
    fn speak(&self, text: &str, options: SpeakOptions, reporter: SpeechReporter);

    /// Stop any current speech. Must be a no-op when silent.
    fn stop(&self);
}

/// Timer alarm sound.
pub trait AlarmPlayer: Send + Sync {
    fn play(&self);

    fn stop(&self);

    /// Release the loaded sound when the session is torn down.
    fn release(&self) {}
}

/// Fire-and-forget vibration.
pub trait Haptics: Send + Sync {
    fn vibrate(&self, pattern: HapticPattern);
}

/// Event sink for one recognition run.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    run: u64,
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl RecognitionSink {
    pub(crate) fn new(run: u64, tx: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { run, tx }
    }

    /// The recognition run this sink reports for.
    #[must_use]
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn result(&self, transcript: impl Into<String>) {
        self.send(RecognitionEvent::Result(transcript.into()));
    }

    pub fn end(&self) {
        self.send(RecognitionEvent::End);
    }

    pub fn error(&self, code: RecognitionErrorCode) {
        self.send(RecognitionEvent::Error(code));
    }

    fn send(&self, event: RecognitionEvent) {
        // A closed inbox means the session is gone; the event is moot.
        let _ = self.tx.send(SessionInput::Recognition {
            run: self.run,
            event,
        });
    }
}

/// Completion callbacks for one utterance.
#[derive(Debug, Clone)]
pub struct SpeechReporter {
    utterance: u64,
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl SpeechReporter {
    pub(crate) fn new(utterance: u64, tx: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { utterance, tx }
    }

    #[must_use]
    pub fn utterance(&self) -> u64 {
        self.utterance
    }

    pub fn started(&self) {
        self.send(SynthesisEvent::Started);
    }

    pub fn done(&self) {
        self.send(SynthesisEvent::Done);
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(SynthesisEvent::Failed(message.into()));
    }

    fn send(&self, event: SynthesisEvent) {
        let _ = self.tx.send(SessionInput::Synthesis {
            utterance: self.utterance,
            event,
        });
    }
}
