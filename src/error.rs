//! Error types for the voice session.

/// Top-level error type for the cooking voice assistant.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Microphone permission was refused by the user or platform.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// Speech-to-text engine error.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Text-to-speech engine error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// AI question-answering service error.
    #[error("assistant error: {0}")]
    Assistant(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Operation refused because the assistant is currently speaking.
    #[error("busy: {0}")]
    Busy(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected host bridge command.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;
