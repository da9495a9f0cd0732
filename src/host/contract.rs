//! Versioned host command/event envelopes for native shell integration.

use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Commands a native shell sends to the voice core.
///
/// `session.*` and `timer.*` drive the session; `stt.*` and `tts.*` carry
/// callbacks from the platform speech engines back into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "session.open")]
    SessionOpen,
    #[serde(rename = "session.focus")]
    SessionFocus,
    #[serde(rename = "session.blur")]
    SessionBlur,
    #[serde(rename = "session.back")]
    SessionBack,
    #[serde(rename = "session.start")]
    SessionStart,
    #[serde(rename = "session.stop")]
    SessionStop,
    #[serde(rename = "session.pause")]
    SessionPause,
    #[serde(rename = "session.resume")]
    SessionResume,
    #[serde(rename = "session.interrupt")]
    SessionInterrupt,
    #[serde(rename = "session.rate_set")]
    SessionRateSet,
    #[serde(rename = "session.status")]
    SessionStatus,
    #[serde(rename = "timer.dismiss")]
    TimerDismiss,
    #[serde(rename = "stt.permission")]
    SttPermission,
    #[serde(rename = "stt.result")]
    SttResult,
    #[serde(rename = "stt.end")]
    SttEnd,
    #[serde(rename = "stt.error")]
    SttError,
    #[serde(rename = "tts.started")]
    TtsStarted,
    #[serde(rename = "tts.done")]
    TtsDone,
    #[serde(rename = "tts.error")]
    TtsError,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::SessionOpen => "session.open",
            Self::SessionFocus => "session.focus",
            Self::SessionBlur => "session.blur",
            Self::SessionBack => "session.back",
            Self::SessionStart => "session.start",
            Self::SessionStop => "session.stop",
            Self::SessionPause => "session.pause",
            Self::SessionResume => "session.resume",
            Self::SessionInterrupt => "session.interrupt",
            Self::SessionRateSet => "session.rate_set",
            Self::SessionStatus => "session.status",
            Self::TimerDismiss => "timer.dismiss",
            Self::SttPermission => "stt.permission",
            Self::SttResult => "stt.result",
            Self::SttEnd => "stt.end",
            Self::SttError => "stt.error",
            Self::TtsStarted => "tts.started",
            Self::TtsDone => "tts.done",
            Self::TtsError => "tts.error",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "host.ping" => Some(Self::HostPing),
            "session.open" => Some(Self::SessionOpen),
            "session.focus" => Some(Self::SessionFocus),
            "session.blur" => Some(Self::SessionBlur),
            "session.back" => Some(Self::SessionBack),
            "session.start" => Some(Self::SessionStart),
            "session.stop" => Some(Self::SessionStop),
            "session.pause" => Some(Self::SessionPause),
            "session.resume" => Some(Self::SessionResume),
            "session.interrupt" => Some(Self::SessionInterrupt),
            "session.rate_set" => Some(Self::SessionRateSet),
            "session.status" => Some(Self::SessionStatus),
            "timer.dismiss" => Some(Self::TimerDismiss),
            "stt.permission" => Some(Self::SttPermission),
            "stt.result" => Some(Self::SttResult),
            "stt.end" => Some(Self::SttEnd),
            "stt.error" => Some(Self::SttError),
            "tts.started" => Some(Self::TtsStarted),
            "tts.done" => Some(Self::TtsDone),
            "tts.error" => Some(Self::TtsError),
            "runtime.stop" => Some(Self::RuntimeStop),
            _ => None,
        }
    }
}

/// Event names emitted to the host.
pub mod events {
    pub const STT_PERMISSION_REQUEST: &str = "stt.permission_request";
    pub const STT_START: &str = "stt.start";
    pub const STT_STOP: &str = "stt.stop";
    pub const TTS_SPEAK: &str = "tts.speak";
    pub const TTS_STOP: &str = "tts.stop";
    pub const ALARM_PLAY: &str = "alarm.play";
    pub const ALARM_STOP: &str = "alarm.stop";
    pub const ALARM_RELEASE: &str = "alarm.release";
    pub const HAPTICS_VIBRATE: &str = "haptics.vibrate";
    pub const SESSION_STATE: &str = "session.state";
    pub const SESSION_HEARD: &str = "session.heard";
    pub const SESSION_SPOKE: &str = "session.spoke";
    pub const SESSION_STEP: &str = "session.step";
    pub const SESSION_NOTICE: &str = "session.notice";
    pub const TIMER_STARTED: &str = "timer.started";
    pub const TIMER_FINISHED: &str = "timer.finished";
}

/// A versioned response envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned command envelope from frontend -> backend host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A versioned event envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build an event with a fresh random id.
    #[must_use]
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: uuid::Uuid::new_v4().to_string(),
            event: event.into(),
            payload,
        }
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}
