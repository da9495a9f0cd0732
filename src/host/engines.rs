//! Speech, alarm and haptics engines implemented by the native shell.
//!
//! Each engine call becomes an [`EventEnvelope`] for the host; the host
//! reports back with `stt.*` / `tts.*` commands, which are routed to the
//! sink or reporter of the run currently in progress.

use crate::engines::{
    AlarmPlayer, HapticPattern, Haptics, PermissionStatus, RecognitionErrorCode,
    RecognitionOptions, RecognitionSink, SpeakOptions, SpeechRecognizer, SpeechReporter,
    SpeechSynthesizer,
};
use crate::error::{Result, VoiceError};
use crate::host::contract::{EventEnvelope, events};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

/// Engines bridged over the host event stream.
pub struct HostEngines {
    events: broadcast::Sender<EventEnvelope>,
    permission: Mutex<Option<oneshot::Sender<PermissionStatus>>>,
    sink: Mutex<Option<RecognitionSink>>,
    reporter: Mutex<Option<SpeechReporter>>,
}

impl HostEngines {
    #[must_use]
    pub fn new(events: broadcast::Sender<EventEnvelope>) -> Self {
        Self {
            events,
            permission: Mutex::new(None),
            sink: Mutex::new(None),
            reporter: Mutex::new(None),
        }
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        debug!(event, "host engine event");
        // No host listening means nobody can act on the request anyway.
        let _ = self.events.send(EventEnvelope::new(event, payload));
    }

    /// Forget pending callbacks. An unanswered permission prompt resolves as denied.
    pub fn reset(&self) {
        self.permission.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.reporter.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Host answered the permission prompt.
    pub fn resolve_permission(&self, granted: bool) -> Result<()> {
        let pending = self
            .permission
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(reply) = pending else {
            return Err(VoiceError::Recognition(
                "no permission request pending".to_owned(),
            ));
        };
        let status = if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        let _ = reply.send(status);
        Ok(())
    }

    fn current_sink(&self) -> Result<RecognitionSink> {
        self.sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| VoiceError::Recognition("recognizer is not running".to_owned()))
    }

    fn take_sink(&self) -> Result<RecognitionSink> {
        self.sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| VoiceError::Recognition("recognizer is not running".to_owned()))
    }

    pub fn recognition_result(&self, transcript: &str) -> Result<()> {
        self.current_sink()?.result(transcript);
        Ok(())
    }

    /// The platform recognizer stopped by itself.
    pub fn recognition_end(&self) -> Result<()> {
        self.take_sink()?.end();
        Ok(())
    }

    pub fn recognition_error(&self, code: &str) -> Result<()> {
        self.take_sink()?.error(RecognitionErrorCode::parse(code));
        Ok(())
    }

    fn current_reporter(&self) -> Result<SpeechReporter> {
        self.reporter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| VoiceError::Synthesis("nothing is being spoken".to_owned()))
    }

    fn take_reporter(&self) -> Result<SpeechReporter> {
        self.reporter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| VoiceError::Synthesis("nothing is being spoken".to_owned()))
    }

    pub fn speech_started(&self) -> Result<()> {
        self.current_reporter()?.started();
        Ok(())
    }

    pub fn speech_done(&self) -> Result<()> {
        self.take_reporter()?.done();
        Ok(())
    }

    pub fn speech_failed(&self, message: &str) -> Result<()> {
        self.take_reporter()?.failed(message);
        Ok(())
    }
}

#[async_trait]
impl SpeechRecognizer for HostEngines {
    async fn request_permission(&self) -> PermissionStatus {
        let (tx, rx) = oneshot::channel();
        {
            let mut slot = self.permission.lock().unwrap_or_else(|e| e.into_inner());
            // A newer prompt supersedes an unanswered one.
            *slot = Some(tx);
        }
        self.emit(events::STT_PERMISSION_REQUEST, json!({}));
        match rx.await {
            Ok(status) => status,
            Err(_) => {
                warn!("permission prompt abandoned; treating as denied");
                PermissionStatus::Denied
            }
        }
    }

    fn start(&self, options: &RecognitionOptions, sink: RecognitionSink) -> Result<()> {
        let run = sink.run();
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(sink);
        self.emit(
            events::STT_START,
            json!({
                "run": run,
                "language": options.language,
                "continuous": options.continuous,
                "contextual_hints": options.contextual_hints,
            }),
        );
        Ok(())
    }

    fn stop(&self) {
        let stopped = self.sink.lock().unwrap_or_else(|e| e.into_inner()).take();
        if stopped.is_some() {
            self.emit(events::STT_STOP, json!({}));
        }
    }
}

impl SpeechSynthesizer for HostEngines {
    fn speak(&self, text: &str, options: SpeakOptions, reporter: SpeechReporter) {
        let utterance = reporter.utterance();
        *self.reporter.lock().unwrap_or_else(|e| e.into_inner()) = Some(reporter);
        self.emit(
            events::TTS_SPEAK,
            json!({"utterance": utterance, "text": text, "rate": options.rate}),
        );
    }

    fn stop(&self) {
        let stopped = self.reporter.lock().unwrap_or_else(|e| e.into_inner()).take();
        if stopped.is_some() {
            self.emit(events::TTS_STOP, json!({}));
        }
    }
}

impl AlarmPlayer for HostEngines {
    fn play(&self) {
        self.emit(events::ALARM_PLAY, json!({}));
    }

    fn stop(&self) {
        self.emit(events::ALARM_STOP, json!({}));
    }

    fn release(&self) {
        self.emit(events::ALARM_RELEASE, json!({}));
    }
}

impl Haptics for HostEngines {
    fn vibrate(&self, pattern: HapticPattern) {
        self.emit(
            events::HAPTICS_VIBRATE,
            json!({"pattern": pattern, "durations_ms": pattern.durations_ms()}),
        );
    }
}
