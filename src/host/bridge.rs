//! Routes host commands to the voice session and the bridged engines.

use crate::assistant::AssistantService;
use crate::config::{SpeechRate, VoiceConfig};
use crate::engines::{AlarmPlayer, Haptics, SpeechRecognizer, SpeechSynthesizer};
use crate::error::{Result, VoiceError};
use crate::host::contract::{
    CommandEnvelope, CommandName, EVENT_VERSION, EventEnvelope, ResponseEnvelope, events,
};
use crate::host::engines::HostEngines;
use crate::recipe::Recipe;
use crate::session::{Collaborators, SessionEvent, VoiceSession, VoiceSessionHandle};
use serde_json::json;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Event broadcast capacity shared by engine requests and session events.
const EVENT_CAPACITY: usize = 256;

struct OpenSession {
    handle: VoiceSessionHandle,
    task: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

/// Host-side owner of at most one voice session.
pub struct HostBridge {
    config: VoiceConfig,
    assistant: Arc<dyn AssistantService>,
    engines: Arc<HostEngines>,
    events: broadcast::Sender<EventEnvelope>,
    session: Option<OpenSession>,
}

impl HostBridge {
    pub fn new(config: VoiceConfig, assistant: Arc<dyn AssistantService>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let engines = Arc::new(HostEngines::new(events.clone()));
        Self {
            config,
            assistant,
            engines,
            events,
            session: None,
        }
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    /// Validate and execute one command. Failures become error responses.
    pub async fn handle(&mut self, envelope: CommandEnvelope) -> ResponseEnvelope {
        if let Err(e) = envelope.validate() {
            return ResponseEnvelope::error(envelope.request_id, e.to_string());
        }
        match self.route(&envelope).await {
            Ok(payload) => ResponseEnvelope::ok(envelope.request_id, payload),
            Err(e) => {
                warn!(command = envelope.command.as_str(), error = %e, "host command failed");
                ResponseEnvelope::error(envelope.request_id, e.to_string())
            }
        }
    }

    async fn route(&mut self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let payload = &envelope.payload;
        match envelope.command {
            CommandName::HostPing => Ok(json!({"pong": true, "contract_version": EVENT_VERSION})),
            CommandName::SessionOpen => self.open_session(payload).await,
            CommandName::SessionFocus => self.session()?.screen_focused().map(|()| accepted()),
            CommandName::SessionBlur => self.session()?.screen_blurred().map(|()| accepted()),
            CommandName::SessionBack => {
                let consumed = self.session()?.back_pressed().await?;
                Ok(json!({"consumed": consumed}))
            }
            CommandName::SessionStart => self.session()?.start_session().map(|()| accepted()),
            CommandName::SessionStop => self.session()?.stop_session().map(|()| accepted()),
            CommandName::SessionPause => self.session()?.pause().map(|()| accepted()),
            CommandName::SessionResume => self.session()?.resume().map(|()| accepted()),
            CommandName::SessionInterrupt => {
                self.session()?.manual_interrupt().map(|()| accepted())
            }
            CommandName::SessionRateSet => {
                let rate = parse_rate(payload)?;
                self.session()?.set_speech_rate(rate).await?;
                Ok(json!({"rate": rate}))
            }
            CommandName::SessionStatus => Ok(match &self.session {
                Some(open) => json!({"open": true, "snapshot": open.handle.snapshot()}),
                None => json!({"open": false}),
            }),
            CommandName::TimerDismiss => self.session()?.dismiss_timer().map(|()| accepted()),
            CommandName::SttPermission => {
                let granted = payload
                    .get("granted")
                    .and_then(serde_json::Value::as_bool)
                    .ok_or_else(|| missing("stt.permission", "granted (bool)"))?;
                self.engines.resolve_permission(granted).map(|()| accepted())
            }
            CommandName::SttResult => {
                let transcript = required_str(payload, "stt.result", "transcript")?;
                self.engines.recognition_result(transcript).map(|()| accepted())
            }
            CommandName::SttEnd => self.engines.recognition_end().map(|()| accepted()),
            CommandName::SttError => {
                let code = required_str(payload, "stt.error", "code")?;
                self.engines.recognition_error(code).map(|()| accepted())
            }
            CommandName::TtsStarted => self.engines.speech_started().map(|()| accepted()),
            CommandName::TtsDone => self.engines.speech_done().map(|()| accepted()),
            CommandName::TtsError => {
                let message = payload
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown synthesis error");
                self.engines.speech_failed(message).map(|()| accepted())
            }
            CommandName::RuntimeStop => {
                self.close_session().await;
                Ok(json!({"stopped": true}))
            }
        }
    }

    fn session(&self) -> Result<&VoiceSessionHandle> {
        self.session
            .as_ref()
            .map(|open| &open.handle)
            .ok_or_else(|| VoiceError::Protocol("no session open; send session.open first".to_owned()))
    }

    async fn open_session(&mut self, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let raw = payload
            .get("recipe")
            .cloned()
            .ok_or_else(|| missing("session.open", "recipe"))?;
        let recipe: Recipe = serde_json::from_value(raw)
            .map_err(|e| VoiceError::Protocol(format!("invalid recipe: {e}")))?;

        self.close_session().await;

        let recognizer: Arc<dyn SpeechRecognizer> = self.engines.clone();
        let synthesizer: Arc<dyn SpeechSynthesizer> = self.engines.clone();
        let alarm: Arc<dyn AlarmPlayer> = self.engines.clone();
        let haptics: Arc<dyn Haptics> = self.engines.clone();
        let collaborators = Collaborators {
            recognizer,
            synthesizer,
            assistant: Arc::clone(&self.assistant),
            alarm,
            haptics,
        };

        info!(recipe = %recipe.title, steps = recipe.steps.len(), "opening voice session");
        let total_steps = recipe.steps.len();
        let (handle, task) = VoiceSession::spawn(self.config.clone(), recipe, collaborators);
        let forwarder = spawn_event_forwarder(handle.subscribe(), self.events.clone());
        self.session = Some(OpenSession {
            handle,
            task,
            forwarder,
        });
        Ok(json!({"total_steps": total_steps}))
    }

    /// Shut the open session down, if any, and wait for its last events.
    pub async fn close_session(&mut self) {
        let Some(open) = self.session.take() else {
            return;
        };
        if let Err(e) = open.handle.shutdown().await {
            warn!(error = %e, "voice session shutdown failed");
        }
        let _ = open.task.await;
        self.engines.reset();
        drop(open.handle);
        let _ = open.forwarder.await;
        info!("voice session closed");
    }
}

fn accepted() -> serde_json::Value {
    json!({"accepted": true})
}

fn missing(command: &str, field: &str) -> VoiceError {
    VoiceError::Protocol(format!("{command} requires payload.{field}"))
}

fn required_str<'a>(payload: &'a serde_json::Value, command: &str, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| missing(command, field))
}

fn parse_rate(payload: &serde_json::Value) -> Result<SpeechRate> {
    let raw = required_str(payload, "session.rate_set", "rate")?;
    SpeechRate::parse(raw).ok_or_else(|| {
        VoiceError::Protocol(format!(
            "unsupported speech rate `{raw}` (expected slow/normal/fast)"
        ))
    })
}

/// Wire name for a session event.
fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::StateChanged { .. } => events::SESSION_STATE,
        SessionEvent::Heard { .. } => events::SESSION_HEARD,
        SessionEvent::Spoke { .. } => events::SESSION_SPOKE,
        SessionEvent::StepChanged { .. } => events::SESSION_STEP,
        SessionEvent::TimerStarted { .. } => events::TIMER_STARTED,
        SessionEvent::TimerFinished => events::TIMER_FINISHED,
        SessionEvent::Notice { .. } => events::SESSION_NOTICE,
    }
}

fn session_event_envelope(event: &SessionEvent) -> Result<EventEnvelope> {
    let mut payload = serde_json::to_value(event)
        .map_err(|e| VoiceError::Protocol(format!("failed to serialize session event: {e}")))?;
    if let (SessionEvent::Notice { notice }, Some(map)) = (event, payload.as_object_mut()) {
        map.insert("message".to_owned(), json!(notice.message()));
    }
    Ok(EventEnvelope::new(event_name(event), payload))
}

/// Feed every item from `source` to `deliver` until the channel closes or
/// `deliver` breaks. A lagging receiver logs and keeps going.
pub(crate) async fn forward_broadcast<T, F, Fut>(
    name: &'static str,
    mut source: broadcast::Receiver<T>,
    mut deliver: F,
) where
    T: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    loop {
        match source.recv().await {
            Ok(item) => {
                if deliver(item).await.is_break() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(forwarder = name, lagged = n, "forwarder lagged; some events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(forwarder = name, "event source closed");
                break;
            }
        }
    }
}

fn spawn_event_forwarder(
    session_events: broadcast::Receiver<SessionEvent>,
    host_events: broadcast::Sender<EventEnvelope>,
) -> JoinHandle<()> {
    tokio::spawn(forward_broadcast(
        "session",
        session_events,
        move |event: SessionEvent| {
            match session_event_envelope(&event) {
                Ok(envelope) => {
                    let _ = host_events.send(envelope);
                }
                Err(e) => warn!(error = %e, "skipping session event"),
            }
            std::future::ready(ControlFlow::Continue(()))
        },
    ))
}
