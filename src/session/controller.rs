//! The voice session actor and its handle.
//!
//! A single tokio task owns every piece of session state. UI intents,
//! engine callbacks, timer ticks and delayed continuations are all posted to
//! its inbox and processed one at a time. Callbacks carry the id of the
//! recognition run, utterance, timer or session epoch they belong to, so a
//! callback that arrives after the session moved on is a no-op.

use crate::assistant::AssistantService;
use crate::config::{SpeechRate, VoiceConfig};
use crate::echo_guard::EchoGuard;
use crate::engines::{AlarmPlayer, HapticPattern, Haptics, SpeechRecognizer, SpeechSynthesizer};
use crate::error::{Result, VoiceError};
use crate::navigator::StepNavigator;
use crate::recipe::Recipe;
use crate::session::countdown::Countdown;
use crate::session::events::{Notice, SessionEvent};
use crate::session::listen::ListenGateway;
use crate::session::messages::{Deferred, SessionInput, SessionIntent};
use crate::session::speak::SpeakGateway;
use crate::session::state::{ActivationStage, SessionSnapshot, SessionState};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Broadcast capacity for session events.
const EVENT_CAPACITY: usize = 128;

/// Platform services driven by the session.
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub assistant: Arc<dyn AssistantService>,
    pub alarm: Arc<dyn AlarmPlayer>,
    pub haptics: Arc<dyn Haptics>,
}

/// Entry point for creating a voice session.
pub struct VoiceSession;

impl VoiceSession {
    /// Spawn the session actor on the current tokio runtime.
    ///
    /// The session starts `Idle`; call [`VoiceSessionHandle::screen_focused`]
    /// to begin wake-word listening. The actor runs until
    /// [`VoiceSessionHandle::shutdown`] is called or every sender is dropped.
    pub fn spawn(
        config: VoiceConfig,
        recipe: Recipe,
        engines: Collaborators,
    ) -> (VoiceSessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let speaking = Arc::new(AtomicBool::new(false));
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial(
            recipe.steps.len(),
            config.speech.rate,
        ));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = SessionActor::new(
            config,
            recipe,
            engines,
            tx.downgrade(),
            Arc::clone(&speaking),
            snapshot_tx,
            events.clone(),
        );
        let task = tokio::spawn(actor.run(rx));

        let handle = VoiceSessionHandle {
            tx,
            snapshot: snapshot_rx,
            events,
            speaking,
        };
        (handle, task)
    }
}

/// Cloneable handle used by the UI and host to drive a session.
#[derive(Clone)]
pub struct VoiceSessionHandle {
    tx: mpsc::UnboundedSender<SessionInput>,
    snapshot: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    speaking: Arc<AtomicBool>,
}

impl VoiceSessionHandle {
    fn send(&self, intent: SessionIntent) -> Result<()> {
        self.tx
            .send(SessionInput::Intent(intent))
            .map_err(|_| VoiceError::Channel("voice session has shut down".to_owned()))
    }

    /// The cooking screen gained focus: start wake-word listening if idle.
    pub fn screen_focused(&self) -> Result<()> {
        self.send(SessionIntent::ScreenFocused)
    }

    /// The cooking screen lost focus: tear everything down.
    pub fn screen_blurred(&self) -> Result<()> {
        self.send(SessionIntent::ScreenBlurred)
    }

    /// Hardware back press. Returns `true` when an active voice mode
    /// consumed the press and the session returned to idle.
    pub async fn back_pressed(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionIntent::BackPressed(reply_tx))?;
        reply_rx
            .await
            .map_err(|_| VoiceError::Channel("voice session dropped back-press reply".to_owned()))
    }

    /// Skip the wake word and begin the activation handshake.
    pub fn start_session(&self) -> Result<()> {
        self.send(SessionIntent::StartSession)
    }

    /// Return to idle. Safe to call repeatedly.
    pub fn stop_session(&self) -> Result<()> {
        self.send(SessionIntent::StopSession)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionIntent::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(SessionIntent::Resume)
    }

    /// Change the playback rate.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Busy`] while the assistant is speaking.
    pub async fn set_speech_rate(&self, rate: SpeechRate) -> Result<()> {
        if self.is_speaking_now() {
            return Err(VoiceError::Busy(
                "cannot change speech rate while speaking".to_owned(),
            ));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionIntent::SetSpeechRate(rate, reply_tx))?;
        reply_rx
            .await
            .map_err(|_| VoiceError::Channel("voice session dropped rate reply".to_owned()))?
    }

    /// Cut off current speech and listen again immediately.
    pub fn manual_interrupt(&self) -> Result<()> {
        self.send(SessionIntent::ManualInterrupt)
    }

    /// Silence a finished timer and remove it from the UI.
    pub fn dismiss_timer(&self) -> Result<()> {
        self.send(SessionIntent::DismissTimer)
    }

    /// Current reactive snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that observes every published snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Immediate speaking flag, updated before the snapshot.
    #[must_use]
    pub fn is_speaking_now(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Tear the session down and stop the actor. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.send(SessionIntent::Shutdown(reply_tx)).is_err() {
            return Ok(());
        }
        // The actor may already be gone when several handles shut down at once.
        let _ = reply_rx.await;
        Ok(())
    }
}

/// State owned by the session task.
pub(super) struct SessionActor {
    pub(super) config: VoiceConfig,
    pub(super) recipe: Recipe,
    pub(super) engines: Collaborators,
    pub(super) inbox: mpsc::WeakUnboundedSender<SessionInput>,
    pub(super) state: SessionState,
    pub(super) navigator: StepNavigator,
    pub(super) echo: EchoGuard,
    pub(super) recognized_text: Option<String>,
    pub(super) speech_rate: SpeechRate,
    /// Bumped on every return to idle; deferred work from older epochs is dropped.
    pub(super) epoch: u64,
    pub(super) listen: ListenGateway,
    pub(super) speech: SpeakGateway,
    pub(super) speaking: Arc<AtomicBool>,
    pub(super) awaiting_answer: bool,
    pub(super) countdown: Countdown,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    released: bool,
}

impl SessionActor {
    fn new(
        config: VoiceConfig,
        recipe: Recipe,
        engines: Collaborators,
        inbox: mpsc::WeakUnboundedSender<SessionInput>,
        speaking: Arc<AtomicBool>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let navigator = StepNavigator::new(recipe.steps.clone());
        let echo = EchoGuard::new(config.echo.clone());
        let speech_rate = config.speech.rate;
        Self {
            config,
            recipe,
            engines,
            inbox,
            state: SessionState::Idle,
            navigator,
            echo,
            recognized_text: None,
            speech_rate,
            epoch: 0,
            listen: ListenGateway::default(),
            speech: SpeakGateway::default(),
            speaking,
            awaiting_answer: false,
            countdown: Countdown::default(),
            snapshot_tx,
            events,
            released: false,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionInput>) {
        info!(
            recipe = %self.recipe.title,
            steps = self.navigator.total(),
            "voice session started"
        );
        while let Some(input) = rx.recv().await {
            if self.handle(input).is_break() {
                break;
            }
        }
        self.teardown();
        info!("voice session stopped");
    }

    fn handle(&mut self, input: SessionInput) -> ControlFlow<()> {
        match input {
            SessionInput::Intent(intent) => return self.handle_intent(intent),
            SessionInput::Permission { status } => self.on_permission(status),
            SessionInput::Recognition { run, event } => self.on_recognition(run, event),
            SessionInput::Synthesis { utterance, event } => self.on_synthesis(utterance, event),
            SessionInput::TimerTick { timer } => self.on_timer_tick(timer),
            SessionInput::Deferred { epoch, action } => {
                if epoch == self.epoch {
                    self.run_deferred(action);
                } else {
                    debug!(?action, epoch, current = self.epoch, "dropping stale deferred action");
                }
            }
            SessionInput::AssistantReply {
                epoch,
                origin,
                answer,
            } => self.on_assistant_reply(epoch, origin, answer),
        }
        ControlFlow::Continue(())
    }

    fn handle_intent(&mut self, intent: SessionIntent) -> ControlFlow<()> {
        debug!(?intent, state = %self.state, "session intent");
        match intent {
            SessionIntent::ScreenFocused => self.screen_focused(),
            SessionIntent::ScreenBlurred => self.enter_idle("screen blurred"),
            SessionIntent::BackPressed(reply) => {
                let consumed = self.state.is_voice_mode();
                if consumed {
                    self.enter_idle("back pressed");
                }
                let _ = reply.send(consumed);
            }
            SessionIntent::StartSession => self.start_session(),
            SessionIntent::StopSession => self.enter_idle("session stopped"),
            SessionIntent::Pause => self.pause_requested(),
            SessionIntent::Resume => self.resume_requested(),
            SessionIntent::SetSpeechRate(rate, reply) => {
                let _ = reply.send(self.set_speech_rate(rate));
            }
            SessionIntent::ManualInterrupt => self.manual_interrupt(),
            SessionIntent::DismissTimer => self.dismiss_timer(),
            SessionIntent::Shutdown(reply) => {
                self.teardown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn run_deferred(&mut self, action: Deferred) {
        match action {
            Deferred::BeginSynthesis { utterance } => self.on_begin_synthesis(utterance),
            Deferred::SettleSpeech { utterance } => self.on_speech_settled(utterance),
            Deferred::ResumeListening => self.on_resume_listening(),
            Deferred::RestartRecognition => self.on_restart_recognition(),
        }
    }

    // ── lifecycle ──

    fn screen_focused(&mut self) {
        if self.state.is_voice_mode() {
            debug!(state = %self.state, "screen focused while already active");
            return;
        }
        self.set_state(SessionState::WakeListening);
        match self.listen() {
            Ok(_) => {}
            // Still saying goodbye; the mic opens once speech settles.
            Err(VoiceError::Busy(_)) => debug!("wake-word listening deferred until speech ends"),
            Err(e) => warn!(error = %e, "could not start wake-word listening"),
        }
    }

    fn start_session(&mut self) {
        match self.state {
            SessionState::Idle | SessionState::WakeListening => self.begin_activation(),
            state => debug!(%state, "start_session ignored; session already running"),
        }
    }

    fn pause_requested(&mut self) {
        if self.state == SessionState::Cooking {
            self.engines.haptics.vibrate(HapticPattern::Double);
            self.pause_assistant();
        } else {
            debug!(state = %self.state, "pause ignored outside cooking");
        }
    }

    fn resume_requested(&mut self) {
        self.listen.suspended = false;
        match self.state {
            SessionState::Paused => {
                self.engines.haptics.vibrate(HapticPattern::Double);
                self.resume_assistant();
            }
            // Reopen the mic after a fatal recognition error.
            SessionState::Cooking if !self.listen.listening && self.wants_microphone() => {
                if let Err(e) = self.listen() {
                    warn!(error = %e, "could not resume listening");
                }
            }
            state => debug!(%state, "resume ignored"),
        }
    }

    fn set_speech_rate(&mut self, rate: SpeechRate) -> Result<()> {
        if self.is_speaking() {
            return Err(VoiceError::Busy(
                "cannot change speech rate while speaking".to_owned(),
            ));
        }
        info!(?rate, "speech rate changed");
        self.speech_rate = rate;
        self.publish();
        Ok(())
    }

    fn manual_interrupt(&mut self) {
        info!(state = %self.state, "manual interrupt");
        self.stop_speaking();
        self.echo.clear_cooldown();
        self.listen.suspended = false;
        if !self.wants_microphone() {
            return;
        }
        if let Err(e) = self.listen() {
            warn!(error = %e, "could not listen after interrupt");
        }
    }

    /// Return to idle: stop the mic, the speaker and the timer, and
    /// invalidate every pending callback. Idempotent.
    pub(super) fn enter_idle(&mut self, reason: &str) {
        if self.state.is_voice_mode() {
            info!(reason, from = %self.state, "returning to idle");
        } else {
            debug!(reason, "already idle");
        }
        self.stop_listening();
        self.listen.suspended = false;
        self.stop_speaking();
        self.awaiting_answer = false;
        self.destroy_timer();
        self.navigator.reset();
        self.recognized_text = None;
        self.epoch += 1;
        self.set_state(SessionState::Idle);
        self.publish();
    }

    fn teardown(&mut self) {
        self.enter_idle("teardown");
        if !self.released {
            self.engines.alarm.release();
            self.released = true;
        }
    }

    // ── shared helpers ──

    /// Whether the microphone should be open in the current situation.
    pub(super) fn wants_microphone(&self) -> bool {
        !self.is_speaking()
            && !self.awaiting_answer
            && !self.listen.suspended
            && matches!(
                self.state,
                SessionState::WakeListening | SessionState::Activating(_) | SessionState::Cooking
            )
    }

    pub(super) fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    pub(super) fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        let from = std::mem::replace(&mut self.state, next);
        info!(%from, to = %next, "session state changed");
        self.emit(SessionEvent::StateChanged { from, to: next });
        self.publish();
    }

    pub(super) fn activation_stage(&self) -> Option<ActivationStage> {
        match self.state {
            SessionState::Activating(stage) => Some(stage),
            _ => None,
        }
    }

    pub(super) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(super) fn notify(&self, notice: Notice) {
        warn!(?notice, "{}", notice.message());
        self.emit(SessionEvent::Notice { notice });
    }

    pub(super) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            is_listening: self.listen.listening,
            is_speaking: self.is_speaking(),
            current_step_index: self.navigator.current_index(),
            total_steps: self.navigator.total(),
            recognized_text: self.recognized_text.clone(),
            timer: self.countdown.snapshot(),
            speech_rate: self.speech_rate,
        }
    }

    pub(super) fn publish(&self) {
        let snapshot = self.snapshot();
        debug_assert!(
            !(snapshot.is_listening && snapshot.is_speaking),
            "microphone and speaker active at the same time"
        );
        self.snapshot_tx.send_replace(snapshot);
    }

    /// A sender into this session's inbox, or `None` once it is closing.
    pub(super) fn sender(&self) -> Option<mpsc::UnboundedSender<SessionInput>> {
        self.inbox.upgrade()
    }

    /// Post `action` back to the inbox after `delay`, tagged with the current epoch.
    pub(super) fn defer(&self, delay: Duration, action: Deferred) {
        let Some(tx) = self.sender() else {
            return;
        };
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionInput::Deferred { epoch, action });
        });
    }
}
