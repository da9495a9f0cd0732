//! In-memory engines and a session harness shared by the integration tests.
//!
//! The fakes complete instantly and record every call. Time is driven by
//! tokio's paused clock, so tests sleep through grace periods, echo
//! cooldowns and timers without waiting in real time.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chefie::assistant::AssistantService;
use chefie::config::VoiceConfig;
use chefie::engines::{
    AlarmPlayer, HapticPattern, Haptics, PermissionStatus, RecognitionErrorCode,
    RecognitionOptions, RecognitionSink, SpeakOptions, SpeechRecognizer, SpeechReporter,
    SpeechSynthesizer,
};
use chefie::recipe::{Recipe, RecipeContext, Step};
use chefie::session::{Collaborators, SessionEvent, VoiceSession, VoiceSessionHandle};
use chefie::{Result, VoiceError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Longer than the largest echo cooldown plus the listen-resume delay.
pub const QUIET: Duration = Duration::from_secs(12);

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

pub struct FakeRecognizer {
    permission: PermissionStatus,
    refuse_start: AtomicBool,
    mic_open: Arc<AtomicBool>,
    sink: Mutex<Option<RecognitionSink>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub permission_requests: AtomicUsize,
    pub last_options: Mutex<Option<RecognitionOptions>>,
}

impl FakeRecognizer {
    fn new(permission: PermissionStatus, mic_open: Arc<AtomicBool>) -> Self {
        Self {
            permission,
            refuse_start: AtomicBool::new(false),
            mic_open,
            sink: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            permission_requests: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    pub fn refuse_start(&self, refuse: bool) {
        self.refuse_start.store(refuse, Ordering::SeqCst);
    }

    fn current_sink(&self) -> RecognitionSink {
        self.sink
            .lock()
            .unwrap()
            .clone()
            .expect("recognizer was never started")
    }

    /// Deliver a final transcript on the current run.
    pub fn hear(&self, transcript: &str) {
        self.current_sink().result(transcript);
    }

    /// The platform stopped recognizing on its own.
    pub fn end(&self) {
        self.mic_open.store(false, Ordering::SeqCst);
        self.current_sink().end();
    }

    pub fn fail(&self, code: RecognitionErrorCode) {
        self.mic_open.store(false, Ordering::SeqCst);
        self.current_sink().error(code);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.permission
    }

    fn start(&self, options: &RecognitionOptions, sink: RecognitionSink) -> Result<()> {
        if self.refuse_start.load(Ordering::SeqCst) {
            return Err(VoiceError::Recognition("no recognition service".to_owned()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.mic_open.store(true, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.mic_open.store(false, Ordering::SeqCst);
    }
}

pub struct FakeSynthesizer {
    auto_complete: bool,
    mic_open: Arc<AtomicBool>,
    pending: Mutex<Vec<SpeechReporter>>,
    pub spoken: Mutex<Vec<String>>,
    pub rates: Mutex<Vec<f32>>,
    pub stops: AtomicUsize,
    /// `speak` calls made while the recognizer was running.
    pub overlaps: AtomicUsize,
}

impl FakeSynthesizer {
    fn new(auto_complete: bool, mic_open: Arc<AtomicBool>) -> Self {
        Self {
            auto_complete,
            mic_open,
            pending: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
            rates: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn said(&self, text: &str) -> bool {
        self.spoken.lock().unwrap().iter().any(|s| s == text)
    }

    pub fn last(&self) -> Option<String> {
        self.spoken.lock().unwrap().last().cloned()
    }

    /// Complete every utterance handed over so far.
    pub fn finish_all(&self) {
        for reporter in self.pending.lock().unwrap().drain(..) {
            reporter.done();
        }
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn speak(&self, text: &str, options: SpeakOptions, reporter: SpeechReporter) {
        if self.mic_open.load(Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.spoken.lock().unwrap().push(text.to_owned());
        self.rates.lock().unwrap().push(options.rate);
        if self.auto_complete {
            reporter.started();
            reporter.done();
        } else {
            self.pending.lock().unwrap().push(reporter);
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap().clear();
    }
}

#[derive(Default)]
pub struct FakeAlarm {
    pub plays: AtomicUsize,
    pub stops: AtomicUsize,
    pub releases: AtomicUsize,
}

impl AlarmPlayer for FakeAlarm {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeHaptics {
    pub patterns: Mutex<Vec<HapticPattern>>,
}

impl FakeHaptics {
    pub fn patterns(&self) -> Vec<HapticPattern> {
        self.patterns.lock().unwrap().clone()
    }
}

impl Haptics for FakeHaptics {
    fn vibrate(&self, pattern: HapticPattern) {
        self.patterns.lock().unwrap().push(pattern);
    }
}

/// Answers every question with a fixed reply, or fails when none is set.
pub struct ScriptedAssistant {
    reply: Option<String>,
    pub questions: Mutex<Vec<(String, RecipeContext)>>,
}

impl ScriptedAssistant {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_owned()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            questions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AssistantService for ScriptedAssistant {
    async fn answer(&self, question: &str, context: &RecipeContext) -> Result<String> {
        self.questions
            .lock()
            .unwrap()
            .push((question.to_owned(), context.clone()));
        self.reply
            .clone()
            .ok_or_else(|| VoiceError::Assistant("upstream returned 503".to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn pancakes() -> Recipe {
    Recipe {
        title: "Pancakes".to_owned(),
        steps: vec![
            Step::new(Some("Mix"), "Whisk flour, milk and eggs."),
            Step::new(None, "Rest the batter for ten minutes."),
            Step::new(Some("Cook"), "Fry in a hot buttered pan."),
        ],
        ingredients: vec!["flour".to_owned(), "milk".to_owned(), "eggs".to_owned()],
        difficulty: Some("easy".to_owned()),
    }
}

pub struct KitchenBuilder {
    recipe: Recipe,
    config: VoiceConfig,
    permission: PermissionStatus,
    auto_complete: bool,
    assistant: ScriptedAssistant,
    service: Option<Arc<dyn AssistantService>>,
}

impl KitchenBuilder {
    pub fn config(mut self, config: VoiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Answer questions with a real service instead of the scripted one.
    pub fn service(mut self, service: Arc<dyn AssistantService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }

    /// Leave utterances pending until [`FakeSynthesizer::finish_all`].
    pub fn manual_speech(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    pub fn assistant(mut self, assistant: ScriptedAssistant) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn recipe(mut self, recipe: Recipe) -> Self {
        self.recipe = recipe;
        self
    }

    pub fn spawn(self) -> Kitchen {
        let mic_open = Arc::new(AtomicBool::new(false));
        let recognizer = Arc::new(FakeRecognizer::new(self.permission, Arc::clone(&mic_open)));
        let synth = Arc::new(FakeSynthesizer::new(self.auto_complete, mic_open));
        let alarm = Arc::new(FakeAlarm::default());
        let haptics = Arc::new(FakeHaptics::default());
        let assistant = Arc::new(self.assistant);
        let service: Arc<dyn AssistantService> = match self.service {
            Some(service) => service,
            None => assistant.clone(),
        };

        let engines = Collaborators {
            recognizer: recognizer.clone(),
            synthesizer: synth.clone(),
            assistant: service,
            alarm: alarm.clone(),
            haptics: haptics.clone(),
        };
        let (handle, task) = VoiceSession::spawn(self.config, self.recipe, engines);
        let events = handle.subscribe();
        Kitchen {
            handle,
            task,
            events,
            recognizer,
            synth,
            alarm,
            haptics,
            assistant,
        }
    }
}

pub struct Kitchen {
    pub handle: VoiceSessionHandle,
    pub task: JoinHandle<()>,
    pub events: broadcast::Receiver<SessionEvent>,
    pub recognizer: Arc<FakeRecognizer>,
    pub synth: Arc<FakeSynthesizer>,
    pub alarm: Arc<FakeAlarm>,
    pub haptics: Arc<FakeHaptics>,
    pub assistant: Arc<ScriptedAssistant>,
}

impl Kitchen {
    pub fn builder() -> KitchenBuilder {
        KitchenBuilder {
            recipe: pancakes(),
            config: VoiceConfig::default(),
            permission: PermissionStatus::Granted,
            auto_complete: true,
            assistant: ScriptedAssistant::answering("Use medium heat."),
            service: None,
        }
    }

    pub fn open() -> Kitchen {
        Self::builder().spawn()
    }

    /// Let pending handoffs, cooldowns and restarts play out.
    pub async fn settle(&self) {
        tokio::time::sleep(QUIET).await;
    }

    /// Wait for the microphone, say `text`, and let the reaction finish.
    pub async fn say(&self, text: &str) {
        self.settle().await;
        assert!(
            self.handle.snapshot().is_listening,
            "microphone closed before saying {text:?}: {:?}",
            self.handle.snapshot()
        );
        self.recognizer.hear(text);
        self.settle().await;
    }

    /// Focus the screen, wake the assistant and walk the handshake to step one.
    pub async fn start_cooking(&self) {
        self.handle.screen_focused().unwrap();
        self.say("hey chef").await;
        self.say("ready").await;
        self.say("first step").await;
    }

    /// Poll in real time until `check` holds. For tests that talk to a
    /// real socket and so cannot use the paused clock.
    pub async fn eventually(&self, what: &str, check: impl Fn(&Kitchen) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !check(self) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}: {:?}",
                self.handle.snapshot()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Every event received so far.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }

    /// Shut down and make sure the actor exited cleanly.
    pub async fn close(self) {
        self.handle.shutdown().await.unwrap();
        self.task.await.expect("session task panicked");
        assert_eq!(
            self.synth.overlaps.load(Ordering::SeqCst),
            0,
            "speech started while the microphone was open"
        );
    }
}
