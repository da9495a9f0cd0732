//! Speak gateway: serializes utterances and hands the microphone back.
//!
//! Every wait is an explicit [`SpeechPhase`]:
//!
//! ```text
//! Silent ──say──▶ Grace ──delay──▶ Speaking ──done──▶ Settling ──delay──▶ Silent
//!                   ▲                  │
//!                   └──── queued ──────┘
//! ```
//!
//! The speaking flag is raised before the grace period starts and lowered
//! only when settling completes, so the echo guard rejects anything heard
//! in between.

use crate::echo_guard::EchoRecording;
use crate::engines::{SpeakOptions, SpeechReporter};
use crate::session::controller::SessionActor;
use crate::session::events::SessionEvent;
use crate::session::messages::{Deferred, SynthesisEvent};
use crate::session::state::SessionState;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(super) struct Utterance {
    id: u64,
    text: String,
    recording: EchoRecording,
    /// Silence before this utterance starts.
    lead_in: Duration,
}

#[derive(Debug, Default)]
pub(super) enum SpeechPhase {
    #[default]
    Silent,
    /// Waiting for the mic release grace or a lead-in pause.
    Grace(Utterance),
    /// Handed to the synthesizer; waiting for its callback.
    Speaking(Utterance),
    /// Finished; waiting for the settle buffer before clearing the flag.
    Settling { utterance: u64 },
}

#[derive(Debug, Default)]
pub(super) struct SpeakGateway {
    phase: SpeechPhase,
    queue: VecDeque<Utterance>,
    next_id: u64,
}

impl SpeakGateway {
    /// An utterance is pending or playing.
    fn is_busy(&self) -> bool {
        matches!(self.phase, SpeechPhase::Grace(_) | SpeechPhase::Speaking(_))
    }
}

impl SessionActor {
    /// Speak `text` once the speaker is free.
    pub(super) fn say(&mut self, text: impl Into<String>, recording: EchoRecording) {
        self.say_after(Duration::ZERO, text, recording);
    }

    /// Speak `text` after a pause of `lead_in`.
    pub(super) fn say_after(
        &mut self,
        lead_in: Duration,
        text: impl Into<String>,
        recording: EchoRecording,
    ) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.speech.next_id += 1;
        let utterance = Utterance {
            id: self.speech.next_id,
            text,
            recording,
            lead_in,
        };
        if self.speech.is_busy() {
            debug!(utterance = utterance.id, "queued behind current speech");
            self.speech.queue.push_back(utterance);
        } else {
            self.begin_utterance(utterance);
        }
    }

    fn begin_utterance(&mut self, utterance: Utterance) {
        let released_mic = self.stop_listening();
        self.set_speaking(true);

        let mut wait = utterance.lead_in;
        if released_mic {
            wait += self.config.timing.mic_release_grace();
        }
        if wait.is_zero() {
            self.synthesize(utterance);
        } else {
            let id = utterance.id;
            self.speech.phase = SpeechPhase::Grace(utterance);
            self.defer(wait, Deferred::BeginSynthesis { utterance: id });
        }
    }

    pub(super) fn on_begin_synthesis(&mut self, id: u64) {
        match std::mem::take(&mut self.speech.phase) {
            SpeechPhase::Grace(utterance) if utterance.id == id => self.synthesize(utterance),
            other => {
                debug!(utterance = id, "grace elapsed for a cancelled utterance");
                self.speech.phase = other;
            }
        }
    }

    fn synthesize(&mut self, utterance: Utterance) {
        let Some(tx) = self.sender() else {
            return;
        };
        self.echo
            .record_utterance(&utterance.text, utterance.recording);
        info!(utterance = utterance.id, text = %utterance.text, "speaking");
        self.emit(SessionEvent::Spoke {
            text: utterance.text.clone(),
        });
        let options = SpeakOptions {
            rate: self.speech_rate.multiplier(),
        };
        let reporter = SpeechReporter::new(utterance.id, tx);
        self.engines
            .synthesizer
            .speak(&utterance.text, options, reporter);
        self.speech.phase = SpeechPhase::Speaking(utterance);
    }

    pub(super) fn on_synthesis(&mut self, id: u64, event: SynthesisEvent) {
        let current = matches!(&self.speech.phase, SpeechPhase::Speaking(u) if u.id == id);
        match event {
            SynthesisEvent::Started => debug!(utterance = id, "synthesis started"),
            SynthesisEvent::Done if current => self.finish_utterance(),
            SynthesisEvent::Failed(message) => {
                warn!(utterance = id, error = %message, "synthesis failed; treating as complete");
                if current {
                    self.finish_utterance();
                }
            }
            SynthesisEvent::Done => debug!(utterance = id, "ignoring completion of superseded utterance"),
        }
    }

    fn finish_utterance(&mut self) {
        let SpeechPhase::Speaking(done) = std::mem::take(&mut self.speech.phase) else {
            return;
        };
        self.echo
            .record_speech_end(done.text.chars().count(), Instant::now());

        if let Some(next) = self.speech.queue.pop_front() {
            self.begin_utterance(next);
            return;
        }
        self.speech.phase = SpeechPhase::Settling { utterance: done.id };
        self.defer(
            self.config.timing.speech_settle(),
            Deferred::SettleSpeech { utterance: done.id },
        );
    }

    pub(super) fn on_speech_settled(&mut self, id: u64) {
        if !matches!(self.speech.phase, SpeechPhase::Settling { utterance } if utterance == id) {
            return;
        }
        self.speech.phase = SpeechPhase::Silent;
        self.set_speaking(false);
        if self.listens_after_speech() {
            self.defer(
                self.config.timing.listen_resume_delay(),
                Deferred::ResumeListening,
            );
        }
    }

    /// Speech in these states hands the microphone back when it ends.
    /// `WakeListening` covers a screen refocused during the goodbye line.
    fn listens_after_speech(&self) -> bool {
        matches!(
            self.state,
            SessionState::WakeListening | SessionState::Cooking | SessionState::Activating(_)
        )
    }

    pub(super) fn on_resume_listening(&mut self) {
        if !self.listens_after_speech() || !self.wants_microphone() {
            debug!(state = %self.state, "not resuming listening");
            return;
        }
        if let Err(e) = self.listen() {
            debug!(error = %e, "resume listening skipped");
        }
    }

    /// Silence the synthesizer and drop queued utterances. Returns whether
    /// anything was pending.
    pub(super) fn stop_speaking(&mut self) -> bool {
        let phase = std::mem::take(&mut self.speech.phase);
        let pending = !matches!(phase, SpeechPhase::Silent) || !self.speech.queue.is_empty();
        if matches!(phase, SpeechPhase::Speaking(_)) {
            self.engines.synthesizer.stop();
        }
        self.speech.queue.clear();
        if self.is_speaking() {
            self.set_speaking(false);
        }
        pending
    }

    /// Update the immediate flag first, then the snapshot.
    fn set_speaking(&mut self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
        self.publish();
    }
}
