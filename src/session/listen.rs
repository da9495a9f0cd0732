//! Listen gateway: microphone permission, recognition runs and restarts.

use crate::engines::{PermissionStatus, RecognitionOptions, RecognitionSink};
use crate::error::{Result, VoiceError};
use crate::session::controller::SessionActor;
use crate::session::events::{Notice, SessionEvent};
use crate::session::messages::{Deferred, RecognitionEvent, SessionInput};
use crate::session::state::SessionState;
use crate::voice_command::contextual_hints;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Permission {
    #[default]
    Unknown,
    Pending,
    Granted,
}

#[derive(Debug, Default)]
pub(super) struct ListenGateway {
    pub(super) listening: bool,
    /// Id of the latest recognition run; events tagged otherwise are stale.
    run: u64,
    permission: Permission,
    /// Set by a fatal recognition error. Only an explicit resume or
    /// interrupt opens the microphone again.
    pub(super) suspended: bool,
}

/// Outcome of a listen request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenStart {
    Started,
    AlreadyListening,
    /// Waiting on the permission prompt; listening starts when it is granted.
    AwaitingPermission,
}

/// Whether recognition restarts by itself after a benign end or error.
///
/// Only wake-word listening and unmuted cooking restart here. Activation
/// reopens the microphone itself.
pub(super) fn restart_allowed(state: SessionState, speaking: bool) -> bool {
    match state {
        SessionState::WakeListening => true,
        SessionState::Cooking => !speaking,
        _ => false,
    }
}

impl SessionActor {
    /// Open the microphone.
    ///
    /// # Errors
    ///
    /// [`VoiceError::Busy`] while speaking, or the recognizer's own error
    /// when it refuses to start.
    pub(super) fn listen(&mut self) -> Result<ListenStart> {
        if self.is_speaking() {
            return Err(VoiceError::Busy("speaker is active".to_owned()));
        }
        if self.listen.listening {
            return Ok(ListenStart::AlreadyListening);
        }
        match self.listen.permission {
            Permission::Granted => {}
            Permission::Pending => return Ok(ListenStart::AwaitingPermission),
            Permission::Unknown => {
                self.request_permission();
                return Ok(ListenStart::AwaitingPermission);
            }
        }
        let Some(tx) = self.sender() else {
            return Err(VoiceError::Channel("voice session is closing".to_owned()));
        };

        self.listen.run += 1;
        let run = self.listen.run;
        let options = self.recognition_options();
        if let Err(e) = self
            .engines
            .recognizer
            .start(&options, RecognitionSink::new(run, tx))
        {
            warn!(run, error = %e, "recognizer failed to start");
            self.notify(Notice::RecognitionUnavailable {
                message: e.to_string(),
            });
            if matches!(
                self.state,
                SessionState::WakeListening | SessionState::Activating(_)
            ) {
                self.enter_idle("recognizer unavailable");
            }
            return Err(e);
        }

        debug!(run, state = %self.state, "listening");
        self.listen.listening = true;
        self.publish();
        Ok(ListenStart::Started)
    }

    /// Close the microphone. Returns whether it was open.
    pub(super) fn stop_listening(&mut self) -> bool {
        if !self.listen.listening {
            return false;
        }
        debug!(run = self.listen.run, "stop listening");
        self.engines.recognizer.stop();
        self.listen.listening = false;
        self.publish();
        true
    }

    fn request_permission(&mut self) {
        let Some(tx) = self.sender() else {
            return;
        };
        self.listen.permission = Permission::Pending;
        let recognizer = Arc::clone(&self.engines.recognizer);
        info!("requesting microphone permission");
        tokio::spawn(async move {
            let status = recognizer.request_permission().await;
            let _ = tx.send(SessionInput::Permission { status });
        });
    }

    pub(super) fn on_permission(&mut self, status: PermissionStatus) {
        match status {
            PermissionStatus::Granted => {
                info!("microphone permission granted");
                self.listen.permission = Permission::Granted;
                if !self.wants_microphone() {
                    return;
                }
                if let Err(e) = self.listen() {
                    warn!(error = %e, "could not start listening after permission grant");
                }
            }
            PermissionStatus::Denied => {
                // Ask again on the next attempt.
                self.listen.permission = Permission::Unknown;
                warn!(error = %VoiceError::PermissionDenied, "cannot listen");
                self.notify(Notice::PermissionDenied);
                self.enter_idle("microphone permission denied");
            }
        }
    }

    pub(super) fn on_recognition(&mut self, run: u64, event: RecognitionEvent) {
        if run != self.listen.run || !self.listen.listening {
            debug!(run, current = self.listen.run, ?event, "ignoring event from stopped recognition");
            return;
        }
        match event {
            RecognitionEvent::Result(text) => self.on_transcript(text),
            RecognitionEvent::End => {
                debug!(run, "recognition ended");
                self.listen.listening = false;
                self.publish();
                self.defer(
                    self.config.timing.recognition_restart_delay(),
                    Deferred::RestartRecognition,
                );
            }
            RecognitionEvent::Error(code) if code.is_fatal() => {
                warn!(run, %code, "fatal recognition error");
                self.listen.listening = false;
                self.publish();
                self.notify(Notice::recognition_failed(&code));
                if matches!(
                    self.state,
                    SessionState::WakeListening | SessionState::Activating(_)
                ) {
                    self.enter_idle("fatal recognition error");
                } else {
                    self.listen.suspended = true;
                }
            }
            RecognitionEvent::Error(code) => {
                debug!(run, %code, "transient recognition error");
                self.listen.listening = false;
                self.publish();
                self.defer(
                    self.config.timing.recognition_restart_delay(),
                    Deferred::RestartRecognition,
                );
            }
        }
    }

    pub(super) fn on_restart_recognition(&mut self) {
        let speaking = self.is_speaking();
        let allowed = restart_allowed(self.state, speaking)
            || (self.state.is_activating() && !speaking);
        if !allowed || self.awaiting_answer || self.listen.suspended {
            debug!(state = %self.state, speaking, "recognition restart not wanted");
            return;
        }
        if let Err(e) = self.listen() {
            debug!(error = %e, "recognition restart skipped");
        }
    }

    /// Route an accepted transcript by state.
    fn on_transcript(&mut self, text: String) {
        let verdict = self
            .echo
            .check(&text, self.is_speaking(), Instant::now());
        self.emit(SessionEvent::Heard {
            text: text.clone(),
            accepted: verdict.is_accept(),
        });
        if !verdict.is_accept() {
            debug!(transcript = %text, ?verdict, "transcript rejected");
            return;
        }
        info!(transcript = %text, state = %self.state, "heard");

        match self.state {
            SessionState::Idle => {}
            SessionState::WakeListening => self.on_wake_transcript(&text),
            SessionState::Activating(stage) => {
                self.recognized_text = Some(text.clone());
                self.publish();
                self.on_activation_transcript(stage, &text);
            }
            SessionState::Cooking | SessionState::Paused => {
                self.recognized_text = Some(text.clone());
                self.publish();
                self.dispatch_transcript(&text);
            }
        }
    }

    fn recognition_options(&self) -> RecognitionOptions {
        let mut hints = contextual_hints(&self.config.activation.wake_words);
        hints.extend(self.config.speech.contextual_hints.iter().cloned());
        RecognitionOptions {
            language: self.config.speech.language.clone(),
            continuous: true,
            contextual_hints: hints,
        }
    }
}
