//! Carries out voice commands while cooking, plus the AI fallback.

use crate::echo_guard::EchoRecording;
use crate::engines::HapticPattern;
use crate::error::{Result, VoiceError};
use crate::navigator::StepMove;
use crate::recipe::RecipeContext;
use crate::session::activation::COMMAND_PROMPT;
use crate::session::controller::SessionActor;
use crate::session::events::SessionEvent;
use crate::session::messages::{QuestionOrigin, SessionInput};
use crate::session::state::{ActivationStage, SessionState};
use crate::voice_command::{VoiceCommand, parse_command};
use std::sync::Arc;
use tracing::{debug, info, warn};

const NEXT_STEP: &str = "Next step.";
const GOING_BACK: &str = "Going back.";
const RECIPE_COMPLETE: &str = "That was the last step. Your dish is complete, enjoy!";
const AT_FIRST_STEP: &str = "You're already at the first step.";
const ASSISTANT_PAUSED: &str = "Paused. Tap resume when you're ready.";
const ASSISTANT_RESUMED: &str = "Resuming.";
const GOODBYE: &str = "Goodbye, happy cooking!";
pub(super) const APOLOGY: &str = "Sorry, I couldn't answer that right now.";

impl SessionActor {
    pub(super) fn dispatch_transcript(&mut self, text: &str) {
        let command = parse_command(text);
        info!(?command, "voice command");
        self.engines.haptics.vibrate(haptic_for(&command));

        match command {
            VoiceCommand::CancelTimer => self.cancel_timer_command(),
            VoiceCommand::Pause => self.pause_command(),
            VoiceCommand::Resume => self.resume_command(),
            VoiceCommand::NextStep => self.next_step(),
            VoiceCommand::PreviousStep => self.previous_step(),
            VoiceCommand::RepeatStep => self.announce_current_step(),
            VoiceCommand::EndSession => self.end_session(),
            VoiceCommand::SetTimer { seconds } => self.set_timer_command(seconds),
            VoiceCommand::Question(question) => {
                self.ask_assistant(&question, QuestionOrigin::Cooking);
            }
        }
    }

    pub(super) fn announce_current_step(&mut self) {
        if let Some(text) = self.navigator.current_announcement() {
            self.say(text, EchoRecording::Record);
        }
    }

    fn next_step(&mut self) {
        match self.navigator.advance() {
            StepMove::Moved(index) => {
                self.step_changed(index);
                self.say(NEXT_STEP, EchoRecording::Record);
                self.announce_current_step();
            }
            StepMove::AtEnd => self.say(RECIPE_COMPLETE, EchoRecording::Record),
            StepMove::AtStart | StepMove::NotStarted => debug!("next step before cooking started"),
        }
    }

    fn previous_step(&mut self) {
        match self.navigator.retreat() {
            StepMove::Moved(index) => {
                self.step_changed(index);
                self.say(GOING_BACK, EchoRecording::Record);
                self.announce_current_step();
            }
            StepMove::AtStart => self.say(AT_FIRST_STEP, EchoRecording::Record),
            StepMove::AtEnd | StepMove::NotStarted => debug!("previous step before cooking started"),
        }
    }

    fn step_changed(&mut self, index: usize) {
        debug!(index, "step changed");
        self.emit(SessionEvent::StepChanged {
            index,
            total: self.navigator.total(),
        });
        self.publish();
    }

    /// `pause`: the timer first, then the assistant.
    fn pause_command(&mut self) {
        if self.timer_running() {
            self.pause_timer();
        } else if !self.timer_active() {
            self.pause_assistant();
        } else {
            self.say("The timer is already paused.", EchoRecording::Record);
        }
    }

    /// `resume`: the timer first, then the assistant.
    fn resume_command(&mut self) {
        if self.timer_active() && !self.timer_running() {
            self.resume_timer();
        } else if self.state == SessionState::Paused {
            self.resume_assistant();
        } else {
            self.say("There's nothing to resume.", EchoRecording::Record);
        }
    }

    pub(super) fn pause_assistant(&mut self) {
        if self.state != SessionState::Cooking {
            return;
        }
        self.stop_listening();
        self.stop_speaking();
        self.set_state(SessionState::Paused);
        self.say(ASSISTANT_PAUSED, EchoRecording::Record);
    }

    pub(super) fn resume_assistant(&mut self) {
        if self.state != SessionState::Paused {
            return;
        }
        self.set_state(SessionState::Cooking);
        self.say(ASSISTANT_RESUMED, EchoRecording::Record);
    }

    /// `stop`/`exit`: leave cooking and say goodbye without listening again.
    fn end_session(&mut self) {
        self.enter_idle("stop command");
        self.say(GOODBYE, EchoRecording::Record);
    }

    /// Send a free-form question to the AI fallback. The microphone stays
    /// closed until the answer has been spoken.
    pub(super) fn ask_assistant(&mut self, question: &str, origin: QuestionOrigin) {
        if self.awaiting_answer {
            debug!(question, "already waiting for an answer");
            return;
        }
        let Some(tx) = self.sender() else {
            return;
        };
        self.stop_listening();
        self.awaiting_answer = true;

        let context = match (origin, self.navigator.current_index()) {
            (QuestionOrigin::Cooking, Some(index)) => RecipeContext::at_step(&self.recipe, index),
            _ => RecipeContext::without_step(&self.recipe),
        };
        let assistant = Arc::clone(&self.engines.assistant);
        let timeout = self.config.timing.assistant_timeout();
        let question = question.to_owned();
        let epoch = self.epoch;
        info!(%question, ?origin, "asking assistant");

        tokio::spawn(async move {
            let answer = match tokio::time::timeout(timeout, assistant.answer(&question, &context)).await {
                Ok(answer) => answer,
                Err(_) => Err(VoiceError::Assistant(format!(
                    "no answer within {}s",
                    timeout.as_secs()
                ))),
            };
            let _ = tx.send(SessionInput::AssistantReply {
                epoch,
                origin,
                answer,
            });
        });
    }

    pub(super) fn on_assistant_reply(&mut self, epoch: u64, origin: QuestionOrigin, answer: Result<String>) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "dropping answer for an earlier session");
            return;
        }
        self.awaiting_answer = false;
        let text = match answer {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("assistant returned an empty answer");
                APOLOGY.to_owned()
            }
            Err(e) => {
                warn!(error = %e, "assistant failed");
                APOLOGY.to_owned()
            }
        };
        self.say(text, EchoRecording::Record);

        if origin == QuestionOrigin::Activation
            && self.activation_stage() == Some(ActivationStage::Command)
        {
            self.say_after(
                self.config.timing.prompt_pause(),
                COMMAND_PROMPT,
                EchoRecording::LengthOnly,
            );
        }
    }
}

fn haptic_for(command: &VoiceCommand) -> HapticPattern {
    match command {
        VoiceCommand::Pause | VoiceCommand::Resume => HapticPattern::Double,
        VoiceCommand::EndSession => HapticPattern::Triple,
        _ => HapticPattern::Single,
    }
}
