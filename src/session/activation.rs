//! Activation handshake: wake word, "ready", then "first step" or a question.

use crate::echo_guard::EchoRecording;
use crate::engines::HapticPattern;
use crate::session::controller::SessionActor;
use crate::session::events::SessionEvent;
use crate::session::messages::QuestionOrigin;
use crate::session::state::{ActivationStage, SessionState};
use crate::voice_command::{find_wake_word, is_first_step_reply, is_ready_reply};
use tracing::{debug, info};

pub(super) const READY_PROMPT: &str = "Say ready to start.";
pub(super) const ACKNOWLEDGEMENT: &str = "Okay";
pub(super) const COMMAND_PROMPT: &str = "Say first step or ask me anything.";
pub(super) const EMPTY_RECIPE: &str = "This recipe doesn't have any steps for me to read.";

impl SessionActor {
    pub(super) fn on_wake_transcript(&mut self, text: &str) {
        match find_wake_word(text, &self.config.activation.wake_words) {
            Some(word) => {
                info!(wake_word = word, "wake word heard");
                self.begin_activation();
            }
            None => debug!(transcript = %text, "no wake word"),
        }
    }

    /// Enter `Activating(Ready)` and prompt for "ready".
    pub(super) fn begin_activation(&mut self) {
        self.stop_listening();
        self.set_state(SessionState::Activating(ActivationStage::Ready));
        // The reply repeats the prompt's keyword, so only its length is kept.
        self.say(READY_PROMPT, EchoRecording::LengthOnly);
    }

    pub(super) fn on_activation_transcript(&mut self, stage: ActivationStage, text: &str) {
        match stage {
            ActivationStage::Ready if is_ready_reply(text) => {
                self.engines.haptics.vibrate(HapticPattern::Single);
                self.set_state(SessionState::Activating(ActivationStage::Command));
                self.prompt_for_command();
            }
            ActivationStage::Ready => debug!(transcript = %text, "waiting for ready"),
            ActivationStage::Command if is_first_step_reply(text) => {
                self.engines.haptics.vibrate(HapticPattern::Single);
                self.begin_cooking();
            }
            ActivationStage::Command => self.ask_assistant(text, QuestionOrigin::Activation),
        }
    }

    /// "Okay", a short pause, then the command prompt.
    pub(super) fn prompt_for_command(&mut self) {
        self.say(ACKNOWLEDGEMENT, EchoRecording::Record);
        self.say_after(
            self.config.timing.prompt_pause(),
            COMMAND_PROMPT,
            EchoRecording::LengthOnly,
        );
    }

    fn begin_cooking(&mut self) {
        let Some(index) = self.navigator.begin() else {
            info!("recipe has no steps; staying in activation");
            self.say(EMPTY_RECIPE, EchoRecording::Record);
            return;
        };
        self.set_state(SessionState::Cooking);
        self.emit(SessionEvent::StepChanged {
            index,
            total: self.navigator.total(),
        });
        self.publish();
        self.announce_current_step();
    }
}
