//! The voice session: one actor coordinating the microphone, the speaker,
//! the recipe steps and the countdown timer.

mod activation;
mod controller;
mod countdown;
mod dispatch;
pub mod events;
mod listen;
pub(crate) mod messages;
mod speak;
pub mod state;

pub use controller::{Collaborators, VoiceSession, VoiceSessionHandle};
pub use events::{Notice, SessionEvent};
pub use messages::{RecognitionEvent, SynthesisEvent};
pub use state::{ActivationStage, SessionSnapshot, SessionState};
