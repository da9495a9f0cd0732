//! End-to-end voice session flows against in-memory engines.
//!
//! Every test runs on tokio's paused clock: sleeping advances virtual time
//! through grace periods, echo cooldowns and countdowns instantly.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chefie::VoiceError;
use chefie::config::SpeechRate;
use chefie::engines::{HapticPattern, PermissionStatus, RecognitionErrorCode};
use chefie::recipe::Recipe;
use chefie::session::{ActivationStage, Notice, SessionEvent, SessionState};
use common::{Kitchen, ScriptedAssistant};
use std::sync::atomic::Ordering;
use std::time::Duration;

const READY_PROMPT: &str = "Say ready to start.";
const COMMAND_PROMPT: &str = "Say first step or ask me anything.";
const STEP_ONE: &str = "Step 1 of 3. Mix. Whisk flour, milk and eggs.";
const STEP_TWO: &str = "Step 2 of 3. Rest the batter for ten minutes.";
const STEP_THREE: &str = "Step 3 of 3. Cook. Fry in a hot buttered pan.";

/// Complete every utterance, including queued ones, then let the mic reopen.
async fn finish_speech(kitchen: &Kitchen) {
    kitchen.settle().await;
    while kitchen.handle.is_speaking_now() {
        kitchen.synth.finish_all();
        kitchen.settle().await;
    }
}

fn has_notice(events: &[SessionEvent], wanted: &Notice) -> bool {
    events
        .iter()
        .any(|e| matches!(e, SessionEvent::Notice { notice } if notice == wanted))
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn wake_word_handshake_reaches_first_step() {
    let mut kitchen = Kitchen::open();
    kitchen.start_cooking().await;

    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Cooking);
    assert_eq!(snapshot.current_step_index, Some(0));
    assert_eq!(snapshot.total_steps, 3);
    assert_eq!(snapshot.recognized_text.as_deref(), Some("first step"));
    assert!(snapshot.is_listening, "mic reopens after the step is read");
    assert!(!snapshot.is_speaking);

    assert_eq!(
        kitchen.synth.spoken(),
        vec![READY_PROMPT, "Okay", COMMAND_PROMPT, STEP_ONE]
    );
    assert_eq!(
        kitchen.haptics.patterns(),
        vec![HapticPattern::Single, HapticPattern::Single]
    );

    let states: Vec<SessionState> = kitchen
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            SessionState::WakeListening,
            SessionState::Activating(ActivationStage::Ready),
            SessionState::Activating(ActivationStage::Command),
            SessionState::Cooking,
        ]
    );
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn ready_stage_ignores_anything_but_ready() {
    let kitchen = Kitchen::open();
    kitchen.handle.screen_focused().unwrap();
    kitchen.say("hello chef").await;
    kitchen.say("what's for dinner").await;

    assert_eq!(
        kitchen.handle.snapshot().state,
        SessionState::Activating(ActivationStage::Ready)
    );
    assert!(kitchen.assistant.questions.lock().unwrap().is_empty());
    assert!(kitchen.handle.snapshot().is_listening);

    kitchen.say("I'm ready").await;
    assert_eq!(
        kitchen.handle.snapshot().state,
        SessionState::Activating(ActivationStage::Command)
    );
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn question_during_activation_is_answered_then_reprompted() {
    let kitchen = Kitchen::open();
    kitchen.handle.screen_focused().unwrap();
    kitchen.say("hey chef").await;
    kitchen.say("ready").await;
    kitchen.say("how hot should the pan be").await;

    let questions = kitchen.assistant.questions.lock().unwrap().clone();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].0, "how hot should the pan be");
    assert_eq!(questions[0].1.recipe_name, "Pancakes");
    assert_eq!(questions[0].1.current_step_number, None);

    let spoken = kitchen.synth.spoken();
    assert_eq!(&spoken[spoken.len() - 2..], ["Use medium heat.", COMMAND_PROMPT]);
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Activating(ActivationStage::Command));
    assert!(snapshot.is_listening, "mic reopens once the answer is spoken");

    kitchen.say("first step").await;
    assert_eq!(kitchen.handle.snapshot().state, SessionState::Cooking);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn start_session_skips_the_wake_word() {
    let kitchen = Kitchen::open();
    kitchen.handle.start_session().unwrap();
    kitchen.settle().await;

    assert_eq!(kitchen.synth.spoken(), vec![READY_PROMPT]);
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Activating(ActivationStage::Ready));
    assert!(snapshot.is_listening);

    kitchen.say("ready").await;
    assert_eq!(
        kitchen.handle.snapshot().state,
        SessionState::Activating(ActivationStage::Command)
    );
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn empty_recipe_stays_in_command_stage() {
    let kitchen = Kitchen::builder()
        .recipe(Recipe {
            title: "Toast".to_owned(),
            ..Recipe::default()
        })
        .spawn();
    kitchen.handle.start_session().unwrap();
    kitchen.say("ready").await;
    kitchen.say("first step").await;

    assert_eq!(
        kitchen.handle.snapshot().state,
        SessionState::Activating(ActivationStage::Command)
    );
    assert_eq!(
        kitchen.synth.last().as_deref(),
        Some("This recipe doesn't have any steps for me to read.")
    );
    kitchen.close().await;
}

// ---------------------------------------------------------------------------
// Cooking commands
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn step_navigation_stops_at_both_ends() {
    let mut kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    kitchen.drain_events();

    kitchen.say("go back").await;
    assert_eq!(kitchen.handle.snapshot().current_step_index, Some(0));
    assert_eq!(
        kitchen.synth.last().as_deref(),
        Some("You're already at the first step.")
    );

    kitchen.say("next please").await;
    assert_eq!(kitchen.handle.snapshot().current_step_index, Some(1));
    let spoken = kitchen.synth.spoken();
    assert_eq!(&spoken[spoken.len() - 2..], ["Next step.", STEP_TWO]);

    kitchen.say("continue").await;
    assert_eq!(kitchen.handle.snapshot().current_step_index, Some(2));
    assert_eq!(kitchen.synth.last().as_deref(), Some(STEP_THREE));

    kitchen.say("next one").await;
    assert_eq!(kitchen.handle.snapshot().current_step_index, Some(2));
    assert_eq!(
        kitchen.synth.last().as_deref(),
        Some("That was the last step. Your dish is complete, enjoy!")
    );

    kitchen.say("repeat that").await;
    assert_eq!(kitchen.synth.last().as_deref(), Some(STEP_THREE));

    let steps: Vec<usize> = kitchen
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::StepChanged { index, total } => {
                assert_eq!(total, 3);
                Some(index)
            }
            _ => None,
        })
        .collect();
    assert_eq!(steps, vec![1, 2]);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn echo_of_own_speech_is_ignored() {
    let mut kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    kitchen.drain_events();
    let spoken_before = kitchen.synth.spoken().len();

    // The tail of the step announcement leaks into the microphone.
    kitchen.recognizer.hear("step 1 of 3. mix. whisk flour");
    kitchen.settle().await;
    assert_eq!(kitchen.synth.spoken().len(), spoken_before);
    assert!(kitchen.drain_events().iter().any(|e| matches!(
        e,
        SessionEvent::Heard { accepted: false, .. }
    )));

    kitchen.recognizer.hear("next please");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(kitchen.handle.snapshot().is_listening);
    assert_eq!(kitchen.synth.last().as_deref(), Some(STEP_TWO));
    let spoken_before = kitchen.synth.spoken().len();
    kitchen.drain_events();

    // Inside the cooldown right after speech, even a real command is dropped.
    kitchen.recognizer.hear("repeat");
    kitchen.settle().await;
    assert_eq!(kitchen.synth.spoken().len(), spoken_before);
    assert!(kitchen.drain_events().iter().any(|e| matches!(
        e,
        SessionEvent::Heard { accepted: false, .. }
    )));
    assert_eq!(kitchen.handle.snapshot().current_step_index, Some(1));
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn timer_words_take_precedence_over_pause_and_stop() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;

    kitchen.say("wait 5 minutes").await;
    assert_eq!(kitchen.synth.last().as_deref(), Some("Timer set for 5 minutes."));
    let timer = kitchen.handle.snapshot().timer.unwrap();
    assert!(timer.active && !timer.paused);
    assert!(timer.remaining_seconds < 300);

    kitchen.say("please pause the timer").await;
    assert_eq!(kitchen.synth.last().as_deref(), Some("Timer paused."));
    let paused = kitchen.handle.snapshot().timer.unwrap();
    assert!(paused.paused);
    kitchen.settle().await;
    assert_eq!(
        kitchen.handle.snapshot().timer.unwrap().remaining_seconds,
        paused.remaining_seconds,
        "a paused timer does not tick"
    );
    assert_eq!(kitchen.handle.snapshot().state, SessionState::Cooking);

    kitchen.say("resume the timer").await;
    assert_eq!(kitchen.synth.last().as_deref(), Some("Timer resumed."));
    assert!(kitchen.handle.snapshot().timer.unwrap().remaining_seconds < paused.remaining_seconds);

    kitchen.say("stop the timer").await;
    assert_eq!(kitchen.synth.last().as_deref(), Some("Timer cancelled."));
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Cooking, "stop the timer must not end the session");
    assert!(!snapshot.timer.unwrap().active);

    let haptics = kitchen.haptics.patterns();
    assert!(haptics.contains(&HapticPattern::Double));
    assert!(!haptics.contains(&HapticPattern::Triple));
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn timer_rings_and_is_silenced_by_voice() {
    let mut kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    kitchen.drain_events();

    kitchen.say("wait 30 seconds").await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(kitchen.alarm.plays.load(Ordering::SeqCst), 1);
    assert!(kitchen.haptics.patterns().contains(&HapticPattern::Alarm));
    assert!(kitchen.synth.said("Time's up!"));
    let events = kitchen.drain_events();
    assert!(events.contains(&SessionEvent::TimerStarted { total_seconds: 30 }));
    assert!(events.contains(&SessionEvent::TimerFinished));
    let timer = kitchen.handle.snapshot().timer.unwrap();
    assert!(timer.alarm_sounding && !timer.active);
    assert_eq!(timer.remaining_seconds, 0);

    kitchen.say("cancel timer").await;
    assert_eq!(kitchen.synth.last().as_deref(), Some("Alarm off."));
    assert_eq!(kitchen.alarm.stops.load(Ordering::SeqCst), 1);
    assert!(!kitchen.handle.snapshot().timer.unwrap().alarm_sounding);

    kitchen.handle.dismiss_timer().unwrap();
    kitchen.settle().await;
    assert!(kitchen.handle.snapshot().timer.is_none());
    assert_eq!(kitchen.alarm.plays.load(Ordering::SeqCst), 1, "the alarm fires once");
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn second_timer_and_unclear_duration_are_refused() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;

    kitchen.say("set a timer").await;
    assert_eq!(
        kitchen.synth.last().as_deref(),
        Some("Sorry, how long should I wait? Try saying wait 5 minutes or wait 30 seconds.")
    );
    assert!(kitchen.handle.snapshot().timer.is_none());

    kitchen.say("wait 5 minutes").await;
    kitchen.say("timer for 2 minutes").await;
    assert_eq!(
        kitchen.synth.last().as_deref(),
        Some("A timer is already running. Say cancel timer to stop it first.")
    );
    assert_eq!(kitchen.handle.snapshot().timer.unwrap().total_seconds, 300);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn pause_without_timer_pauses_the_assistant() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;

    kitchen.say("pause").await;
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Paused);
    assert!(!snapshot.is_listening, "the mic stays closed while paused");
    assert!(kitchen.synth.said("Paused. Tap resume when you're ready."));

    kitchen.handle.resume().unwrap();
    kitchen.settle().await;
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Cooking);
    assert!(snapshot.is_listening);
    assert_eq!(kitchen.synth.last().as_deref(), Some("Resuming."));
    assert_eq!(snapshot.current_step_index, Some(0), "paused on the same step");
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn stop_command_says_goodbye_and_goes_idle() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    kitchen.say("wait 5 minutes").await;

    kitchen.say("stop").await;
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(!snapshot.is_listening);
    assert!(snapshot.timer.is_none());
    assert_eq!(snapshot.current_step_index, None);
    assert_eq!(kitchen.synth.last().as_deref(), Some("Goodbye, happy cooking!"));
    assert_eq!(kitchen.haptics.patterns().last(), Some(&HapticPattern::Triple));
    kitchen.close().await;
}

// ---------------------------------------------------------------------------
// Assistant fallback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn question_while_cooking_carries_step_context() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    kitchen.say("can I use oat milk instead").await;

    let questions = kitchen.assistant.questions.lock().unwrap().clone();
    assert_eq!(questions.len(), 1);
    let context = &questions[0].1;
    assert_eq!(context.current_step_number, Some(1));
    assert_eq!(context.total_steps, 3);
    assert_eq!(
        context.current_step_details.as_deref(),
        Some("Whisk flour, milk and eggs.")
    );
    assert_eq!(kitchen.synth.last().as_deref(), Some("Use medium heat."));
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn assistant_failure_apologizes_and_keeps_cooking() {
    let kitchen = Kitchen::builder()
        .assistant(ScriptedAssistant::failing())
        .spawn();
    kitchen.start_cooking().await;
    kitchen.say("how long do pancakes keep").await;

    assert_eq!(
        kitchen.synth.last().as_deref(),
        Some("Sorry, I couldn't answer that right now.")
    );
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Cooking);
    assert!(snapshot.is_listening);
    kitchen.close().await;
}

// ---------------------------------------------------------------------------
// Lifecycle and recognition failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_session_is_idempotent() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    kitchen.say("wait 5 minutes").await;

    kitchen.handle.stop_session().unwrap();
    kitchen.handle.stop_session().unwrap();
    kitchen.settle().await;

    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(!snapshot.is_listening && !snapshot.is_speaking);
    assert!(snapshot.timer.is_none());
    assert_eq!(snapshot.recognized_text, None);
    assert!(!kitchen.handle.back_pressed().await.unwrap());
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn back_press_is_consumed_in_voice_mode() {
    let kitchen = Kitchen::open();
    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;
    assert_eq!(kitchen.handle.snapshot().state, SessionState::WakeListening);

    assert!(kitchen.handle.back_pressed().await.unwrap());
    assert_eq!(kitchen.handle.snapshot().state, SessionState::Idle);
    assert!(!kitchen.handle.snapshot().is_listening);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn blur_tears_down_and_focus_starts_over() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;

    kitchen.handle.screen_blurred().unwrap();
    kitchen.settle().await;
    assert_eq!(kitchen.handle.snapshot().state, SessionState::Idle);
    assert!(!kitchen.handle.snapshot().is_listening);

    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::WakeListening);
    assert!(snapshot.is_listening);
    assert_eq!(snapshot.current_step_index, None);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn permission_denied_returns_to_idle() {
    let mut kitchen = Kitchen::builder()
        .permission(PermissionStatus::Denied)
        .spawn();
    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;

    assert_eq!(kitchen.handle.snapshot().state, SessionState::Idle);
    assert_eq!(kitchen.recognizer.starts(), 0);
    assert!(has_notice(&kitchen.drain_events(), &Notice::PermissionDenied));

    // Focusing again asks again.
    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;
    assert_eq!(kitchen.recognizer.permission_requests.load(Ordering::SeqCst), 2);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn benign_recognition_end_restarts_listening() {
    let kitchen = Kitchen::open();
    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;
    assert_eq!(kitchen.recognizer.starts(), 1);

    kitchen.recognizer.end();
    kitchen.settle().await;
    assert_eq!(kitchen.recognizer.starts(), 2);

    kitchen.recognizer.fail(RecognitionErrorCode::NoSpeech);
    kitchen.settle().await;
    assert_eq!(kitchen.recognizer.starts(), 3);
    assert!(kitchen.handle.snapshot().is_listening);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn fatal_error_while_waking_returns_to_idle() {
    let mut kitchen = Kitchen::open();
    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;

    kitchen.recognizer.fail(RecognitionErrorCode::AudioCapture);
    kitchen.settle().await;
    assert_eq!(kitchen.handle.snapshot().state, SessionState::Idle);
    assert!(has_notice(
        &kitchen.drain_events(),
        &Notice::RecognitionFailed {
            error: "audio-capture".to_owned()
        }
    ));
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn fatal_error_while_cooking_keeps_progress() {
    let mut kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    kitchen.say("next please").await;
    kitchen.say("wait 20 seconds").await;
    kitchen.drain_events();
    let starts = kitchen.recognizer.starts();

    kitchen.recognizer.fail(RecognitionErrorCode::Network);
    kitchen.settle().await;
    kitchen.settle().await;
    assert!(kitchen.synth.said("Time's up!"));
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Cooking);
    assert_eq!(snapshot.current_step_index, Some(1));
    assert!(snapshot.timer.unwrap().alarm_sounding);
    assert!(!snapshot.is_listening, "later speech does not reopen the mic");
    assert_eq!(kitchen.recognizer.starts(), starts, "fatal errors are not retried");
    assert!(has_notice(
        &kitchen.drain_events(),
        &Notice::RecognitionFailed {
            error: "network".to_owned()
        }
    ));

    kitchen.handle.resume().unwrap();
    kitchen.settle().await;
    assert!(kitchen.handle.snapshot().is_listening);
    assert_eq!(kitchen.recognizer.starts(), starts + 1);
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn recognizer_that_cannot_start_is_reported() {
    let mut kitchen = Kitchen::open();
    kitchen.recognizer.refuse_start(true);
    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;

    assert_eq!(kitchen.handle.snapshot().state, SessionState::Idle);
    assert!(kitchen.drain_events().iter().any(|e| matches!(
        e,
        SessionEvent::Notice {
            notice: Notice::RecognitionUnavailable { .. }
        }
    )));
    kitchen.close().await;
}

// ---------------------------------------------------------------------------
// Speaker control
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn speech_rate_is_locked_while_speaking() {
    let kitchen = Kitchen::builder().manual_speech().spawn();
    kitchen.handle.set_speech_rate(SpeechRate::Fast).await.unwrap();
    assert_eq!(kitchen.handle.snapshot().speech_rate, SpeechRate::Fast);

    kitchen.handle.start_session().unwrap();
    kitchen.settle().await;
    assert!(kitchen.handle.is_speaking_now());
    assert!(kitchen.handle.snapshot().is_speaking);
    assert!(matches!(
        kitchen.handle.set_speech_rate(SpeechRate::Slow).await,
        Err(VoiceError::Busy(_))
    ));
    assert_eq!(*kitchen.synth.rates.lock().unwrap(), vec![1.25_f32]);

    kitchen.synth.finish_all();
    kitchen.settle().await;
    assert!(!kitchen.handle.is_speaking_now());
    kitchen.handle.set_speech_rate(SpeechRate::Slow).await.unwrap();
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn focus_during_goodbye_listens_once_speech_ends() {
    let kitchen = Kitchen::builder().manual_speech().spawn();
    kitchen.handle.start_session().unwrap();
    finish_speech(&kitchen).await;
    kitchen.recognizer.hear("ready");
    finish_speech(&kitchen).await;
    kitchen.recognizer.hear("first step");
    finish_speech(&kitchen).await;
    assert_eq!(kitchen.handle.snapshot().state, SessionState::Cooking);
    assert!(kitchen.handle.snapshot().is_listening);

    kitchen.recognizer.hear("stop");
    kitchen.settle().await;
    assert!(kitchen.handle.is_speaking_now());
    assert_eq!(kitchen.synth.last().as_deref(), Some("Goodbye, happy cooking!"));

    kitchen.handle.screen_focused().unwrap();
    kitchen.settle().await;
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::WakeListening);
    assert!(!snapshot.is_listening, "the goodbye is still playing");

    kitchen.synth.finish_all();
    kitchen.settle().await;
    let snapshot = kitchen.handle.snapshot();
    assert_eq!(snapshot.state, SessionState::WakeListening);
    assert!(snapshot.is_listening);

    kitchen.recognizer.hear("hey chef");
    kitchen.settle().await;
    assert_eq!(
        kitchen.handle.snapshot().state,
        SessionState::Activating(ActivationStage::Ready)
    );
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn manual_interrupt_cuts_speech_and_listens() {
    let kitchen = Kitchen::builder().manual_speech().spawn();
    kitchen.handle.start_session().unwrap();
    kitchen.settle().await;
    assert!(kitchen.handle.is_speaking_now());
    assert!(!kitchen.handle.snapshot().is_listening);

    kitchen.handle.manual_interrupt().unwrap();
    kitchen.settle().await;
    let snapshot = kitchen.handle.snapshot();
    assert!(!snapshot.is_speaking);
    assert!(snapshot.is_listening);
    assert_eq!(kitchen.synth.stops.load(Ordering::SeqCst), 1);
    assert_eq!(snapshot.state, SessionState::Activating(ActivationStage::Ready));

    // No cooldown after an interrupt: the reply is heard straight away.
    kitchen.recognizer.hear("ready");
    kitchen.settle().await;
    assert_eq!(
        kitchen.handle.snapshot().state,
        SessionState::Activating(ActivationStage::Command)
    );
    kitchen.close().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_the_alarm_once() {
    let kitchen = Kitchen::open();
    kitchen.start_cooking().await;
    let alarm = kitchen.alarm.clone();
    let handle = kitchen.handle.clone();

    kitchen.close().await;
    assert_eq!(alarm.releases.load(Ordering::SeqCst), 1);
    handle.shutdown().await.unwrap();
    assert!(handle.start_session().is_err(), "the actor is gone");
}
