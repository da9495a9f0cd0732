//! Drives the countdown timer: a ticker task per running timer, the alarm
//! and the spoken announcements.

use crate::echo_guard::EchoRecording;
use crate::engines::HapticPattern;
use crate::session::controller::SessionActor;
use crate::session::events::SessionEvent;
use crate::session::messages::SessionInput;
use crate::timer::{CountdownTimer, TickOutcome, TimerSnapshot, describe_duration};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const TICK: Duration = Duration::from_secs(1);

const TIMES_UP: &str = "Time's up!";
const NO_TIMER: &str = "There's no timer running.";
const TIMER_CANCELLED: &str = "Timer cancelled.";
const ALARM_DISMISSED: &str = "Alarm off.";
const TIMER_PAUSED: &str = "Timer paused.";
const TIMER_RESUMED: &str = "Timer resumed.";
const TIMER_BUSY: &str = "A timer is already running. Say cancel timer to stop it first.";
const TIMER_UNCLEAR: &str =
    "Sorry, how long should I wait? Try saying wait 5 minutes or wait 30 seconds.";

#[derive(Debug, Default)]
pub(super) struct Countdown {
    timer: Option<CountdownTimer>,
    /// Stops the ticker task of the running timer.
    ticker: Option<CancellationToken>,
    next_id: u64,
}

impl Countdown {
    pub(super) fn snapshot(&self) -> Option<TimerSnapshot> {
        self.timer.as_ref().map(CountdownTimer::snapshot)
    }

    fn stop_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }
}

/// Post one tick per second for `timer` until `token` is cancelled.
fn spawn_ticker(timer: u64, tx: mpsc::UnboundedSender<SessionInput>, token: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + TICK, TICK);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if tx.send(SessionInput::TimerTick { timer }).is_err() {
                        break;
                    }
                }
            }
        }
        debug!(timer, "ticker stopped");
    });
}

impl SessionActor {
    pub(super) fn timer_active(&self) -> bool {
        self.countdown
            .timer
            .as_ref()
            .is_some_and(CountdownTimer::is_active)
    }

    pub(super) fn timer_running(&self) -> bool {
        self.countdown
            .timer
            .as_ref()
            .is_some_and(CountdownTimer::is_running)
    }

    fn start_ticker(&mut self, timer: u64) {
        self.countdown.stop_ticker();
        let Some(tx) = self.sender() else {
            return;
        };
        let token = CancellationToken::new();
        spawn_ticker(timer, tx, token.clone());
        self.countdown.ticker = Some(token);
    }

    pub(super) fn set_timer_command(&mut self, seconds: Option<u32>) {
        let Some(seconds) = seconds else {
            self.say(TIMER_UNCLEAR, EchoRecording::Record);
            return;
        };
        if self.timer_active() {
            self.say(TIMER_BUSY, EchoRecording::Record);
            return;
        }
        // A finished timer may still be ringing.
        if self
            .countdown
            .timer
            .as_ref()
            .is_some_and(CountdownTimer::alarm_sounding)
        {
            self.engines.alarm.stop();
        }

        self.countdown.next_id += 1;
        let id = self.countdown.next_id;
        self.countdown.timer = Some(CountdownTimer::start(id, seconds));
        self.start_ticker(id);
        info!(timer = id, seconds, "timer started");
        self.emit(SessionEvent::TimerStarted {
            total_seconds: seconds,
        });
        self.publish();
        self.say(
            format!("Timer set for {}.", describe_duration(seconds)),
            EchoRecording::Record,
        );
    }

    pub(super) fn on_timer_tick(&mut self, id: u64) {
        let Some(timer) = self.countdown.timer.as_mut().filter(|t| t.id() == id) else {
            debug!(timer = id, "tick for a timer that no longer exists");
            return;
        };
        match timer.tick() {
            TickOutcome::Counting(_) => self.publish(),
            TickOutcome::Finished => {
                info!(timer = id, "timer finished");
                self.countdown.stop_ticker();
                self.engines.alarm.play();
                self.engines.haptics.vibrate(HapticPattern::Alarm);
                self.emit(SessionEvent::TimerFinished);
                self.publish();
                self.say(TIMES_UP, EchoRecording::Record);
            }
            TickOutcome::Ignored => {}
        }
    }

    pub(super) fn pause_timer(&mut self) {
        let Some(timer) = self.countdown.timer.as_mut() else {
            return;
        };
        if !timer.pause() {
            return;
        }
        let remaining = timer.remaining_seconds();
        self.countdown.stop_ticker();
        info!(remaining, "timer paused");
        self.publish();
        self.say(TIMER_PAUSED, EchoRecording::Record);
    }

    pub(super) fn resume_timer(&mut self) {
        let Some(timer) = self.countdown.timer.as_mut() else {
            return;
        };
        if timer.resume() {
            let id = timer.id();
            info!(remaining = timer.remaining_seconds(), "timer resumed");
            self.start_ticker(id);
            self.publish();
            self.say(TIMER_RESUMED, EchoRecording::Record);
        }
    }

    /// Voice "cancel timer": stop a running countdown or silence the alarm.
    pub(super) fn cancel_timer_command(&mut self) {
        let Some(timer) = self.countdown.timer.as_mut() else {
            self.say(NO_TIMER, EchoRecording::Record);
            return;
        };
        if !timer.is_active() && !timer.alarm_sounding() {
            self.say(NO_TIMER, EchoRecording::Record);
            return;
        }
        let was_sounding = timer.cancel();
        self.countdown.stop_ticker();
        if was_sounding {
            self.engines.alarm.stop();
        }
        info!(was_sounding, "timer cancelled");
        self.publish();
        let reply = if was_sounding {
            ALARM_DISMISSED
        } else {
            TIMER_CANCELLED
        };
        self.say(reply, EchoRecording::Record);
    }

    /// UI dismissal: silence the alarm and drop the timer surface.
    pub(super) fn dismiss_timer(&mut self) {
        if self.countdown.timer.is_none() {
            return;
        }
        self.destroy_timer();
        self.publish();
    }

    /// Stop ticking, silence the alarm and forget the timer.
    pub(super) fn destroy_timer(&mut self) {
        self.countdown.stop_ticker();
        if let Some(timer) = self.countdown.timer.take() {
            debug!(timer = timer.id(), "timer removed");
            if timer.alarm_sounding() {
                self.engines.alarm.stop();
            }
        }
    }
}
