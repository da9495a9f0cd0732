//! Countdown timer model.
//!
//! Pure state: the session drives it with one [`CountdownTimer::tick`] per
//! second and reacts to the returned [`TickOutcome`].

use serde::Serialize;

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting; carries the new remaining seconds.
    Counting(u32),
    /// Reached zero on this tick. Returned exactly once per timer.
    Finished,
    /// Paused or inactive; nothing changed.
    Ignored,
}

/// A single countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    id: u64,
    total_seconds: u32,
    remaining_seconds: u32,
    paused: bool,
    active: bool,
    alarm_sounding: bool,
}

/// UI-facing view of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub total_seconds: u32,
    pub remaining_seconds: u32,
    pub active: bool,
    pub paused: bool,
    pub alarm_sounding: bool,
}

impl CountdownTimer {
    /// Start counting down from `total_seconds`.
    pub fn start(id: u64, total_seconds: u32) -> Self {
        Self {
            id,
            total_seconds,
            remaining_seconds: total_seconds,
            paused: false,
            active: total_seconds > 0,
            alarm_sounding: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Active and counting.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active && !self.paused
    }

    #[must_use]
    pub fn alarm_sounding(&self) -> bool {
        self.alarm_sounding
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Ignored;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.active = false;
            self.paused = false;
            self.alarm_sounding = true;
            TickOutcome::Finished
        } else {
            TickOutcome::Counting(self.remaining_seconds)
        }
    }

    /// Returns `false` if the timer was not running.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.paused = true;
        true
    }

    /// Returns `false` if the timer was not paused.
    pub fn resume(&mut self) -> bool {
        if !(self.active && self.paused) {
            return false;
        }
        self.paused = false;
        true
    }

    /// Stop counting without firing. Returns whether the alarm was sounding.
    pub fn cancel(&mut self) -> bool {
        let was_sounding = self.alarm_sounding;
        self.remaining_seconds = 0;
        self.active = false;
        self.paused = false;
        self.alarm_sounding = false;
        was_sounding
    }

    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            total_seconds: self.total_seconds,
            remaining_seconds: self.remaining_seconds,
            active: self.active,
            paused: self.paused,
            alarm_sounding: self.alarm_sounding,
        }
    }
}

/// Human phrasing of a duration: "2 minutes and 5 seconds", "1 minute", "30 seconds".
#[must_use]
pub fn describe_duration(total_seconds: u32) -> String {
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let unit = |n: u32, singular: &str| {
        if n == 1 {
            format!("1 {singular}")
        } else {
            format!("{n} {singular}s")
        }
    };
    match (minutes, seconds) {
        (0, s) => unit(s, "second"),
        (m, 0) => unit(m, "minute"),
        (m, s) => format!("{} and {}", unit(m, "minute"), unit(s, "second")),
    }
}
