//! Echo suppression for a single-microphone device.
//!
//! The recognizer keeps hearing the room while the assistant talks, so a
//! transcript may be the tail of our own speech rather than the user. The
//! guard rejects transcripts that arrive while speaking, inside a cooldown
//! window sized by the length of the last utterance, or that share a prefix
//! with something the assistant said recently.

use crate::config::EchoConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Whether an utterance's text goes into the similarity buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoRecording {
    /// Remember the text for echo matching.
    Record,
    /// Only feed the cooldown length. Used for prompts that ask the user to
    /// say a keyword back, so the expected reply is not mistaken for echo.
    LengthOnly,
}

/// Outcome of checking a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoVerdict {
    Accept,
    /// Blank transcript.
    Empty,
    /// The assistant is speaking right now.
    Speaking,
    /// Inside the post-speech cooldown window.
    Cooldown { remaining: Duration },
    /// Shares a prefix with a recent assistant utterance.
    Echo,
}

impl EchoVerdict {
    #[must_use]
    pub fn is_accept(self) -> bool {
        self == Self::Accept
    }
}

/// Tracks recent assistant speech and classifies incoming transcripts.
#[derive(Debug)]
pub struct EchoGuard {
    config: EchoConfig,
    recent: VecDeque<String>,
    last_speech_end_at: Option<Instant>,
    last_speech_length: usize,
}

impl EchoGuard {
    pub fn new(config: EchoConfig) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.history),
            config,
            last_speech_end_at: None,
            last_speech_length: 0,
        }
    }

    /// Remember an utterance the assistant is about to speak.
    pub fn record_utterance(&mut self, text: &str, recording: EchoRecording) {
        self.last_speech_length = text.chars().count();
        if recording == EchoRecording::LengthOnly {
            return;
        }
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() || self.config.history == 0 {
            return;
        }
        while self.recent.len() >= self.config.history {
            self.recent.pop_front();
        }
        self.recent.push_back(normalized);
    }

    /// Mark the end of synthesis for an utterance of `length` characters.
    pub fn record_speech_end(&mut self, length: usize, now: Instant) {
        self.last_speech_length = length;
        self.last_speech_end_at = Some(now);
    }

    /// Forget the cooldown window (the user explicitly interrupted speech).
    pub fn clear_cooldown(&mut self) {
        self.last_speech_end_at = None;
    }

    /// Cooldown window after the most recent utterance.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        let per_char = (self.last_speech_length as u64).saturating_mul(self.config.per_char_cooldown_ms);
        let extra = per_char.min(self.config.max_extra_cooldown_ms);
        Duration::from_millis(self.config.base_cooldown_ms + extra)
    }

    /// Convenience wrapper over [`EchoGuard::check`].
    #[must_use]
    pub fn should_accept(&self, transcript: &str, speaking_now: bool, now: Instant) -> bool {
        self.check(transcript, speaking_now, now).is_accept()
    }

    /// Classify a transcript. `speaking_now` must come from the immediate
    /// speaking flag, not a reactive copy.
    #[must_use]
    pub fn check(&self, transcript: &str, speaking_now: bool, now: Instant) -> EchoVerdict {
        if speaking_now {
            return EchoVerdict::Speaking;
        }

        let normalized = transcript.trim().to_lowercase();
        if normalized.is_empty() {
            return EchoVerdict::Empty;
        }

        if let Some(ended) = self.last_speech_end_at {
            let elapsed = now.saturating_duration_since(ended);
            let cooldown = self.cooldown();
            if elapsed < cooldown {
                return EchoVerdict::Cooldown {
                    remaining: cooldown - elapsed,
                };
            }
        }

        let heard = leading_chars(&normalized, self.config.prefix_chars);
        for utterance in self.recent.iter().rev() {
            let said = leading_chars(utterance, self.config.prefix_chars);
            if said.contains(heard) || heard.contains(said) {
                debug!(transcript = %normalized, utterance = %utterance, "transcript matches recent utterance");
                return EchoVerdict::Echo;
            }
        }

        EchoVerdict::Accept
    }

    /// Recently recorded utterances, oldest first.
    pub fn recent_utterances(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    #[must_use]
    pub fn last_speech_length(&self) -> usize {
        self.last_speech_length
    }
}

/// The first `n` characters of `text`, respecting char boundaries.
fn leading_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
