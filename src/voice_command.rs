//! Voice command grammar for hands-free cooking.
//!
//! A deliberately coarse keyword matcher: transcripts are lower-cased and
//! tested for substrings, and ambiguous phrases are resolved purely by rule
//! order. "stop the timer" cancels the timer because the timer rule is
//! checked before the session-stop rule.
//!
//! # Cooking commands (first match wins)
//!
//! | # | Contains | Command |
//! |---|----------|---------|
//! | 1 | (`cancel` or `stop`) and `timer` | `CancelTimer` |
//! | 2 | `pause` | `Pause` |
//! | 3 | `resume` | `Resume` |
//! | 4 | `next`, `continue` | `NextStep` |
//! | 5 | `previous`, `back` | `PreviousStep` |
//! | 6 | `repeat`, `again` | `RepeatStep` |
//! | 7 | `stop`, `exit` | `EndSession` |
//! | 8 | `wait`, `timer` | `SetTimer` |
//! | 9 | anything else | `Question` |

use regex::Regex;
use std::sync::LazyLock;

static MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:minutes?|mins?)\b").expect("valid regex"));
static SECONDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:seconds?|secs?)\b").expect("valid regex"));

const READY_WORDS: &[&str] = &["ready", "start", "begin"];
const FIRST_STEP_PHRASES: &[&str] = &["first step", "start step", "begin step"];

/// A command recognized while cooking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCommand {
    CancelTimer,
    /// Pause the timer, or the assistant when no timer runs.
    Pause,
    /// Resume the timer, or the assistant when paused.
    Resume,
    NextStep,
    PreviousStep,
    RepeatStep,
    /// Leave cooking mode entirely.
    EndSession,
    /// Start a countdown. `None` when no duration could be parsed.
    SetTimer { seconds: Option<u32> },
    /// Free-form question for the AI fallback.
    Question(String),
}

/// Interpret a transcript heard during cooking.
#[must_use]
pub fn parse_command(text: &str) -> VoiceCommand {
    let lower = text.to_lowercase();
    let has = |word: &str| lower.contains(word);

    if (has("cancel") || has("stop")) && has("timer") {
        VoiceCommand::CancelTimer
    } else if has("pause") {
        VoiceCommand::Pause
    } else if has("resume") {
        VoiceCommand::Resume
    } else if has("next") || has("continue") {
        VoiceCommand::NextStep
    } else if has("previous") || has("back") {
        VoiceCommand::PreviousStep
    } else if has("repeat") || has("again") {
        VoiceCommand::RepeatStep
    } else if has("stop") || has("exit") {
        VoiceCommand::EndSession
    } else if has("wait") || has("timer") {
        VoiceCommand::SetTimer {
            seconds: parse_duration(&lower),
        }
    } else {
        VoiceCommand::Question(text.trim().to_owned())
    }
}

/// Extract a duration in seconds from text like "wait 2 minutes and 30 seconds".
///
/// Returns `None` when neither a minutes nor a seconds count is present, or
/// when the total is zero.
#[must_use]
pub fn parse_duration(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let capture = |re: &Regex| -> Option<u32> {
        re.captures(&lower)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    };

    let minutes = capture(&MINUTES_RE);
    let seconds = capture(&SECONDS_RE);
    if minutes.is_none() && seconds.is_none() {
        return None;
    }

    let total = minutes
        .unwrap_or(0)
        .saturating_mul(60)
        .saturating_add(seconds.unwrap_or(0));
    (total > 0).then_some(total)
}

/// Find the first configured wake word contained in `text`.
#[must_use]
pub fn find_wake_word<'a>(text: &str, wake_words: &'a [String]) -> Option<&'a str> {
    let lower = text.to_lowercase();
    wake_words
        .iter()
        .map(String::as_str)
        .find(|word| !word.is_empty() && lower.contains(&word.to_lowercase()))
}

/// Whether the user confirmed the "say ready" prompt.
#[must_use]
pub fn is_ready_reply(text: &str) -> bool {
    let lower = text.to_lowercase();
    READY_WORDS.iter().any(|w| lower.contains(w))
}

/// Whether the user asked to begin with the first step.
#[must_use]
pub fn is_first_step_reply(text: &str) -> bool {
    let lower = text.to_lowercase();
    FIRST_STEP_PHRASES.iter().any(|p| lower.contains(p))
}

/// Phrases that bias the recognizer towards the command vocabulary.
#[must_use]
pub fn contextual_hints(wake_words: &[String]) -> Vec<String> {
    let commands = [
        "ready",
        "first step",
        "next step",
        "previous step",
        "go back",
        "repeat",
        "pause",
        "resume",
        "cancel timer",
        "stop timer",
        "wait",
        "minutes",
        "seconds",
        "stop",
        "exit",
    ];
    wake_words
        .iter()
        .cloned()
        .chain(commands.iter().map(|c| (*c).to_owned()))
        .collect()
}
