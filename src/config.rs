//! Configuration types for the voice session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for a cooking voice session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Recognition and synthesis settings.
    pub speech: SpeechConfig,
    /// Handoff delays between the microphone and the speaker.
    pub timing: TimingConfig,
    /// Echo suppression settings.
    pub echo: EchoConfig,
    /// Wake phrase settings.
    pub activation: ActivationConfig,
    /// AI fallback settings.
    pub assistant: AssistantConfig,
}

/// Spoken playback speed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechRate {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeechRate {
    /// Multiplier handed to the synthesizer.
    #[must_use]
    pub fn multiplier(self) -> f32 {
        match self {
            Self::Slow => 0.75,
            Self::Normal => 1.0,
            Self::Fast => 1.25,
        }
    }

    /// Parse a rate name as used on the host wire (`slow`, `normal`, `fast`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "slow" => Some(Self::Slow),
            "normal" => Some(Self::Normal),
            "fast" => Some(Self::Fast),
            _ => None,
        }
    }
}

/// Recognition and synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP-47 language tag passed to the recognizer.
    pub language: String,
    /// Initial speech rate.
    pub rate: SpeechRate,
    /// Extra phrases biasing the recognizer, on top of the command vocabulary.
    pub contextual_hints: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            rate: SpeechRate::Normal,
            contextual_hints: Vec::new(),
        }
    }
}

/// Delays used by the speak/listen handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after stopping recognition before the synthesizer starts.
    pub mic_release_grace_ms: u64,
    /// Buffer after synthesis completes before `is_speaking` clears.
    pub speech_settle_ms: u64,
    /// Additional delay before listening resumes after speech.
    pub listen_resume_delay_ms: u64,
    /// Delay before restarting recognition after a benign end/error.
    pub recognition_restart_delay_ms: u64,
    /// Pause between the two halves of a split prompt.
    pub prompt_pause_ms: u64,
    /// Upper bound on an AI fallback request.
    pub assistant_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mic_release_grace_ms: 200,
            speech_settle_ms: 500,
            listen_resume_delay_ms: 1500,
            recognition_restart_delay_ms: 300,
            prompt_pause_ms: 600,
            assistant_timeout_secs: 20,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn mic_release_grace(&self) -> Duration {
        Duration::from_millis(self.mic_release_grace_ms)
    }

    #[must_use]
    pub fn speech_settle(&self) -> Duration {
        Duration::from_millis(self.speech_settle_ms)
    }

    #[must_use]
    pub fn listen_resume_delay(&self) -> Duration {
        Duration::from_millis(self.listen_resume_delay_ms)
    }

    #[must_use]
    pub fn recognition_restart_delay(&self) -> Duration {
        Duration::from_millis(self.recognition_restart_delay_ms)
    }

    #[must_use]
    pub fn prompt_pause(&self) -> Duration {
        Duration::from_millis(self.prompt_pause_ms)
    }

    #[must_use]
    pub fn assistant_timeout(&self) -> Duration {
        Duration::from_secs(self.assistant_timeout_secs)
    }
}

/// Echo suppression configuration.
///
/// The cooldown after speech is `base_cooldown_ms + min(len * per_char_cooldown_ms,
/// max_extra_cooldown_ms)` where `len` is the character length of the last
/// utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    pub base_cooldown_ms: u64,
    pub per_char_cooldown_ms: u64,
    pub max_extra_cooldown_ms: u64,
    /// Number of recent assistant utterances compared against transcripts.
    pub history: usize,
    /// Leading characters compared by the similarity check.
    pub prefix_chars: usize,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            base_cooldown_ms: 3000,
            per_char_cooldown_ms: 50,
            max_extra_cooldown_ms: 7000,
            history: 5,
            prefix_chars: 20,
        }
    }
}

/// Wake phrase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Phrases that start the activation handshake (substring match).
    pub wake_words: Vec<String>,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            wake_words: ["chef", "chefiepie", "chef pie", "chefie pie", "hi", "hello", "hey"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// AI fallback configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Base URL including the API version prefix, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Token cap for answers; they are read aloud so they stay short.
    pub max_tokens: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key_env: "CHEFIE_ASSISTANT_API_KEY".to_owned(),
            max_tokens: 200,
        }
    }
}

impl AssistantConfig {
    /// Resolve the API key from the configured environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl VoiceConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::VoiceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VoiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file: `voice.toml` under `dirs::config_dir()/chefie/`.
    ///
    /// `CHEFIE_CONFIG_DIR` overrides the directory.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        let dir = match std::env::var_os("CHEFIE_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .map(|d| d.join("chefie"))
                .unwrap_or_else(|| std::env::temp_dir().join("chefie-config")),
        };
        dir.join("voice.toml")
    }

    /// Load from the default path, or return defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be parsed.
    pub fn load_or_default() -> crate::error::Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}
