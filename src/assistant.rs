//! AI fallback for questions the command grammar does not cover.

use crate::config::AssistantConfig;
use crate::error::{Result, VoiceError};
use crate::recipe::RecipeContext;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Answers free-form cooking questions.
#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Answer `question` in the context of the recipe being cooked.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Assistant`] when the service is unreachable or
    /// returns no usable answer.
    async fn answer(&self, question: &str, context: &RecipeContext) -> Result<String>;
}

/// Assistant used when no service is configured. Always fails, so the
/// session speaks its apology.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableAssistant;

#[async_trait]
impl AssistantService for UnavailableAssistant {
    async fn answer(&self, _question: &str, _context: &RecipeContext) -> Result<String> {
        Err(VoiceError::Assistant("no assistant configured".to_owned()))
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpAssistant {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl HttpAssistant {
    /// - `base_url`: including the version prefix, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: AssistantConfig::default().max_tokens,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build from config, or `None` when the API key variable is unset.
    #[must_use]
    pub fn from_config(config: &AssistantConfig) -> Option<Self> {
        let api_key = config.api_key()?;
        Some(
            Self::new(config.base_url.clone(), api_key, config.model.clone())
                .with_max_tokens(config.max_tokens),
        )
    }

    fn request_body(&self, question: &str, context: &RecipeContext) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "stream": false,
            "messages": [
                {"role": "system", "content": system_prompt(context)},
                {"role": "user", "content": question},
            ],
        })
    }
}

#[async_trait]
impl AssistantService for HttpAssistant {
    async fn answer(&self, question: &str, context: &RecipeContext) -> Result<String> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{base}/chat/completions");
        debug!(%url, question, "asking assistant");

        let mut request = self.client.post(&url).json(&self.request_body(question, context));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "assistant request failed");
            VoiceError::Assistant(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "assistant returned an error");
            return Err(VoiceError::Assistant(format!("HTTP {status}: {body}")));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| VoiceError::Assistant(format!("invalid response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| VoiceError::Assistant("empty answer".to_owned()))
    }
}

/// System prompt describing where the cook is in the recipe.
fn system_prompt(context: &RecipeContext) -> String {
    let mut prompt = format!(
        "You are a hands-free cooking assistant. Answers are read aloud, so reply in \
         one to three short plain sentences without lists or markdown.\n\
         Recipe: {}\nTotal steps: {}",
        context.recipe_name, context.total_steps
    );
    if let (Some(number), Some(details)) =
        (context.current_step_number, context.current_step_details.as_deref())
    {
        prompt.push_str(&format!("\nCurrent step {number}: {details}"));
    }
    if !context.ingredients.is_empty() {
        prompt.push_str(&format!("\nIngredients: {}", context.ingredients.join(", ")));
    }
    if let Some(difficulty) = &context.difficulty {
        prompt.push_str(&format!("\nDifficulty: {difficulty}"));
    }
    prompt
}
