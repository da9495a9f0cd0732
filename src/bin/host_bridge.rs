//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! A native shell spawns this process, sends `CommandEnvelope` lines on
//! stdin and receives `ResponseEnvelope` and `EventEnvelope` lines on
//! stdout. The shell implements speech recognition, synthesis, the alarm
//! and haptics by answering the engine events.
//!
//! All tracing output goes to stderr so stdout stays a clean protocol channel.

use chefie::assistant::{AssistantService, HttpAssistant, UnavailableAssistant};
use chefie::config::VoiceConfig;
use chefie::host::HostBridge;
use chefie::host::stdio::run_stdio_bridge;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chefie=info")),
        )
        .init();

    let config = VoiceConfig::load_or_default()
        .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;

    let assistant: Arc<dyn AssistantService> = match HttpAssistant::from_config(&config.assistant)
    {
        Some(http) => {
            tracing::info!(model = %config.assistant.model, "assistant enabled");
            Arc::new(http)
        }
        None => {
            tracing::warn!(
                env = %config.assistant.api_key_env,
                "assistant API key not set; questions will get an apology"
            );
            Arc::new(UnavailableAssistant)
        }
    };

    tracing::info!("chefie-host starting");
    run_stdio_bridge(HostBridge::new(config, assistant))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "chefie-host exited with error");
            anyhow::anyhow!("chefie-host failed: {e}")
        })?;

    tracing::info!("chefie-host shut down cleanly");
    Ok(())
}
