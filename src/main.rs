mod bot;
mod config;
mod health;
mod llm;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::{Config, Settings};
use crate::llm::LlmClient;

const DEFAULT_SETTINGS_PATH: &str = "relaybot.toml";

fn loaded(present: bool) -> &'static str {
    if present {
        "Loaded"
    } else {
        "Missing"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real deployments set the variables directly.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let explicit_path = std::env::args().nth(1).map(PathBuf::from);
    let settings_path = explicit_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let settings = Settings::load(&settings_path, explicit_path.is_some())?;

    info!("BOT_TOKEN: {}", loaded(std::env::var("BOT_TOKEN").is_ok()));
    info!("GROQ_API_KEY: {}", loaded(std::env::var("GROQ_API_KEY").is_ok()));

    let config = Config::from_env(settings).context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Model: {}", config.llm.model);
    info!("  Max tokens: {}", config.llm.max_tokens);
    info!(
        "  Admin commands: {}",
        if config.admin_id.is_some() { "enabled" } else { "disabled" }
    );

    health::spawn(config.health.port)?;

    let llm = LlmClient::new(config.llm.clone(), config.groq_api_key.clone())?;
    let state = Arc::new(AppState::new(config, Arc::new(llm)));

    info!("Bot is running...");
    bot::run(state).await?;

    Ok(())
}
