use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings for the chat-completion endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HealthConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Non-secret tuning read from the optional TOML settings file.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse settings file")
    }

    /// Reads the settings file at `path`. A missing file is only an error
    /// when the caller asked for it explicitly.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))
    }
}

/// Everything the bot needs at runtime. Built once in `main` and handed to
/// the dispatcher; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub groq_api_key: String,
    pub admin_id: Option<String>,
    pub llm: LlmConfig,
    pub health: HealthConfig,
}

fn default_model() -> String {
    "openai/gpt-oss-20b".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_max_tokens() -> u32 {
    200
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn from_env(settings: Settings) -> Result<Self> {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(settings: Settings, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token =
            get("BOT_TOKEN").context("BOT_TOKEN not found. Check your .env file.")?;
        let groq_api_key =
            get("GROQ_API_KEY").context("GROQ_API_KEY not found. Check your .env file.")?;
        let admin_id = get("ADMIN_ID").map(|id| id.trim().to_string());

        let mut health = settings.health;
        if let Some(port) = get("PORT") {
            health.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?;
        }

        Ok(Config {
            bot_token,
            groq_api_key,
            admin_id,
            llm: settings.llm,
            health,
        })
    }

    /// True when `caller_id` matches the configured admin. Always false when
    /// no admin is configured.
    pub fn is_admin(&self, caller_id: &str) -> bool {
        self.admin_id.as_deref() == Some(caller_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_loads_required_and_optional_values() {
        let config = Config::from_lookup(
            Settings::default(),
            lookup(&[
                ("BOT_TOKEN", "tg-token"),
                ("GROQ_API_KEY", "gsk-abc"),
                ("ADMIN_ID", "42"),
                ("PORT", "9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.bot_token, "tg-token");
        assert_eq!(config.groq_api_key, "gsk-abc");
        assert_eq!(config.admin_id.as_deref(), Some("42"));
        assert_eq!(config.health.port, 9000);
        assert_eq!(config.llm.model, "openai/gpt-oss-20b");
        assert_eq!(config.llm.max_tokens, 200);
    }

    #[test]
    fn test_missing_bot_token_is_fatal() {
        let err = Config::from_lookup(Settings::default(), lookup(&[("GROQ_API_KEY", "k")]))
            .unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(Settings::default(), lookup(&[("BOT_TOKEN", "t")]))
            .unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_empty_token_counts_as_missing() {
        let result = Config::from_lookup(
            Settings::default(),
            lookup(&[("BOT_TOKEN", "  "), ("GROQ_API_KEY", "k")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_without_admin_or_port() {
        let config = Config::from_lookup(
            Settings::default(),
            lookup(&[("BOT_TOKEN", "t"), ("GROQ_API_KEY", "k")]),
        )
        .unwrap();
        assert!(config.admin_id.is_none());
        assert_eq!(config.health.port, 8080);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = Config::from_lookup(
            Settings::default(),
            lookup(&[("BOT_TOKEN", "t"), ("GROQ_API_KEY", "k"), ("PORT", "http")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unset_admin_denies_everyone() {
        let config = Config::from_lookup(
            Settings::default(),
            lookup(&[("BOT_TOKEN", "t"), ("GROQ_API_KEY", "k"), ("ADMIN_ID", "")]),
        )
        .unwrap();
        assert!(!config.is_admin("42"));
        assert!(!config.is_admin(""));
    }

    #[test]
    fn test_admin_match_is_exact() {
        let config = Config::from_lookup(
            Settings::default(),
            lookup(&[("BOT_TOKEN", "t"), ("GROQ_API_KEY", "k"), ("ADMIN_ID", "42")]),
        )
        .unwrap();
        assert!(config.is_admin("42"));
        assert!(!config.is_admin("420"));
        assert!(!config.is_admin("1"));
    }

    #[test]
    fn test_settings_file_overrides_defaults() {
        let settings = Settings::parse(
            r#"
            [llm]
            model = "llama-3.1-8b-instant"
            timeout_secs = 15

            [health]
            port = 3000
            "#,
        )
        .unwrap();

        assert_eq!(settings.llm.model, "llama-3.1-8b-instant");
        assert_eq!(settings.llm.max_tokens, 200);
        assert_eq!(settings.llm.timeout(), Duration::from_secs(15));
        assert_eq!(settings.health.port, 3000);
    }

    #[test]
    fn test_port_env_beats_settings_file() {
        let settings = Settings::parse("[health]\nport = 3000\n").unwrap();
        let config = Config::from_lookup(
            settings,
            lookup(&[("BOT_TOKEN", "t"), ("GROQ_API_KEY", "k"), ("PORT", "5000")]),
        )
        .unwrap();
        assert_eq!(config.health.port, 5000);
    }

    #[test]
    fn test_empty_settings_file_uses_defaults() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
    }

    #[test]
    fn test_missing_optional_settings_file_is_ok() {
        let settings = Settings::load(Path::new("/nonexistent/relaybot.toml"), false).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(Settings::load(Path::new("/nonexistent/relaybot.toml"), true).is_err());
    }
}
