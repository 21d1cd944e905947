use foundry_core::TutorConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Backend used for course generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
    /// Serves a fixed sample course; needs no API key.
    Static,
}

impl Provider {
    /// Unknown names select OpenAI.
    fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "static" => Provider::Static,
            _ => Provider::OpenAI,
        }
    }

    /// The variable holding this provider's API key, if it needs one.
    fn key_var(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Static => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    /// Gemini Live model used for voice tutoring sessions.
    pub live_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub tutor: TutorConfig,
}

impl Config {
    /// Reads the service configuration from the environment (and `.env`
    /// outside of tests).
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let provider = Provider::from_name(&var_or("LLM_PROVIDER", "openai"));
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        if let Some(key_var) = provider.key_var() {
            let key = match provider {
                Provider::Gemini => &gemini_api_key,
                _ => &openai_api_key,
            };
            if key.is_none() {
                return Err(ConfigError::MissingVar(format!(
                    "{} must be set for the {:?} provider",
                    key_var, provider
                )));
            }
        }

        let defaults = TutorConfig::default();
        let tutor = TutorConfig {
            interval: secs_var("TUTOR_INTERVAL_SECS", defaults.interval)?,
            reply_timeout: secs_var("TUTOR_REPLY_TIMEOUT_SECS", defaults.reply_timeout)?,
            max_consecutive_failures: parse_var(
                "TUTOR_MAX_FAILURES",
                defaults.max_consecutive_failures,
            )?,
        };
        if tutor.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidValue(
                "TUTOR_MAX_FAILURES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address: parse_var("BIND_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 8000)))?,
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model: var_or("CHAT_MODEL", "gpt-4o"),
            live_model: var_or("LIVE_MODEL", "models/gemini-2.0-flash-exp"),
            log_level: parse_var("RUST_LOG", Level::INFO)?,
            prompts_path: PathBuf::from(var_or("PROMPTS_PATH", "./prompts")),
            tutor,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), format!("'{}'", raw))),
        Err(_) => Ok(default),
    }
}

fn secs_var(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    parse_var(name, default.as_secs()).map(Duration::from_secs)
}
