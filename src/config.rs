//! Environment-driven runtime configuration.
//!
//! Everything is read once at startup from process environment variables
//! (a `.env` file is loaded first when present). `OPENAI_API_KEY` is the
//! only required variable; all others carry defaults suitable for local
//! development against a local Redis.

use std::env;

use crate::error::{MediError, Result};

/// Default chat-capable model for intent, disease, and responder stages.
pub const DEFAULT_CHAT_MODEL: &str = "Meta-Llama-3.3-70B-Instruct";
/// Default vision-capable model for drug-name extraction from prescriptions.
pub const DEFAULT_DRUG_EXTRACTOR_MODEL: &str = "Llama-4-Maverick-17B-128E-Instruct";
/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.sambanova.ai/v1";

/// Which cache backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// External Redis, the production default.
    #[default]
    Redis,
    /// In-process store with disk persistence, for development.
    Memory,
}

impl CacheBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(MediError::Config(format!(
                "Unknown CACHE_BACKEND '{other}' (expected 'redis' or 'memory')"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Settings {
    pub app_name: String,
    pub debug: bool,
    /// Emit log lines as JSON instead of the human-readable format.
    pub log_json: bool,
    pub api_version: String,
    pub port: u16,

    pub cache_backend: CacheBackend,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: u32,
    pub redis_password: Option<String>,
    /// Answer and session TTL in seconds.
    pub cache_ttl_secs: u64,

    pub openai_api_key: String,
    pub openai_api_base: String,

    pub intent_model: String,
    pub responder_model: String,
    pub drug_extractor_model: String,
    pub drug_info_model: String,
    pub disease_model: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MediError::Config(format!("Invalid value for {name}: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| MediError::Config("OPENAI_API_KEY is not set".into()))?;
        if openai_api_key.trim().is_empty() {
            return Err(MediError::Config("OPENAI_API_KEY is empty".into()));
        }

        let debug = parse_var("DEBUG", false)?;
        let chat_model = var_or("CHAT_MODEL", DEFAULT_CHAT_MODEL);
        let extractor_model = var_or("DRUG_EXTRACTOR_MODEL_NAME", DEFAULT_DRUG_EXTRACTOR_MODEL);

        Ok(Self {
            app_name: var_or("APP_NAME", "MediAssist"),
            debug,
            log_json: parse_var("LOG_JSON", false)?,
            api_version: var_or("API_VERSION", "v1"),
            port: parse_var("PORT", 8000)?,
            cache_backend: CacheBackend::parse(&var_or("CACHE_BACKEND", "redis"))?,
            redis_host: var_or("REDIS_HOST", "localhost"),
            redis_port: parse_var("REDIS_PORT", 6379)?,
            redis_db: parse_var("REDIS_DB", 0)?,
            redis_password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
            cache_ttl_secs: parse_var("REDIS_CACHE_TTL", 3600)?,
            openai_api_key,
            openai_api_base: var_or("OPENAI_API_BASE", DEFAULT_API_BASE),
            intent_model: var_or("INTENT_MODEL_NAME", &chat_model),
            responder_model: var_or("RESPONDER_MODEL_NAME", &chat_model),
            drug_extractor_model: extractor_model,
            drug_info_model: var_or("DRUG_INFO_MODEL_NAME", &chat_model),
            disease_model: var_or("DISEASE_MODEL_NAME", &chat_model),
        })
    }

    /// Connection URL for the Redis backend.
    pub fn redis_url(&self) -> String {
        match &self.redis_password {
            Some(pw) => format!(
                "redis://:{pw}@{}:{}/{}",
                self.redis_host, self.redis_port, self.redis_db
            ),
            None => format!(
                "redis://{}:{}/{}",
                self.redis_host, self.redis_port, self.redis_db
            ),
        }
    }
}

// Manual Debug so the API key never reaches logs.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("app_name", &self.app_name)
            .field("debug", &self.debug)
            .field("log_json", &self.log_json)
            .field("api_version", &self.api_version)
            .field("port", &self.port)
            .field("cache_backend", &self.cache_backend)
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_db", &self.redis_db)
            .field("redis_password", &self.redis_password.as_ref().map(|_| "[REDACTED]"))
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_api_base", &self.openai_api_base)
            .field("intent_model", &self.intent_model)
            .field("responder_model", &self.responder_model)
            .field("drug_extractor_model", &self.drug_extractor_model)
            .field("drug_info_model", &self.drug_info_model)
            .field("disease_model", &self.disease_model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings {
            app_name: "MediAssist".into(),
            debug: false,
            log_json: false,
            api_version: "v1".into(),
            port: 8000,
            cache_backend: CacheBackend::Redis,
            redis_host: "localhost".into(),
            redis_port: 6379,
            redis_db: 0,
            redis_password: None,
            cache_ttl_secs: 3600,
            openai_api_key: "sk-secret".into(),
            openai_api_base: DEFAULT_API_BASE.into(),
            intent_model: DEFAULT_CHAT_MODEL.into(),
            responder_model: DEFAULT_CHAT_MODEL.into(),
            drug_extractor_model: DEFAULT_DRUG_EXTRACTOR_MODEL.into(),
            drug_info_model: DEFAULT_CHAT_MODEL.into(),
            disease_model: DEFAULT_CHAT_MODEL.into(),
        }
    }

    #[test]
    fn test_cache_backend_parse() {
        assert_eq!(CacheBackend::parse("redis").unwrap(), CacheBackend::Redis);
        assert_eq!(CacheBackend::parse(" Memory ").unwrap(), CacheBackend::Memory);
        assert!(CacheBackend::parse("mongo").is_err());
    }

    #[test]
    fn test_redis_url_without_password() {
        let settings = test_settings();
        assert_eq!(settings.redis_url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_redis_url_with_password() {
        let mut settings = test_settings();
        settings.redis_password = Some("hunter2".into());
        settings.redis_db = 2;
        assert_eq!(settings.redis_url(), "redis://:hunter2@localhost:6379/2");
    }

    #[test]
    fn test_from_env_honors_model_name_vars() {
        // Single test for all env reads; parallel tests in this module
        // must not touch the process environment.
        env::set_var("OPENAI_API_KEY", "sk-env-test");
        env::set_var("DRUG_EXTRACTOR_MODEL_NAME", "custom-vision-model");
        env::set_var("INTENT_MODEL_NAME", "custom-intent-model");
        env::set_var("LOG_JSON", "true");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.drug_extractor_model, "custom-vision-model");
        assert_eq!(settings.intent_model, "custom-intent-model");
        // Unset stages keep the shared chat default.
        assert_eq!(settings.responder_model, DEFAULT_CHAT_MODEL);
        assert!(settings.log_json);

        env::remove_var("OPENAI_API_KEY");
        env::remove_var("DRUG_EXTRACTOR_MODEL_NAME");
        env::remove_var("INTENT_MODEL_NAME");
        env::remove_var("LOG_JSON");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut settings = test_settings();
        settings.redis_password = Some("hunter2".into());
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
