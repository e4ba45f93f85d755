//! Application settings and configuration types.
//!
//! Settings are layered: built-in defaults, then an optional JSON file
//! (`MAILROOM_CONFIG`, or `settings.json` in the platform config directory),
//! then environment variables. A `.env` file is loaded first when present.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::providers::ai::{DEFAULT_SENTIMENT_MODEL, DEFAULT_ZERO_SHOT_MODEL};

/// Environment variable naming an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "MAILROOM_CONFIG";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub gmail: GmailSettings,
    pub ai: AiSettings,
    pub scheduler: SchedulerSettings,
}

/// HTTP server and middleware configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the API listens on.
    pub bind_addr: SocketAddr,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// When set, requests must carry a matching `x-api-key` header.
    pub api_key: Option<String>,
    /// Requests allowed per client IP per minute.
    pub rate_limit_per_minute: u32,
    /// Key rate limits on `x-forwarded-for`/`x-real-ip` instead of the peer
    /// address. Only enable behind a proxy that overwrites these headers.
    pub trust_proxy_headers: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            api_key: None,
            rate_limit_per_minute: 120,
            trust_proxy_headers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// `sqlite://` URL, plain path or `:memory:`.
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:///./emails.db".to_string(),
        }
    }
}

/// Gmail fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailSettings {
    /// Authorized-user token file for live fetches.
    pub token_path: PathBuf,
    /// Sample message file; the bundled set is used when unset.
    pub sample_path: Option<PathBuf>,
    /// Messages requested per fetch.
    pub max_results: u32,
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            sample_path: None,
            max_results: 50,
        }
    }
}

/// Hosted model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Override for OpenAI-compatible endpoints.
    pub openai_base_url: Option<String>,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub huggingface_api_key: Option<String>,
    pub zero_shot_model: String,
    pub sentiment_model: String,
    /// Explicit switch for the hosted classifier. Defaults to on when a
    /// Hugging Face token is present.
    pub enable_ml_classifier: Option<bool>,
    pub request_timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: None,
            google_api_key: None,
            gemini_model: "gemini-pro".to_string(),
            huggingface_api_key: None,
            zero_shot_model: DEFAULT_ZERO_SHOT_MODEL.to_string(),
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
            enable_ml_classifier: None,
            request_timeout_secs: 15,
        }
    }
}

impl AiSettings {
    /// Whether the hosted classifier should be used.
    pub fn ml_classifier_enabled(&self) -> bool {
        self.huggingface_api_key.is_some() && self.enable_ml_classifier.unwrap_or(true)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Schedule every eligible account at startup.
    pub autostart: bool,
}

impl Settings {
    /// Loads settings from `.env`, the settings file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }

        let mut settings = match settings_file() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading settings file");
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Reads settings from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from `lookup`, usually the process environment.
    ///
    /// Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = get("BIND_ADDR") {
            self.server.bind_addr = parse("BIND_ADDR", &value)?;
        }
        if let Some(value) = get("ALLOWED_ORIGINS") {
            self.server.allowed_origins = value
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = get("API_KEY") {
            self.server.api_key = Some(value);
        }
        if let Some(value) = get("RATE_LIMIT_PER_MINUTE") {
            self.server.rate_limit_per_minute = parse("RATE_LIMIT_PER_MINUTE", &value)?;
        }
        if let Some(value) = get("TRUST_PROXY_HEADERS") {
            self.server.trust_proxy_headers = parse_bool("TRUST_PROXY_HEADERS", &value)?;
        }

        if let Some(value) = get("DATABASE_URL") {
            self.database.url = value;
        }

        if let Some(value) = get("GMAIL_TOKEN_PATH") {
            self.gmail.token_path = PathBuf::from(value);
        }
        if let Some(value) = get("SAMPLE_EMAILS_PATH") {
            self.gmail.sample_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get("GMAIL_MAX_RESULTS") {
            self.gmail.max_results = parse("GMAIL_MAX_RESULTS", &value)?;
        }

        if let Some(value) = get("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(value);
        }
        if let Some(value) = get("OPENAI_MODEL") {
            self.ai.openai_model = value;
        }
        if let Some(value) = get("OPENAI_BASE_URL") {
            self.ai.openai_base_url = Some(value);
        }
        if let Some(value) = get("GOOGLE_API_KEY") {
            self.ai.google_api_key = Some(value);
        }
        if let Some(value) = get("GEMINI_MODEL") {
            self.ai.gemini_model = value;
        }
        if let Some(value) = get("HF_API_TOKEN") {
            self.ai.huggingface_api_key = Some(value);
        }
        if let Some(value) = get("ENABLE_ML_CLASSIFIER") {
            self.ai.enable_ml_classifier = Some(parse_bool("ENABLE_ML_CLASSIFIER", &value)?);
        }

        if let Some(value) = get("SCHEDULER_AUTOSTART") {
            self.scheduler.autostart = parse_bool("SCHEDULER_AUTOSTART", &value)?;
        }

        Ok(())
    }
}

fn settings_file() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    ProjectDirs::from("", "", "mailroom").map(|dirs| dirs.config_dir().join("settings.json"))
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind_addr.to_string(), "0.0.0.0:8000");
        assert_eq!(settings.server.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(settings.server.rate_limit_per_minute, 120);
        assert!(!settings.server.trust_proxy_headers);
        assert_eq!(settings.database.url, "sqlite:///./emails.db");
        assert_eq!(settings.gmail.max_results, 50);
        assert_eq!(settings.ai.openai_model, "gpt-4o-mini");
        assert!(!settings.ai.ml_classifier_enabled());
        assert!(!settings.scheduler.autostart);
    }

    #[test]
    fn env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
                ("API_KEY", "secret"),
                ("RATE_LIMIT_PER_MINUTE", "5"),
                ("TRUST_PROXY_HEADERS", "true"),
                ("DATABASE_URL", ":memory:"),
                ("HF_API_TOKEN", "hf"),
                ("SCHEDULER_AUTOSTART", "true"),
                ("OPENAI_MODEL", "  "),
            ]))
            .unwrap();

        assert_eq!(
            settings.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(settings.server.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.server.rate_limit_per_minute, 5);
        assert!(settings.server.trust_proxy_headers);
        assert_eq!(settings.database.url, ":memory:");
        assert!(settings.ai.ml_classifier_enabled());
        assert!(settings.scheduler.autostart);
        assert_eq!(settings.ai.openai_model, "gpt-4o-mini");
    }

    #[test]
    fn ml_classifier_can_be_disabled() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[("HF_API_TOKEN", "hf"), ("ENABLE_ML_CLASSIFIER", "0")]))
            .unwrap();
        assert!(!settings.ai.ml_classifier_enabled());
    }

    #[test]
    fn invalid_env_value() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(env(&[("RATE_LIMIT_PER_MINUTE", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "RATE_LIMIT_PER_MINUTE",
                ..
            }
        ));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"rate_limit_per_minute": 10}}, "gmail": {{"max_results": 20}}}}"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.server.rate_limit_per_minute, 10);
        assert_eq!(settings.server.bind_addr.to_string(), "0.0.0.0:8000");
        assert_eq!(settings.gmail.max_results, 20);
        assert_eq!(settings.ai.request_timeout_secs, 15);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Settings::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
