//! Environment-driven settings
//!
//! Everything is read once at startup. Unparseable numbers fall back to their
//! defaults with a warning rather than aborting.

use crate::conversation::EngineConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_KEY_PREFIX: &str = "sk-or-";

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    /// Explicit `OPENAI_BASE_URL`; see [`Self::base_url`] for the resolved value
    pub base_url_override: Option<String>,
    pub model: String,
    pub memory_file: PathBuf,
    pub history_file: PathBuf,
    pub port: u16,
    pub ui_dir: PathBuf,
    pub window: usize,
    pub max_iterations: usize,
    pub request_timeout: Duration,
    pub wake_word: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            api_key: None,
            base_url_override: None,
            model: "gpt-3.5-turbo".to_string(),
            memory_file: PathBuf::from("memory.json"),
            history_file: PathBuf::from("conversation_history.json"),
            port: 8000,
            ui_dir: PathBuf::from("ui"),
            window: engine.window,
            max_iterations: engine.max_iterations,
            request_timeout: Duration::from_secs(60),
            wake_word: "jarvis".to_string(),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            api_key: var("OPENAI_API_KEY"),
            base_url_override: var("OPENAI_BASE_URL"),
            model: var("JARVIS_MODEL").unwrap_or(defaults.model),
            memory_file: var("JARVIS_MEMORY_FILE").map_or(defaults.memory_file, PathBuf::from),
            history_file: var("JARVIS_HISTORY_FILE").map_or(defaults.history_file, PathBuf::from),
            port: parse_or("JARVIS_PORT", var("JARVIS_PORT"), defaults.port),
            ui_dir: var("JARVIS_UI_DIR").map_or(defaults.ui_dir, PathBuf::from),
            window: parse_or("JARVIS_WINDOW", var("JARVIS_WINDOW"), defaults.window).max(1),
            max_iterations: parse_or(
                "JARVIS_MAX_ITERATIONS",
                var("JARVIS_MAX_ITERATIONS"),
                defaults.max_iterations,
            )
            .max(1),
            request_timeout: Duration::from_secs(parse_or(
                "JARVIS_REQUEST_TIMEOUT_SECS",
                var("JARVIS_REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout.as_secs(),
            )),
            wake_word: var("WAKE_WORD")
                .map_or(defaults.wake_word, |w| w.to_lowercase()),
        }
    }

    /// Resolved backend endpoint: explicit override, else `OpenRouter` for
    /// `sk-or-` keys, else `OpenAI`
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.base_url_override {
            return url;
        }
        match &self.api_key {
            Some(key) if key.starts_with(OPENROUTER_KEY_PREFIX) => OPENROUTER_BASE_URL,
            _ => OPENAI_BASE_URL,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            window: self.window,
            max_iterations: self.max_iterations,
            ..EngineConfig::default()
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            default
        }),
    }
}
