// ---------------------------------------------------------------------------
// config.rs — Process-wide configuration, read once from the environment
// ---------------------------------------------------------------------------

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default token budget per content chunk during schema-guided extraction.
pub const DEFAULT_CHUNK_TOKEN_THRESHOLD: usize = 1000;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown LLM provider '{0}' (expected 'gemini' or 'openai')")]
    UnknownProvider(String),

    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// LLM provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    OpenAi,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenAi => "openai",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-2.0-flash-lite",
            LlmProvider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            LlmProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Provider-specific credential variables, checked after `LLM_API_KEY` / `API_KEY`.
    fn key_vars(self) -> &'static [&'static str] {
        match self {
            LlmProvider::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            LlmProvider::OpenAi => &["OPENAI_API_KEY"],
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    /// `None` is tolerated at startup; every completion then fails with an auth error.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmSettings,
    pub chunk_token_threshold: usize,
    pub allow_private_hosts: bool,
    pub static_dir: PathBuf,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = match var("LLM_PROVIDER") {
            Some(p) => p.parse()?,
            None => LlmProvider::Gemini,
        };

        let api_key = ["LLM_API_KEY", "API_KEY"]
            .iter()
            .chain(provider.key_vars())
            .find_map(|&name| var(name));

        let llm = LlmSettings {
            provider,
            model: var("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
            base_url: var("LLM_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            timeout: Duration::from_secs(parse_var(
                &var,
                "LLM_TIMEOUT_SECS",
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
        };

        let chunk_token_threshold =
            parse_var(&var, "CHUNK_TOKEN_THRESHOLD", DEFAULT_CHUNK_TOKEN_THRESHOLD)?;
        if chunk_token_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                name: "CHUNK_TOKEN_THRESHOLD",
                value: "0".into(),
            });
        }

        Ok(Self {
            llm,
            chunk_token_threshold,
            allow_private_hosts: parse_var(&var, "CRAWL_ALLOW_PRIVATE_HOSTS", false)?,
            static_dir: var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            port: parse_var(&var, "PORT", DEFAULT_PORT)?,
        })
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}
