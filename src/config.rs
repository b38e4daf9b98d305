//! Process configuration read from the environment

use crate::llm::{parse_model_id, LlmConfig, LlmError};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODEL: &str = "openai:gpt-4.1";
const DEFAULT_MAX_ROUNDS: usize = 8;
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

/// Which tool set and instructions the agent runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentProfile {
    /// `add_proverbs` and `get_weather`, static "Be fun!" instructions
    Basic,
    /// All four tools, instructions rendered from state
    #[default]
    Curated,
}

impl FromStr for AgentProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "curated" => Ok(Self::Curated),
            other => Err(format!("unknown agent profile '{other}'")),
        }
    }
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Unparseable values mean the default
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Everything `main` needs to assemble the server
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub profile: AgentProfile,
    pub max_rounds: usize,
    pub turn_timeout: Duration,
    /// Idle time after which a session and its state are discarded
    pub session_idle_ttl: Duration,
    pub max_tokens: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model: DEFAULT_MODEL.to_string(),
            openai_api_key: None,
            openai_base_url: None,
            profile: AgentProfile::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            turn_timeout: Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS),
            session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
            max_tokens: None,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values fall back to
    /// their defaults; an unsupported model provider is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model = var("AGENT_MODEL").unwrap_or(defaults.model);
        parse_model_id(&model)?;

        let max_rounds = parsed(&var, "AGENT_MAX_ROUNDS", defaults.max_rounds);
        let max_rounds = if max_rounds == 0 {
            tracing::warn!("AGENT_MAX_ROUNDS must be at least 1, using default");
            DEFAULT_MAX_ROUNDS
        } else {
            max_rounds
        };

        Ok(Self {
            host: var("AGENT_HOST").unwrap_or(defaults.host),
            port: parsed(&var, "AGENT_PORT", defaults.port),
            model,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL"),
            profile: parsed(&var, "AGENT_PROFILE", defaults.profile),
            max_rounds,
            turn_timeout: positive_secs(
                &var,
                "AGENT_TURN_TIMEOUT_SECS",
                DEFAULT_TURN_TIMEOUT_SECS,
            ),
            session_idle_ttl: positive_secs(
                &var,
                "AGENT_SESSION_IDLE_SECS",
                DEFAULT_SESSION_IDLE_SECS,
            ),
            max_tokens: var("AGENT_MAX_TOKENS").and_then(|raw| match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(value = %raw, "Ignoring unparseable AGENT_MAX_TOKENS");
                    None
                }
            }),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            model: self.model.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_base_url: self.openai_base_url.clone(),
            request_timeout: self.turn_timeout,
        }
    }
}

fn parsed<T, F>(var: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %raw, error = %e, "Unparseable value, using default");
            default
        }),
    }
}

/// A non-zero number of seconds; zero falls back to the default
fn positive_secs<F>(var: &F, key: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parsed(var, key, default);
    if secs == 0 {
        tracing::warn!(key, "Must be at least 1 second, using default");
        return Duration::from_secs(default);
    }
    Duration::from_secs(secs)
}
