use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::gemini::DEFAULT_BASE_URL;
use crate::rate_limit::RateLimitConfig;

// Checked in order, first non-empty value wins
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "VITE_GEMINI_KEY"];
pub const MODEL_VARS: [&str; 2] = ["GEMINI_MODEL", "VITE_GEMINI_MODEL"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read profile {path}: {source}")]
    ProfileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("profile {path} is not valid JSON: {source}")]
    ProfileParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "folio-gateway")]
#[command(about = "Rate-limited AI chat gateway for a portfolio site")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the proxy endpoint
    Serve(ServeArgs),
    /// Ask a single question through the proxy
    Ask(AskArgs),
    /// Interactive chat through the proxy
    Chat(ClientArgs),
    /// Ask for an interview question
    Challenge(ClientArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Minimum spacing between requests from one client
    #[arg(long, default_value_t = RateLimitConfig::SERVER.min_interval_ms)]
    pub min_interval_ms: i64,

    #[arg(long, default_value_t = RateLimitConfig::SERVER.max_per_minute)]
    pub max_per_minute: usize,

    #[arg(long, default_value_t = RateLimitConfig::SERVER.max_per_day)]
    pub max_per_day: usize,

    // Seconds between idle-entry sweeps, 0 disables
    #[arg(long, default_value_t = 600)]
    pub sweep_interval: u64,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub backend_url: String,

    // Per-model backend timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub backend_timeout: u64,
}

impl ServeArgs {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            min_interval_ms: self.min_interval_ms,
            max_per_minute: self.max_per_minute,
            max_per_day: self.max_per_day,
        }
    }

    pub fn sweep_every(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval))
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ClientArgs {
    #[arg(long, default_value = "http://localhost:8080/api/gemini")]
    pub proxy_url: String,

    // Where the local rate history is kept
    #[arg(long, default_value = ".folio-gateway")]
    pub state_dir: PathBuf,

    // Portfolio profile JSON used for the default system instruction
    #[arg(long)]
    pub profile: Option<PathBuf>,

    // Proxy timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub request_timeout: u64,

    // Local development: call the backend directly if the proxy route is missing
    #[arg(long)]
    pub dev_fallback: bool,

    // Timeout for direct backend calls in seconds
    #[arg(long, default_value_t = 30)]
    pub dev_fallback_timeout: u64,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub backend_url: String,

    #[arg(long, default_value_t = RateLimitConfig::CLIENT.min_interval_ms)]
    pub min_interval_ms: i64,

    #[arg(long, default_value_t = RateLimitConfig::CLIENT.max_per_minute)]
    pub max_per_minute: usize,

    #[arg(long, default_value_t = RateLimitConfig::CLIENT.max_per_day)]
    pub max_per_day: usize,
}

impl ClientArgs {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            min_interval_ms: self.min_interval_ms,
            max_per_minute: self.max_per_minute,
            max_per_day: self.max_per_day,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AskArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    pub prompt: String,

    // Overrides the default system instruction
    #[arg(long)]
    pub system: Option<String>,
}

/// Backend credential and preferred model, read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendEnv {
    pub api_key: Option<String>,
    pub preferred_model: Option<String>,
}

impl BackendEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: first_non_empty(&lookup, &API_KEY_VARS),
            preferred_model: first_non_empty(&lookup, &MODEL_VARS),
        }
    }
}

fn first_non_empty(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|&key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
