//! Configuration for the comprehension engine.
//!
//! Layered settings:
//! - Default values
//! - `codescout.toml` in the working directory
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Variables are prefixed with `CODESCOUT_` and use double underscores to
//! separate nested levels:
//! - `CODESCOUT_RUN__MAX_ITERS=5` sets `run.max_iters`
//! - `CODESCOUT_LLM__ENDPOINT=...` sets `llm.endpoint`
//! - `CODESCOUT_RESOLVER__PREFERRED_LIBRARIES=...` sets the resolver tie-break list

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "codescout.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Per-run defaults, overridable from the CLI
    #[serde(default)]
    pub run: RunConfig,

    /// Language-model client settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Symbol-resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Diagnostic logging levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RunConfig {
    /// Directory the run writes its artifacts into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum planner passes before forced synthesis
    #[serde(default = "default_max_iters")]
    pub max_iters: usize,

    /// Model used for planning
    #[serde(default = "default_model")]
    pub planner_model: String,

    /// Model used for the final explanation
    #[serde(default = "default_model")]
    pub synth_model: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat-completions API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature for schema-constrained calls
    #[serde(default = "default_structured_temperature")]
    pub structured_temperature: f32,

    /// Sampling temperature for free-text calls
    #[serde(default = "default_text_temperature")]
    pub text_temperature: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    /// Ordered substrings that break ties toward auxiliary-library
    /// definitions when several qualified names match a reference.
    /// An empty list is valid and leaves only the length tie-breaks.
    #[serde(default = "default_preferred_libraries")]
    pub preferred_libraries: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `resolver = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./_agent_out")
}
fn default_max_iters() -> usize {
    3
}
fn default_model() -> String {
    "deepseek-chat".to_string()
}
fn default_endpoint() -> String {
    "https://api.deepseek.com".to_string()
}
fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_structured_temperature() -> f32 {
    0.1
}
fn default_text_temperature() -> f32 {
    0.2
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_preferred_libraries() -> Vec<String> {
    vec!["sklearn".to_string(), "xgboost".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            run: RunConfig::default(),
            llm: LlmConfig::default(),
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_iters: default_max_iters(),
            planner_model: default_model(),
            synth_model: default_model(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            structured_temperature: default_structured_temperature(),
            text_temperature: default_text_temperature(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            preferred_libraries: default_preferred_libraries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration with an explicit TOML file path.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CODESCOUT_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }
}
