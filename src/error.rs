//! Error types for the comprehension engine.
//!
//! Structured errors via thiserror, one enum per subsystem, with result
//! aliases. `RunError` owns the process exit-code mapping.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or querying the repository index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to initialize Python parser: {reason}")]
    ParserInit { reason: String },

    /// The file's tree contains syntax errors. Recorded per file during
    /// the build; never aborts a run.
    #[error("Syntax error in '{path}'")]
    SyntaxError { path: PathBuf },
}

/// Errors from the language-model boundary. All of these are fatal to the
/// run once the loop has started.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Missing required environment variable: {0}")]
    MissingApiKey(String),

    #[error("API key from {var} contains characters that cannot form an HTTP header")]
    BadApiKey { var: String },

    #[error("Invalid LLM endpoint '{endpoint}': must start with http:// or https://")]
    InvalidEndpoint { endpoint: String },

    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM returned HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
        snippet: String,
    },

    #[error("LLM response had no usable choices")]
    EmptyChoices,

    #[error("Failed to parse structured output: {reason}. First 300 chars: {head}")]
    Schema { reason: String, head: String },
}

/// Top-level run failure. Maps onto the CLI exit codes.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Cannot resolve target symbol: {target}")]
    TargetUnresolved { target: String },

    #[error("Failed to write artifact '{path}': {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RunError {
    /// Process exit code for this failure. An unresolved bootstrap target
    /// exits 2; everything else exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::TargetUnresolved { .. } => 2,
            _ => 1,
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
pub type LlmResult<T> = Result<T, LlmError>;
pub type RunResult<T> = Result<T, RunError>;
