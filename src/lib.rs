//! Agentic code comprehension engine.
//!
//! Given a target symbol inside a Python repository, codescout builds a
//! static symbol index, then coordinates a planner, an executor, and a
//! synthesizer around a shared blackboard until enough evidence exists
//! to produce a grounded explanation of that symbol's behavior.

pub mod agents;
pub mod blackboard;
pub mod config;
pub mod error;
pub mod indexing;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod parsing;
pub mod resolver;
pub mod search;
pub mod types;

pub use blackboard::{Blackboard, BlackboardPatch, SymbolState, SymbolStatus};
pub use config::Settings;
pub use error::{IndexError, LlmError, RunError};
pub use indexing::RepoIndex;
pub use llm::{ChatClient, LanguageModel};
pub use orchestrator::{RunOptions, run};
pub use resolver::SymbolResolver;
pub use search::SearchEngine;
pub use types::{Evidence, SourceKind, SymbolDef, SymbolKind, UsageHit};
