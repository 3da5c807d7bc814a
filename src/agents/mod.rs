//! The three agents around the blackboard: planner, executor, synthesizer.
//!
//! This module also defines the planner's wire schema (`Action`,
//! `PlannerOutput`), shared by the planner (which produces it through the
//! language model) and the executor (which applies it to the index).

pub mod executor;
pub mod planner;
pub mod synthesizer;

pub use executor::ExecutorAgent;
pub use planner::PlannerAgent;
pub use synthesizer::SynthesizerAgent;

use serde::{Deserialize, Serialize};

use crate::blackboard::BlackboardPatch;

fn default_top_k() -> usize {
    5
}

/// A planned query against the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Resolve one symbol reference and store its evidence.
    #[serde(rename = "OPEN_SYMBOL")]
    OpenSymbol {
        symbol_ref: String,
        #[serde(default)]
        hint_file: Option<String>,
        #[serde(default)]
        purpose: String,
    },

    /// Resolver lookup plus textual grep; the top definition hit is
    /// opened automatically.
    #[serde(rename = "HYBRID_SEARCH")]
    HybridSearch {
        query: String,
        #[serde(default)]
        hint_file: Option<String>,
        #[serde(default = "default_top_k")]
        top_k: usize,
        #[serde(default)]
        purpose: String,
    },

    /// Literal grep for occurrences of a needle.
    #[serde(rename = "FIND_USAGES")]
    FindUsages {
        needle: String,
        #[serde(default = "default_top_k")]
        top_k: usize,
        #[serde(default)]
        purpose: String,
    },
}

/// What the planner returns each iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerOutput {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub blackboard_patch: BlackboardPatch,
}

/// Actions per planner pass after post-filtering.
pub const MAX_ACTIONS_PER_PLAN: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_deserialize_from_the_wire_shape() {
        let raw = r#"{
            "actions": [
                {"type": "OPEN_SYMBOL", "symbol_ref": "core.validators.validate_numeric_range"},
                {"type": "HYBRID_SEARCH", "query": "aggregate_metrics", "top_k": 3},
                {"type": "FIND_USAGES", "needle": "transform_data_structure"}
            ],
            "stop": false,
            "reason": "need definitions"
        }"#;
        let out: PlannerOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(out.actions.len(), 3);
        match &out.actions[0] {
            Action::OpenSymbol { symbol_ref, hint_file, .. } => {
                assert_eq!(symbol_ref, "core.validators.validate_numeric_range");
                assert!(hint_file.is_none());
            }
            _ => panic!("expected OPEN_SYMBOL"),
        }
        match &out.actions[1] {
            Action::HybridSearch { top_k, .. } => assert_eq!(*top_k, 3),
            _ => panic!("expected HYBRID_SEARCH"),
        }
        match &out.actions[2] {
            Action::FindUsages { top_k, .. } => assert_eq!(*top_k, 5),
            _ => panic!("expected FIND_USAGES default top_k"),
        }
        assert!(out.blackboard_patch.is_empty());
    }
}
