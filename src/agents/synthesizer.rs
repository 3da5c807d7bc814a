//! Synthesizer agent.
//!
//! Renders the final blackboard into a prompt and asks the model for a
//! Markdown explanation grounded in the resolved evidence. Output that
//! slips into hedging language is re-requested once with the forbidden
//! words named in a reinforced system prompt.

use serde_json::json;
use tracing::debug;

use crate::blackboard::Blackboard;
use crate::error::LlmResult;
use crate::llm::LanguageModel;

const SYNTH_SYSTEM: &str = "\
You are the Synthesizer, a senior engineer. Explain the call chain and
logic strictly from the definition evidence on the blackboard.

Hard constraints:
1) Every function/class/method you discuss must be resolved on the
   blackboard; cite each one as [relative/path.py:Lstart-Lend].
2) No vague or hedging language; state what the code does.
3) Structure:
   - Overview (what current_focus does)
   - Key data flow / control flow, step by step
   - Each dependency explained in evidence order, with its citation
   - A short call-chain summary";

/// Hedging words that disqualify a draft explanation.
pub const FORBIDDEN_WORDS: &[&str] = &[
    "probably",
    "maybe",
    "perhaps",
    "possibly",
    "presumably",
    "likely",
    "might",
    "seems",
    "appears",
    "unclear",
    "uncertain",
    "guess",
];

/// The forbidden words present in `text` (case-insensitive substring
/// scan, same spirit as the crude source-side filter it ports).
pub fn contains_forbidden_words(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    FORBIDDEN_WORDS
        .iter()
        .copied()
        .filter(|w| lower.contains(w))
        .collect()
}

fn synthesis_prompt(bb: &Blackboard, explanation_prompt: Option<&str>) -> String {
    let resolved_items: Vec<serde_json::Value> = bb
        .symbols
        .iter()
        .filter_map(|(name, state)| state.evidence().map(|ev| (name, ev)))
        .map(|(name, ev)| {
            json!({
                "symbol_ref": name,
                "kind": ev.kind,
                "defined_in": ev.defined_in,
                "span": [ev.span.0, ev.span.1],
                "snippet": ev.snippet,
                "extracted_calls": ev.extracted_calls,
            })
        })
        .collect();

    let payload = json!({
        "target": bb.target,
        "current_focus": bb.current_focus,
        "resolved": resolved_items,
        "frontier_remaining": bb.frontier,
    });

    let mut prompt = format!(
        "blackboard_evidence:\n{}",
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    );
    if let Some(text) = explanation_prompt {
        prompt.push_str(&format!(
            "\n\nUser instructions for the final explanation:\n{text}\n\n\
             Adjust depth, emphasis, and detail accordingly."
        ));
    }
    prompt
}

/// Synthesizer agent. The language model is injected so tests can script it.
pub struct SynthesizerAgent<'m, M: LanguageModel> {
    llm: &'m M,
    model: String,
    explanation_prompt: Option<String>,
}

impl<'m, M: LanguageModel> SynthesizerAgent<'m, M> {
    pub fn new(llm: &'m M, model: impl Into<String>, explanation_prompt: Option<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            explanation_prompt,
        }
    }

    pub async fn synthesize(&self, bb: &Blackboard) -> LlmResult<String> {
        let user = synthesis_prompt(bb, self.explanation_prompt.as_deref());
        let mut system = SYNTH_SYSTEM.to_string();
        if let Some(text) = &self.explanation_prompt {
            system.push_str(&format!(
                "\n\nUser instructions for the final explanation:\n{text}\n\n\
                 Adjust depth, emphasis, and detail accordingly."
            ));
        }

        let text = self.llm.complete(&self.model, &system, &user).await?;
        let bad = contains_forbidden_words(&text);
        if bad.is_empty() {
            return Ok(text);
        }

        debug!("explanation contained hedging words {bad:?}; re-prompting once");
        let rewrite_system = format!(
            "{system}\n\nAdditional hard constraint: never use these words: {}",
            bad.join(", ")
        );
        self.llm.complete(&self.model, &rewrite_system, &user).await
    }
}
