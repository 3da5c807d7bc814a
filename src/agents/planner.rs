//! Planner agent.
//!
//! Summarizes the blackboard into a compact JSON document, submits it to
//! the language model under a schema constraint, and post-filters the
//! returned actions. The post-filter is the dedup safeguard the rest of
//! the system relies on: the prompt restates the rules but cannot be
//! trusted alone.

use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::agents::{Action, MAX_ACTIONS_PER_PLAN, PlannerOutput};
use crate::blackboard::{Blackboard, SymbolStatus, is_builtin};
use crate::error::{LlmError, LlmResult};
use crate::llm::LanguageModel;
use crate::parsing::paths::module_from_loose_path;
use crate::types::short_name;

const PLANNER_SYSTEM: &str = "\
You are the Planner of an evidence-driven code comprehension loop.
Input: a blackboard summary and the current focus context.
Output must match the schema (actions / stop / reason / blackboard_patch).

Goal: assemble the minimal sufficient evidence set that lets the
Synthesizer explain the key logic of current_focus without hedging. Do
not chase every call; expand only dependencies that change the
explanation.

Hard constraints:
1) Judge only from evidence already on the blackboard; a symbol without
   definition evidence is an information gap.
2) Start the reason field with a concrete draft explanation of
   current_focus based on its snippet and control flow.
3) Plan a query only for gaps that meet the expansion criteria below.
4) Query priority: OPEN_SYMBOL > HYBRID_SEARCH > FIND_USAGES.
5) Plan all necessary actions in one pass (at most 10).
6) Dedup (strictly enforced): before planning any OPEN_SYMBOL, check
   resolved_symbols and resolved_short_names. Never plan an OPEN_SYMBOL
   for a symbol whose full name is in resolved_symbols, whose short name
   is in resolved_short_names, or that appears in ignored_symbols /
   ignored_short_names. At most one OPEN_SYMBOL per symbol_ref per pass.
   A resolved symbol already has full definition evidence; to expand its
   dependencies, look at its extracted_calls instead.
7) stop=true when the evidence suffices to explain current_focus, or
   when the dedup constraints leave no plannable action.

Expansion criteria (any one suffices):
A. The call determines the core output, side effect, or state update.
B. Its return value or exceptions change the branch taken.
C. Key data is handed to it and the snippet cannot reveal the rule.
D. The user's question points at it directly.
E. It recurs on the critical path and affects the conclusion.

Ignore by default: builtins, logging, string plumbing, argument
forwarding, exception types (unless criterion B or D applies).

all_unresolved_calls is a pool of candidate gaps, not a todo list.";

/// JSON schema the planner's output must satisfy.
pub fn planner_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "actions": {
                "type": "array",
                "maxItems": MAX_ACTIONS_PER_PLAN,
                "items": {
                    "type": "object",
                    "properties": {
                        "type": {"type": "string", "enum": ["OPEN_SYMBOL", "HYBRID_SEARCH", "FIND_USAGES"]},
                        "symbol_ref": {"type": "string"},
                        "hint_file": {"type": "string"},
                        "query": {"type": "string"},
                        "needle": {"type": "string"},
                        "top_k": {"type": "integer"},
                        "purpose": {"type": "string"}
                    },
                    "required": ["type"]
                }
            },
            "stop": {"type": "boolean"},
            "reason": {"type": "string"},
            "blackboard_patch": {
                "type": "object",
                "properties": {
                    "current_focus": {"type": "string"},
                    "add_frontier": {"type": "array", "items": {"type": "string"}},
                    "mark_unresolved": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "symbol": {"type": "string"},
                                "reason": {"type": "string"}
                            },
                            "required": ["symbol"]
                        }
                    }
                }
            }
        },
        "required": ["stop", "reason"]
    })
}

/// Compact JSON view of the blackboard for the planner prompt.
pub fn build_summary(bb: &Blackboard) -> Value {
    let resolved = bb.resolved_names();
    let unresolved: Vec<String> = bb
        .symbols
        .iter()
        .filter(|(_, s)| matches!(s.status, Some(SymbolStatus::Unresolved(_))))
        .map(|(k, _)| k.clone())
        .collect();

    let mut ignored_symbols = Vec::new();
    let mut ignored_full = Vec::new();
    for (name, state) in &bb.symbols {
        if let Some(SymbolStatus::Unresolved(u)) = &state.status {
            if u.ignored {
                ignored_symbols.push(json!({
                    "qualname": name,
                    "reason": u.reason,
                    "note": u.note.clone().unwrap_or_default(),
                }));
                ignored_full.push(name.clone());
            }
        }
    }
    let ignored_names = bb.ignored_names();

    let is_ignored_call = |call: &str| {
        ignored_full
            .iter()
            .any(|n| n == call || n.ends_with(&format!(".{call}")))
    };

    // Frontier cleaning mirrors the deletion set enforced on writes, so
    // the planner never sees stale candidates.
    let cleaned_frontier: Vec<&String> = bb
        .frontier
        .iter()
        .take(25)
        .filter(|f| {
            let is_resolved = resolved
                .iter()
                .any(|s| s == *f || s.ends_with(&format!(".{f}")));
            !is_resolved && !ignored_names.contains(f) && !unresolved.contains(f)
        })
        .collect();

    // First resolved full name per short name.
    let mut short_to_full: BTreeMap<&str, &str> = BTreeMap::new();
    for full in &resolved {
        short_to_full.entry(short_name(full)).or_insert(full);
    }

    let focus_ev = bb.symbols.get(&bb.current_focus).and_then(|s| s.evidence());
    let (focus_snippet, focus_calls) = match focus_ev {
        Some(ev) => (
            head_lines(&ev.snippet, 40),
            ev.extracted_calls.clone(),
        ),
        None => (String::new(), Vec::new()),
    };

    let mut focus_resolved_calls = Vec::new();
    let mut focus_unresolved_calls = Vec::new();
    for call in &focus_calls {
        if is_builtin(call) || call.contains('.') || is_ignored_call(call) {
            continue;
        }
        match short_to_full.get(call.as_str()) {
            Some(full) => focus_resolved_calls.push(format!("{call} -> {full}")),
            None => focus_unresolved_calls.push(call.clone()),
        }
    }

    // Every unresolved call across resolved evidence, with its source
    // contexts and the modules those sources suggest.
    let mut all_unresolved: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (sym_name, state) in &bb.symbols {
        let Some(ev) = state.evidence() else { continue };
        for call in &ev.extracted_calls {
            if is_builtin(call) || call.contains('.') || is_ignored_call(call) {
                continue;
            }
            let already_resolved = short_to_full.contains_key(call.as_str())
                || resolved
                    .iter()
                    .any(|r| r == call || r.ends_with(&format!(".{call}")));
            if already_resolved {
                continue;
            }
            all_unresolved.entry(call.clone()).or_default().push(json!({
                "source": sym_name,
                "file": ev.defined_in,
                "source_kind": ev.source,
            }));
        }
    }
    let all_unresolved_list: Vec<Value> = all_unresolved
        .iter()
        .take(30)
        .map(|(call, sources)| {
            let possible_modules: BTreeSet<String> = sources
                .iter()
                .filter_map(|s| s["file"].as_str())
                .filter(|f| !f.is_empty())
                .map(module_from_loose_path)
                .collect();
            json!({
                "call": call,
                "sources": sources.iter().take(3).collect::<Vec<_>>(),
                "possible_modules": possible_modules.iter().take(2).collect::<Vec<_>>(),
            })
        })
        .collect();

    let resolved_short_names: BTreeSet<&str> = resolved.iter().map(|r| short_name(r)).collect();

    let resolved_evidence_summary: Vec<Value> = resolved
        .iter()
        .take(50)
        .filter_map(|name| bb.symbols.get(name).and_then(|s| s.evidence()))
        .map(|ev| {
            json!({
                "qualname": ev.symbol_ref,
                "defined_in": ev.defined_in,
                "span": [ev.span.0, ev.span.1],
                "source": ev.source,
                "snippet_head": truncate_chars(&head_lines(&ev.snippet, 40), 2000),
                "extracted_calls": ev.extracted_calls,
            })
        })
        .collect();

    json!({
        "target": bb.target,
        "current_focus": bb.current_focus,
        "frontier_top": cleaned_frontier.iter().take(20).collect::<Vec<_>>(),
        "resolved_count": resolved.len(),
        "unresolved_count": unresolved.len(),
        "resolved_symbols": resolved,
        "resolved_short_names": resolved_short_names,
        "resolved_evidence_summary": resolved_evidence_summary,
        "ignored_symbols": ignored_symbols,
        "ignored_short_names": ignored_names.iter().collect::<BTreeSet<_>>(),
        "unresolved": unresolved.iter().take(30).collect::<Vec<_>>(),
        "focus_evidence": {
            "defined_in": focus_ev.map(|ev| ev.defined_in.clone()),
            "span": focus_ev.map(|ev| vec![ev.span.0, ev.span.1]),
            "source": focus_ev.map(|ev| ev.source),
            "snippet_head": focus_snippet,
            "extracted_calls": focus_calls.iter().take(15).collect::<Vec<_>>(),
            "resolved_calls": focus_resolved_calls,
            "unresolved_calls": focus_unresolved_calls,
        },
        "all_unresolved_calls": all_unresolved_list,
    })
}

fn user_prompt(bb: &Blackboard, hint_file: Option<&str>, explanation_prompt: Option<&str>) -> String {
    let summary = serde_json::to_string_pretty(&build_summary(bb)).unwrap_or_default();
    let custom = match explanation_prompt {
        Some(text) => format!(
            "\n\nUser instructions for the final explanation:\n{text}\n\n\
             Adjust which dependencies to expand, and how deep, accordingly."
        ),
        None => String::new(),
    };
    format!(
        "blackboard_summary:\n{summary}\n\nhint_file (relative path, may be empty):\n{}{custom}\n\n\
         Task:\n\
         - Draft a concrete explanation of current_focus from focus_evidence.snippet_head \
           (put it at the start of reason).\n\
         - Then decide whether any definitions are missing for a complete, unhedged \
           explanation. Check focus_evidence.unresolved_calls first, then pick from \
           all_unresolved_calls only what affects the explanation.\n\
         - Dedup rules are strict: never plan an OPEN_SYMBOL for anything listed in \
           resolved_symbols, resolved_short_names, ignored_symbols, or ignored_short_names.\n\
         - When a possible_modules entry suggests a full path, use \
           OPEN_SYMBOL(symbol_ref=<module>.<name>); otherwise use HYBRID_SEARCH.\n\
         - stop=true with actions=[] when the evidence suffices, or when dedup leaves \
           nothing to plan.\n\
         - blackboard_patch may add_frontier / mark_unresolved / move current_focus.",
        hint_file.unwrap_or("")
    )
}

/// Drop planned OpenSymbol actions whose target is already resolved or
/// ignored (by full name, short name, or suffix), cap the action count,
/// and force stop when filtering empties a non-stop plan.
///
/// Contract after this filter: no OpenSymbol targets a symbol for which
/// evidence already exists or that is ignored.
pub fn filter_planned_actions(bb: &Blackboard, mut out: PlannerOutput) -> PlannerOutput {
    let resolved = bb.resolved_names();
    let resolved_short = bb.resolved_short_names();
    let ignored = bb.ignored_names();
    let ignored_full: Vec<String> = bb
        .symbols
        .iter()
        .filter(|(_, s)| s.is_ignored())
        .map(|(k, _)| k.clone())
        .collect();

    let mut kept = Vec::new();
    for action in out.actions {
        if let Action::OpenSymbol { symbol_ref, .. } = &action {
            let sym = symbol_ref.as_str();
            if sym.is_empty() {
                continue;
            }
            let short = short_name(sym);
            let is_resolved = resolved.iter().any(|r| r == sym)
                || resolved_short.iter().any(|s| s == short)
                || resolved
                    .iter()
                    .any(|r| r.ends_with(&format!(".{sym}")) || r == sym);
            if is_resolved {
                debug!("planner filter dropped resolved target {sym}");
                continue;
            }
            let is_ignored = ignored.iter().any(|n| n == sym || n == short)
                || ignored_full
                    .iter()
                    .any(|n| n.ends_with(&format!(".{sym}")) || n == sym);
            if is_ignored {
                debug!("planner filter dropped ignored target {sym}");
                continue;
            }
        }
        kept.push(action);
    }
    kept.truncate(MAX_ACTIONS_PER_PLAN);

    if kept.is_empty() && !out.stop {
        out.stop = true;
        out.reason.push_str(
            "\n\n[auto-stop] Every planned action targeted an already-resolved \
             or ignored symbol; nothing new to query.",
        );
    }
    out.actions = kept;
    out
}

/// Planner agent. The language model is injected so tests can script it.
pub struct PlannerAgent<'m, M: LanguageModel> {
    llm: &'m M,
    model: String,
    explanation_prompt: Option<String>,
}

impl<'m, M: LanguageModel> PlannerAgent<'m, M> {
    pub fn new(llm: &'m M, model: impl Into<String>, explanation_prompt: Option<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            explanation_prompt,
        }
    }

    pub async fn plan(&self, bb: &Blackboard, hint_file: Option<&str>) -> LlmResult<PlannerOutput> {
        let user = user_prompt(bb, hint_file, self.explanation_prompt.as_deref());
        let mut system = PLANNER_SYSTEM.to_string();
        if let Some(text) = &self.explanation_prompt {
            system.push_str(&format!(
                "\n\nUser instructions for the final explanation:\n{text}\n\n\
                 Adjust your planning strategy and depth accordingly."
            ));
        }

        let raw = self
            .llm
            .structured(&self.model, &system, &user, &planner_schema())
            .await?;
        let out: PlannerOutput = serde_json::from_value(raw).map_err(|e| LlmError::Schema {
            reason: e.to_string(),
            head: String::new(),
        })?;
        Ok(filter_planned_actions(bb, out))
    }
}

fn head_lines(s: &str, n: usize) -> String {
    s.lines().take(n).collect::<Vec<_>>().join("\n")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Evidence, SourceKind, SymbolKind};

    fn evidence(name: &str, file: &str, calls: &[&str]) -> Evidence {
        Evidence {
            symbol_ref: name.to_string(),
            kind: SymbolKind::Function,
            defined_in: file.to_string(),
            span: (1, 4),
            snippet: format!("def {}():\n    pass", short_name(name)),
            extracted_calls: calls.iter().map(|c| c.to_string()).collect(),
            source: SourceKind::MainRepo,
        }
    }

    fn open(sym: &str) -> Action {
        Action::OpenSymbol {
            symbol_ref: sym.to_string(),
            hint_file: None,
            purpose: String::new(),
        }
    }

    #[test]
    fn filter_drops_resolved_targets_by_full_short_and_suffix() {
        let mut bb = Blackboard::new("/repo", "pkg.mod.f");
        bb.add_evidence(evidence("core.validators.validate_numeric_range", "core/validators.py", &[]));

        let out = PlannerOutput {
            actions: vec![
                open("core.validators.validate_numeric_range"),
                open("validate_numeric_range"),
                open("validators.validate_numeric_range"),
                open("core.computations.compute_statistical_summary"),
            ],
            stop: false,
            reason: "r".to_string(),
            blackboard_patch: Default::default(),
        };
        let filtered = filter_planned_actions(&bb, out);
        assert_eq!(filtered.actions.len(), 1);
        match &filtered.actions[0] {
            Action::OpenSymbol { symbol_ref, .. } => {
                assert_eq!(symbol_ref, "core.computations.compute_statistical_summary");
            }
            _ => panic!("expected OPEN_SYMBOL"),
        }
        assert!(!filtered.stop);
    }

    #[test]
    fn filter_forces_stop_when_everything_is_dropped() {
        let mut bb = Blackboard::new("/repo", "pkg.mod.f");
        bb.add_evidence(evidence("core.validators.validate_numeric_range", "core/validators.py", &[]));

        let out = PlannerOutput {
            actions: vec![open("validate_numeric_range")],
            stop: false,
            reason: "keep digging".to_string(),
            blackboard_patch: Default::default(),
        };
        let filtered = filter_planned_actions(&bb, out);
        assert!(filtered.actions.is_empty());
        assert!(filtered.stop);
        assert!(filtered.reason.contains("[auto-stop]"));
    }

    #[test]
    fn filter_drops_ignored_targets_but_keeps_other_action_kinds() {
        let mut bb = Blackboard::new("/repo", "t");
        bb.mark_unresolved("validate_data", "miss");
        bb.mark_unresolved("validate_data", "miss");
        assert!(bb.symbols["validate_data"].is_ignored());

        let out = PlannerOutput {
            actions: vec![
                open("validate_data"),
                Action::FindUsages {
                    needle: "validate_data".to_string(),
                    top_k: 5,
                    purpose: String::new(),
                },
            ],
            stop: false,
            reason: String::new(),
            blackboard_patch: Default::default(),
        };
        let filtered = filter_planned_actions(&bb, out);
        assert_eq!(filtered.actions.len(), 1);
        assert!(matches!(filtered.actions[0], Action::FindUsages { .. }));
    }

    #[test]
    fn filter_caps_action_count() {
        let bb = Blackboard::new("/repo", "t");
        let actions: Vec<Action> = (0..15).map(|i| open(&format!("pkg.f{i}"))).collect();
        let out = PlannerOutput {
            actions,
            stop: false,
            reason: String::new(),
            blackboard_patch: Default::default(),
        };
        let filtered = filter_planned_actions(&bb, out);
        assert_eq!(filtered.actions.len(), MAX_ACTIONS_PER_PLAN);
    }

    #[test]
    fn summary_partitions_focus_calls_and_collects_gaps() {
        let mut bb = Blackboard::new("/repo", "processors.pipeline.process_data_pipeline");
        bb.add_evidence(evidence(
            "processors.pipeline.process_data_pipeline",
            "processors/pipeline.py",
            &["_initialize_processing_state", "transform_data_structure", "len"],
        ));
        bb.add_evidence(evidence(
            "core.transformers.transform_data_structure",
            "core/transformers.py",
            &["validate_string_format"],
        ));
        bb.current_focus = "processors.pipeline.process_data_pipeline".to_string();

        let summary = build_summary(&bb);
        assert_eq!(summary["resolved_count"], 2);
        let resolved_calls = summary["focus_evidence"]["resolved_calls"]
            .as_array()
            .unwrap();
        assert_eq!(
            resolved_calls[0],
            "transform_data_structure -> core.transformers.transform_data_structure"
        );
        let unresolved_calls = summary["focus_evidence"]["unresolved_calls"]
            .as_array()
            .unwrap();
        assert_eq!(unresolved_calls[0], "_initialize_processing_state");

        let gaps = summary["all_unresolved_calls"].as_array().unwrap();
        let names: Vec<&str> = gaps.iter().map(|g| g["call"].as_str().unwrap()).collect();
        assert!(names.contains(&"_initialize_processing_state"));
        assert!(names.contains(&"validate_string_format"));
        // Builtins never surface as gaps.
        assert!(!names.contains(&"len"));

        let first = gaps
            .iter()
            .find(|g| g["call"] == "validate_string_format")
            .unwrap();
        assert_eq!(
            first["possible_modules"][0].as_str().unwrap(),
            "core.transformers"
        );
    }

    #[test]
    fn summary_frontier_is_cleaned_and_capped() {
        let mut bb = Blackboard::new("/repo", "t");
        bb.add_evidence(evidence("pkg.mod.known", "pkg/mod.py", &[]));
        bb.frontier = (0..30).map(|i| format!("cand{i}")).collect();
        bb.frontier.insert(0, "known".to_string());

        let summary = build_summary(&bb);
        let frontier = summary["frontier_top"].as_array().unwrap();
        assert_eq!(frontier.len(), 20);
        assert!(frontier.iter().all(|f| f != "known"));
    }
}
