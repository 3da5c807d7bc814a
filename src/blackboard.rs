//! The blackboard: shared state owned by one run.
//!
//! Planner, executor, and synthesizer communicate exclusively through
//! this store. Symbol state is a tagged variant in memory; the documented
//! JSON shape (status strings, `ignore_unresolved` flags, span arrays) is
//! produced only at the persistence boundary by [`Blackboard::to_json`].
//!
//! Invariants maintained here:
//! - the resolved set grows monotonically;
//! - the frontier never contains a resolved short name, an ignored
//!   short/full name, or a key of the symbols map;
//! - a symbol that fails resolution twice is ignored and leaves the
//!   frontier for good.

use indexmap::IndexMap;
use serde_json::{Value, json};
use std::path::PathBuf;

use crate::types::{Evidence, UsageHit, short_name};

/// Call names that never enter the frontier.
pub const BUILTINS: &[&str] = &[
    "len", "sum", "zip", "range", "print", "min", "max", "set", "list", "dict", "tuple", "all",
    "isinstance", "get", "str", "int", "float", "bool", "type", "hasattr", "getattr", "enumerate",
    "iter", "next", "sorted", "reversed", "any", "abs", "round", "join",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Resolution state of one tracked symbol.
#[derive(Debug, Clone)]
pub enum SymbolStatus {
    Resolved(Evidence),
    Unresolved(UnresolvedState),
}

#[derive(Debug, Clone, Default)]
pub struct UnresolvedState {
    pub reason: String,
    pub fail_count: u32,
    /// Set after the second failure; an ignored symbol is never
    /// re-planned.
    pub ignored: bool,
    pub note: Option<String>,
}

/// Per-symbol entry: status plus any usage hits attached by a usages
/// query (an entry created by usages alone has no status yet).
#[derive(Debug, Clone, Default)]
pub struct SymbolState {
    pub status: Option<SymbolStatus>,
    pub usages: Vec<UsageHit>,
}

impl SymbolState {
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, Some(SymbolStatus::Resolved(_)))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(&self.status, Some(SymbolStatus::Unresolved(u)) if u.ignored)
    }

    pub fn evidence(&self) -> Option<&Evidence> {
        match &self.status {
            Some(SymbolStatus::Resolved(ev)) => Some(ev),
            _ => None,
        }
    }
}

/// Partial update a planner may request alongside its actions.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BlackboardPatch {
    #[serde(default)]
    pub current_focus: Option<String>,
    #[serde(default)]
    pub add_frontier: Vec<String>,
    #[serde(default)]
    pub mark_unresolved: Vec<UnresolvedMark>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UnresolvedMark {
    pub symbol: String,
    #[serde(default)]
    pub reason: String,
}

impl BlackboardPatch {
    pub fn is_empty(&self) -> bool {
        self.current_focus.is_none()
            && self.add_frontier.is_empty()
            && self.mark_unresolved.is_empty()
    }
}

/// The shared store for one run.
#[derive(Debug)]
pub struct Blackboard {
    pub repo_root: PathBuf,
    /// The original symbol reference requested.
    pub target: String,
    /// Fully-qualified name currently being explained; begins as target.
    pub current_focus: String,
    /// Symbol reference -> state, in insertion order.
    pub symbols: IndexMap<String, SymbolState>,
    /// Short names awaiting planning consideration.
    pub frontier: Vec<String>,
    /// Count of planner passes.
    pub iterations: u32,
    /// Append-only trace of operational events.
    pub logs: Vec<String>,
}

impl Blackboard {
    pub fn new(repo_root: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            repo_root: repo_root.into(),
            current_focus: target.clone(),
            target,
            symbols: IndexMap::new(),
            frontier: Vec::new(),
            iterations: 0,
            logs: Vec::new(),
        }
    }

    pub fn log(&mut self, msg: impl Into<String>) {
        self.logs.push(msg.into());
    }

    /// Record a resolution failure. The second failure marks the symbol
    /// ignored and evicts its short and full forms from the frontier.
    /// A resolved symbol is never demoted.
    pub fn mark_unresolved(&mut self, sym: &str, reason: &str) {
        if self.symbols.get(sym).is_some_and(SymbolState::is_resolved) {
            self.log(format!(
                "[blackboard] mark_unresolved skipped, already resolved: {sym}"
            ));
            return;
        }

        let entry = self.symbols.entry(sym.to_string()).or_default();
        let mut state = match entry.status.take() {
            Some(SymbolStatus::Unresolved(mut u)) => {
                u.fail_count += 1;
                u.reason = reason.to_string();
                u
            }
            _ => UnresolvedState {
                reason: reason.to_string(),
                fail_count: 1,
                ..Default::default()
            },
        };
        let newly_ignored = state.fail_count >= 2 && !state.ignored;
        if newly_ignored {
            state.ignored = true;
            state.note = Some(format!(
                "{sym} does not look like a symbol defined in this repository; \
                 resolution failed repeatedly. Treat it as a built-in or external \
                 call in the explanation."
            ));
        }
        let note = state.note.clone();
        entry.status = Some(SymbolStatus::Unresolved(state));

        if newly_ignored {
            let short = short_name(sym).to_string();
            self.frontier.retain(|f| f != &short && f != sym);
            self.log(format!(
                "[resolver] ignore_unresolved sym={sym} reason={}",
                note.unwrap_or_default()
            ));
        }
    }

    /// Store evidence for a symbol, clean the frontier, and enqueue the
    /// evidence's fresh outgoing calls.
    pub fn add_evidence(&mut self, ev: Evidence) {
        let calls = ev.extracted_calls.clone();
        let key = ev.symbol_ref.clone();
        self.symbols.entry(key).or_default().status = Some(SymbolStatus::Resolved(ev));

        let resolved_short = self.resolved_short_names();
        let ignored = self.ignored_names();

        // Frontier deletion set: resolved short names, ignored short/full
        // names, and anything already tracked in the symbols map.
        let tracked: Vec<String> = self.symbols.keys().cloned().collect();
        self.frontier.retain(|f| {
            !resolved_short.contains(f) && !ignored.contains(f) && !tracked.contains(f)
        });

        for call in calls {
            if is_builtin(&call) || call.contains('.') {
                continue;
            }
            if self.symbols.contains_key(&call) || resolved_short.contains(&call) {
                continue;
            }
            let duplicate = self
                .symbols
                .keys()
                .any(|name| name == &call || name.ends_with(&format!(".{call}")));
            if duplicate || self.frontier.contains(&call) {
                continue;
            }
            self.frontier.push(call);
        }
    }

    /// Apply a planner patch. Applying an empty patch is the identity.
    pub fn apply_patch(&mut self, patch: &BlackboardPatch) {
        if let Some(focus) = &patch.current_focus {
            self.current_focus = focus.clone();
        }
        for entry in &patch.add_frontier {
            if !self.frontier.contains(entry) && !self.symbols.contains_key(entry) {
                self.frontier.push(entry.clone());
            }
        }
        for mark in &patch.mark_unresolved {
            self.mark_unresolved(&mark.symbol, &mark.reason);
        }
    }

    /// Qualified names of every resolved symbol, in insertion order.
    pub fn resolved_names(&self) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|(_, s)| s.is_resolved())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Short names of every resolved symbol.
    pub fn resolved_short_names(&self) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|(_, s)| s.is_resolved())
            .map(|(k, _)| short_name(k).to_string())
            .collect()
    }

    /// Short and full names of every ignored symbol.
    pub fn ignored_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (k, s) in &self.symbols {
            if s.is_ignored() {
                names.push(short_name(k).to_string());
                names.push(k.clone());
            }
        }
        names
    }

    /// The documented persistence shape, produced only at this boundary.
    pub fn to_json(&self) -> Value {
        let mut symbols = serde_json::Map::new();
        for (name, state) in &self.symbols {
            symbols.insert(name.clone(), symbol_state_json(state));
        }
        json!({
            "repo_root": self.repo_root.display().to_string(),
            "target": self.target,
            "current_focus": self.current_focus,
            "symbols": Value::Object(symbols),
            "frontier": self.frontier,
            "iterations": self.iterations,
            "logs": self.logs,
        })
    }
}

fn symbol_state_json(state: &SymbolState) -> Value {
    let mut map = serde_json::Map::new();
    match &state.status {
        Some(SymbolStatus::Resolved(ev)) => {
            map.insert("status".into(), json!("resolved"));
            map.insert("kind".into(), json!(ev.kind));
            map.insert("source".into(), json!(ev.source));
            map.insert("defined_in".into(), json!(ev.defined_in));
            map.insert("span".into(), json!([ev.span.0, ev.span.1]));
            map.insert("snippet".into(), json!(ev.snippet));
            map.insert("extracted_calls".into(), json!(ev.extracted_calls));
        }
        Some(SymbolStatus::Unresolved(u)) => {
            map.insert("status".into(), json!("unresolved"));
            map.insert("reason".into(), json!(u.reason));
            map.insert("fail_count".into(), json!(u.fail_count));
            if u.ignored {
                map.insert("ignore_unresolved".into(), json!(true));
            }
            if let Some(note) = &u.note {
                map.insert("note".into(), json!(note));
            }
        }
        None => {}
    }
    if !state.usages.is_empty() {
        map.insert("usages".into(), json!(state.usages));
    }
    Value::Object(map)
}
