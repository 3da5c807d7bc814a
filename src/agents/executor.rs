//! Executor agent.
//!
//! Applies a planned action list to the index, in order, writing results
//! back to the blackboard. Later actions observe evidence written by
//! earlier ones. A per-iteration set of already-opened references
//! suppresses duplicate queries a misbehaving planner might emit.

use std::collections::HashSet;
use tracing::debug;

use crate::agents::Action;
use crate::blackboard::Blackboard;
use crate::search::SearchEngine;

pub struct ExecutorAgent<'s, 'i> {
    search: &'s SearchEngine<'i>,
}

impl<'s, 'i> ExecutorAgent<'s, 'i> {
    pub fn new(search: &'s SearchEngine<'i>) -> Self {
        Self { search }
    }

    pub fn execute(&self, bb: &mut Blackboard, actions: &[Action], hint_file: Option<&str>) {
        let resolved: HashSet<String> = bb.resolved_names().into_iter().collect();
        let mut opened_this_iter: HashSet<String> = HashSet::new();

        for action in actions {
            match action {
                Action::OpenSymbol {
                    symbol_ref,
                    hint_file: action_hint,
                    ..
                } => {
                    let sym = symbol_ref.as_str();
                    if sym.is_empty() {
                        continue;
                    }
                    if resolved.contains(sym) || opened_this_iter.contains(sym) {
                        bb.log(format!(
                            "[executor] OPEN_SYMBOL skip duplicate: {sym} \
                             (already_resolved={}, opened_this_iter={})",
                            resolved.contains(sym),
                            opened_this_iter.contains(sym)
                        ));
                        continue;
                    }
                    opened_this_iter.insert(sym.to_string());

                    let hint = action_hint.as_deref().or(hint_file);
                    match self.search.open_symbol(sym, hint) {
                        None => {
                            bb.mark_unresolved(sym, &format!("OPEN_SYMBOL failed: {sym}"));
                            bb.log(format!("[executor] OPEN_SYMBOL miss: {sym}"));
                        }
                        Some(ev) => {
                            // Resolvability of each extracted call is
                            // recorded for diagnosis only; nothing is
                            // pruned here. The planner decides what to
                            // expand.
                            let evidence_hint = ev.defined_in.clone();
                            let mut resolvable = Vec::new();
                            let mut not_resolvable = Vec::new();
                            for call in &ev.extracted_calls {
                                if self.search.resolve(call, Some(evidence_hint.as_str())).is_some() {
                                    resolvable.push(call.clone());
                                } else {
                                    not_resolvable.push(call.clone());
                                }
                            }
                            not_resolvable.truncate(10);

                            let line = format!(
                                "[executor] OPEN_SYMBOL ok: {} @ {}:{}-{} \
                                 (calls total={}, resolvable={:?}, not_resolvable={:?})",
                                ev.symbol_ref,
                                ev.defined_in,
                                ev.span.0,
                                ev.span.1,
                                ev.extracted_calls.len(),
                                resolvable,
                                not_resolvable,
                            );
                            bb.add_evidence(ev);
                            bb.log(line);
                        }
                    }
                }

                Action::HybridSearch {
                    query,
                    hint_file: action_hint,
                    top_k,
                    ..
                } => {
                    if query.is_empty() {
                        continue;
                    }
                    let hint = action_hint.as_deref().or(hint_file);
                    let result = self.search.hybrid_search(query, hint, *top_k);
                    bb.log(format!(
                        "[executor] HYBRID_SEARCH query={query} defs={} usages={}",
                        result.defs.len(),
                        result.usages.len()
                    ));
                    match result.defs.first() {
                        Some(top) => {
                            let qualname = top.qualname.clone();
                            if let Some(ev) = self.search.open_symbol(&qualname, hint) {
                                bb.add_evidence(ev);
                            }
                        }
                        None => {
                            bb.mark_unresolved(query, "HYBRID_SEARCH found no defs");
                        }
                    }
                }

                Action::FindUsages { needle, top_k, .. } => {
                    if needle.is_empty() {
                        continue;
                    }
                    let hits = self.search.find_usages(needle, *top_k);
                    bb.log(format!(
                        "[executor] FIND_USAGES needle={needle} hits={}",
                        hits.len()
                    ));
                    debug!("usages for {needle}: {} hits", hits.len());
                    bb.symbols.entry(needle.clone()).or_default().usages = hits;
                }
            }
        }
    }
}
