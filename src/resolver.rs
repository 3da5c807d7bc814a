//! Symbol resolution.
//!
//! Maps a (possibly partial, aliased, or ambiguous) symbol reference plus
//! an optional hint file onto a single indexed definition. Strategies run
//! in priority order and the first success wins:
//!
//! - S1: exact qualified-name match
//! - S2: `.Cls.meth` suffix match
//! - S3: import-aware resolution through the hint file's bindings
//! - S4: scored short-name fallback
//!
//! Ambiguity tie-breaks consult an ordered list of preferred library
//! substrings (configurable; empty is valid and leaves only the length
//! tie-breaks).

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::indexing::RepoIndex;
use crate::parsing::paths::module_name_from_relpath;
use crate::types::{SymbolDef, short_name};

pub struct SymbolResolver<'a> {
    index: &'a RepoIndex,
    preferred: &'a [String],
}

impl<'a> SymbolResolver<'a> {
    pub fn new(index: &'a RepoIndex, preferred: &'a [String]) -> Self {
        Self { index, preferred }
    }

    /// Resolve `reference` to one definition, or `None` when every
    /// strategy misses.
    pub fn resolve(&self, reference: &str, hint_file: Option<&str>) -> Option<&'a SymbolDef> {
        if let Some(def) = self.index.lookup_exact(reference) {
            debug!("resolve {reference}: exact match");
            return Some(def);
        }

        if let Some(def) = self.suffix_match(reference) {
            return Some(def);
        }

        if let Some(hint) = hint_file {
            if reference.contains('.') {
                if let Some(def) = self.import_aware(reference, hint) {
                    return Some(def);
                }
            }
        }

        self.short_name_fallback(reference, hint_file)
    }

    /// S2: the reference's last two segments as a `.Cls.meth` suffix.
    fn suffix_match(&self, reference: &str) -> Option<&'a SymbolDef> {
        let parts: Vec<&str> = reference.split('.').collect();
        if parts.len() < 2 {
            return None;
        }
        let suffix = format!(".{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);

        let mut hits: Vec<&SymbolDef> = self
            .index
            .symbols()
            .filter(|(qn, _)| qn.ends_with(&suffix))
            .map(|(_, def)| def)
            .collect();

        match hits.len() {
            0 => None,
            1 => {
                debug!("resolve {reference}: unique suffix match {}", hits[0].qualname);
                Some(hits[0])
            }
            _ => {
                // Several classes share the method: prefer the configured
                // libraries, then the shorter qualified name.
                hits.sort_by_key(|def| (self.preference_misses(&def.qualname), def.qualname.len()));
                debug!("resolve {reference}: ambiguous suffix, chose {}", hits[0].qualname);
                Some(hits[0])
            }
        }
    }

    /// S3: resolve through the hint file's import bindings.
    fn import_aware(&self, reference: &str, hint_file: &str) -> Option<&'a SymbolDef> {
        let imports = self.index.imports_for(hint_file)?;
        let parts: Vec<&str> = reference.split('.').collect();

        // Two-segment form: the last two segments read as `Cls.meth` and
        // the class is an import alias.
        if parts.len() >= 2 {
            let (cls, meth) = (parts[parts.len() - 2], parts[parts.len() - 1]);
            if let Some(target) = imports.get(cls) {
                let full = format!("{target}.{meth}");
                if let Some(def) = self.index.lookup_exact(&full) {
                    return Some(def);
                }
                // The index may carry a vendored prefix in front of the
                // canonical module path.
                let dotted = format!(".{full}");
                if let Some((_, def)) = self.index.symbols().find(|(qn, _)| qn.ends_with(&dotted)) {
                    return Some(def);
                }
                // Fall back to any definition ending in `.Cls.meth`,
                // preferring library names, then the longer (more
                // specific) path.
                let cls_meth = format!(".{cls}.{meth}");
                if let Some(def) =
                    self.best_by_preference(|qn| qn.ends_with(&cls_meth))
                {
                    return Some(def);
                }
                // Last resort: fuzzy containment of both segments.
                if let Some(def) =
                    self.best_by_preference(|qn| qn.contains(cls) && qn.contains(meth))
                {
                    return Some(def);
                }
            }

            // Three-segment form: everything before the final segment is
            // a single alias.
            let head = parts[..parts.len() - 1].join(".");
            let tail = parts[parts.len() - 1];
            if let Some(target) = imports.get(&head) {
                if let Some(def) = self.index.lookup_exact(&format!("{target}.{tail}")) {
                    return Some(def);
                }
            }

            // First-segment form: the leading segment alone is an alias.
            if let Some(target) = imports.get(parts[0]) {
                let rest = parts[1..].join(".");
                if let Some(def) = self.index.lookup_exact(&format!("{target}.{rest}")) {
                    return Some(def);
                }
            }
        }

        None
    }

    /// S4: last-segment lookup with hint-file scoring.
    fn short_name_fallback(&self, reference: &str, hint_file: Option<&str>) -> Option<&'a SymbolDef> {
        let short = short_name(reference);
        let candidates = self.index.lookup_short(short);
        if candidates.is_empty() {
            debug!("resolve {reference}: no short-name candidates");
            return None;
        }

        let Some(hint) = hint_file else {
            debug!("resolve {reference}: no hint file, first short-name candidate");
            return Some(&candidates[0]);
        };

        let empty = HashMap::new();
        let imports = self.index.imports_for(hint).unwrap_or(&empty);
        let hint_module = module_name_from_relpath(Path::new(hint));
        let hint_head: Vec<&str> = hint_module.split('.').take(2).collect();

        let mut best: Option<(i32, &SymbolDef)> = None;
        for candidate in candidates {
            let mut score = 0;
            if candidate.file == hint {
                score += 50;
            }
            for target in imports.values() {
                if candidate.qualname.starts_with(&format!("{target}."))
                    || candidate.qualname.starts_with(target.as_str())
                {
                    score += 30;
                }
            }
            let cand_head: Vec<&str> = candidate.qualname.split('.').take(2).collect();
            if cand_head == hint_head {
                score += 5;
            }
            // Strict comparison keeps the earliest candidate on ties
            // (stable build order).
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }

        let (score, def) = best?;
        debug!("resolve {reference}: short-name fallback chose {} (score {score})", def.qualname);
        Some(def)
    }

    /// Best match for a qualified-name predicate: earlier-listed
    /// preferred libraries first (the same ordered ranking the suffix
    /// strategy uses), then the longer (more specific) name.
    fn best_by_preference(&self, predicate: impl Fn(&str) -> bool) -> Option<&'a SymbolDef> {
        let mut hits: Vec<&SymbolDef> = self
            .index
            .symbols()
            .filter(|(qn, _)| predicate(qn))
            .map(|(_, def)| def)
            .collect();
        if hits.is_empty() {
            return None;
        }
        hits.sort_by_key(|def| {
            (
                self.preference_misses(&def.qualname),
                Reverse(def.qualname.len()),
            )
        });
        Some(hits[0])
    }

    /// One flag per configured library, in order: false when the name
    /// contains that substring. Lexicographic comparison then ranks names
    /// carrying earlier-listed libraries first.
    fn preference_misses(&self, qualname: &str) -> Vec<bool> {
        let lower = qualname.to_lowercase();
        self.preferred
            .iter()
            .map(|lib| !lower.contains(&lib.to_lowercase()))
            .collect()
    }
}
