//! Search surface over the index: evidence extraction, regex grep, usage
//! lookup, and hybrid (definition + usage) queries.

use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::indexing::{RepoIndex, walker};
use crate::parsing::extract_calls;
use crate::resolver::SymbolResolver;
use crate::types::{Evidence, SourceKind, SymbolDef, UsageHit, short_name};

/// Evidence snippets are clipped to this many lines.
pub const SNIPPET_MAX_LINES: usize = 160;

/// Grep hit lines are truncated to this many characters.
const USAGE_LINE_MAX_CHARS: usize = 300;

/// Result of a hybrid query: definition candidates plus textual usages.
#[derive(Debug, Default)]
pub struct HybridResult {
    pub defs: Vec<SymbolDef>,
    pub usages: Vec<UsageHit>,
}

pub struct SearchEngine<'a> {
    index: &'a RepoIndex,
    resolver: SymbolResolver<'a>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(index: &'a RepoIndex, preferred: &'a [String]) -> Self {
        Self {
            index,
            resolver: SymbolResolver::new(index, preferred),
        }
    }

    /// Resolve a reference without reading any source.
    pub fn resolve(&self, reference: &str, hint_file: Option<&str>) -> Option<&'a SymbolDef> {
        self.resolver.resolve(reference, hint_file)
    }

    /// Resolve a reference and extract its evidence: source span, clipped
    /// snippet, outgoing calls, and provenance.
    pub fn open_symbol(&self, reference: &str, hint_file: Option<&str>) -> Option<Evidence> {
        let def = self.resolver.resolve(reference, hint_file)?;
        let root = self.index.root_of(&def.file);
        let path = root.join(&def.file);
        let source = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                warn!("cannot read {} for {}: {e}", path.display(), def.qualname);
                return None;
            }
        };

        let snippet = slice_span(&source, def.start_line, def.end_line);
        // Calls come from the raw snippet; only the stored copy is clipped.
        let calls = extract_calls(&snippet);
        let source_kind = if root == self.index.repo_root() {
            SourceKind::MainRepo
        } else {
            SourceKind::ExtraLib
        };
        debug!(
            "open {}: {} lines, {} calls, {}",
            def.qualname,
            def.end_line - def.start_line + 1,
            calls.len(),
            source_kind.as_str()
        );

        Some(Evidence {
            symbol_ref: def.qualname.clone(),
            kind: def.kind,
            defined_in: def.file.clone(),
            span: (def.start_line, def.end_line),
            snippet: clip_lines(&snippet, SNIPPET_MAX_LINES),
            extracted_calls: calls,
            source: source_kind,
        })
    }

    /// Textual occurrences of a literal needle, capped at `top_k` hits.
    pub fn find_usages(&self, needle: &str, top_k: usize) -> Vec<UsageHit> {
        let pattern = regex::escape(needle);
        let Ok(rx) = Regex::new(&pattern) else {
            return Vec::new();
        };
        self.grep(&rx, top_k)
    }

    /// Resolver hit (or short-name candidates) plus textual usages.
    pub fn hybrid_search(
        &self,
        query: &str,
        hint_file: Option<&str>,
        top_k: usize,
    ) -> HybridResult {
        let mut defs = Vec::new();
        if let Some(def) = self.resolver.resolve(query, hint_file) {
            defs.push(def.clone());
        } else {
            for candidate in self.index.lookup_short(short_name(query)).iter().take(top_k) {
                defs.push(candidate.clone());
            }
        }
        defs.truncate(top_k);

        let usages = self.find_usages(query, usize::max(10, top_k * 4));
        HybridResult { defs, usages }
    }

    /// Line-oriented regex search across the primary root and every
    /// auxiliary root, in order. Unreadable files are skipped.
    fn grep(&self, rx: &Regex, max_hits: usize) -> Vec<UsageHit> {
        let mut hits = Vec::new();
        let mut roots = vec![self.index.repo_root().to_path_buf()];
        roots.extend(self.index.extra_roots().iter().cloned());

        for root in roots {
            for file in walker::python_files(&root) {
                let Ok(content) = fs::read_to_string(&file) else {
                    continue;
                };
                let rel = walker::relative_key(&file, &root);
                for (i, line) in content.lines().enumerate() {
                    if rx.is_match(line) {
                        hits.push(UsageHit {
                            file: rel.clone(),
                            line: i as u32 + 1,
                            text: truncate_chars(line, USAGE_LINE_MAX_CHARS),
                        });
                        if hits.len() >= max_hits {
                            return hits;
                        }
                    }
                }
            }
        }
        hits
    }
}

/// 1-based inclusive line slice, clamped to the file.
fn slice_span(source: &str, start: u32, end: u32) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = (start.max(1) as usize - 1).min(lines.len());
    let end = (end as usize).min(lines.len());
    lines[start..end].join("\n")
}

/// Clip to at most `max_lines` lines, marking the cut.
pub fn clip_lines(s: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    if lines.len() <= max_lines {
        return s.to_string();
    }
    let mut clipped: Vec<&str> = lines[..max_lines].to_vec();
    clipped.push("... <clipped> ...");
    clipped.join("\n")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
