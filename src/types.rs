//! Core value types shared by the index, resolver, and blackboard.

use serde::{Deserialize, Serialize};

/// Kind of an indexed definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
        }
    }
}

/// One definition discovered during the index build. Immutable after build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDef {
    /// Dotted fully-qualified name, e.g. `processors.pipeline.process_data_pipeline`.
    pub qualname: String,
    pub kind: SymbolKind,
    /// Path relative to the root that owns the file.
    pub file: String,
    /// 1-based inclusive line span.
    pub start_line: u32,
    pub end_line: u32,
}

impl SymbolDef {
    pub fn new(
        qualname: impl Into<String>,
        kind: SymbolKind,
        file: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            qualname: qualname.into(),
            kind,
            file: file.into(),
            start_line,
            end_line,
        }
    }

    /// Last dotted segment of the qualified name.
    pub fn short_name(&self) -> &str {
        short_name(&self.qualname)
    }
}

/// Which source root a definition was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    MainRepo,
    ExtraLib,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainRepo => "main_repo",
            Self::ExtraLib => "extra_lib",
        }
    }
}

/// Proof that a symbol was located in the index: its resolved name, source
/// span, snippet, and the outgoing calls extracted from that snippet.
/// Created on first successful resolution and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub symbol_ref: String,
    pub kind: SymbolKind,
    pub defined_in: String,
    /// 1-based inclusive line span.
    pub span: (u32, u32),
    /// Source text of the definition, clipped to at most 160 lines.
    pub snippet: String,
    /// Ordered, de-duplicated outgoing call references.
    pub extracted_calls: Vec<String>,
    pub source: SourceKind,
}

/// One grep hit recorded by a usages query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageHit {
    pub file: String,
    /// 1-based line number.
    pub line: u32,
    pub text: String,
}

/// Last dotted segment of a reference (`a.b.c` -> `c`; `c` -> `c`).
pub fn short_name(reference: &str) -> &str {
    reference.rsplit('.').next().unwrap_or(reference)
}
