//! Repository symbol index.
//!
//! Walks the primary root and any auxiliary roots, parses every Python
//! file, and builds the queryable catalog the resolver works against:
//! qualified-name definitions, a short-name multimap, per-file import
//! bindings, and the root that owns each file.

pub mod walker;

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::IndexResult;
use crate::parsing::paths::module_name_from_relpath;
use crate::parsing::PythonParser;
use crate::types::SymbolDef;

/// Queryable catalog of definitions across the primary repository and any
/// auxiliary roots. Read-only after `build`.
pub struct RepoIndex {
    repo: PathBuf,
    extra_roots: Vec<PathBuf>,
    /// Qualified name -> definition, in discovery order.
    symbols: IndexMap<String, SymbolDef>,
    /// Short name -> definitions sharing it, in discovery order.
    short_names: HashMap<String, Vec<SymbolDef>>,
    /// Relative file path -> local alias -> fully-qualified name.
    imports: HashMap<String, HashMap<String, String>>,
    /// Relative file path -> whether it parsed cleanly.
    parse_ok: HashMap<String, bool>,
    /// Relative file path -> the source root that owns it.
    file_roots: HashMap<String, PathBuf>,
}

impl RepoIndex {
    pub fn new(repo: impl Into<PathBuf>, extra_roots: Vec<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            extra_roots,
            symbols: IndexMap::new(),
            short_names: HashMap::new(),
            imports: HashMap::new(),
            parse_ok: HashMap::new(),
            file_roots: HashMap::new(),
        }
    }

    /// Build the index: the primary root first, then each auxiliary root
    /// in order. Primary-root definitions take precedence and are never
    /// overwritten by auxiliary roots.
    pub fn build(&mut self) -> IndexResult<()> {
        let mut parser = PythonParser::new()?;
        let repo = self.repo.clone();
        self.build_root(&repo, &mut parser, true);
        for extra in self.extra_roots.clone() {
            self.build_root(&extra, &mut parser, false);
        }
        Ok(())
    }

    fn build_root(&mut self, root: &Path, parser: &mut PythonParser, is_primary: bool) {
        for file in walker::python_files(root) {
            let rel = walker::relative_key(&file, root);
            let source = match fs::read_to_string(&file) {
                Ok(s) => s,
                Err(e) => {
                    warn!("skipping unreadable file {}: {e}", file.display());
                    continue;
                }
            };
            let module = module_name_from_relpath(Path::new(&rel));

            let parsed = match parser.parse_module(&source, &module, &rel) {
                Ok(parsed) => {
                    self.parse_ok.insert(rel.clone(), true);
                    parsed
                }
                Err(e) => {
                    debug!("parse failure for {rel}: {e}");
                    self.parse_ok.insert(rel.clone(), false);
                    continue;
                }
            };

            // Auxiliary roots are supplementary reference material. If any
            // qualified name from this file is already indexed, the whole
            // file is suppressed so it cannot shadow earlier definitions.
            if !is_primary
                && parsed
                    .defs
                    .iter()
                    .any(|def| self.symbols.contains_key(&def.qualname))
            {
                debug!("suppressing shadowed auxiliary file {rel}");
                continue;
            }

            self.imports.insert(rel.clone(), parsed.imports);
            self.file_roots.insert(rel.clone(), root.to_path_buf());

            for def in parsed.defs {
                if !is_primary && self.symbols.contains_key(&def.qualname) {
                    continue;
                }
                self.add_symbol(def);
            }
        }
    }

    fn add_symbol(&mut self, def: SymbolDef) {
        self.short_names
            .entry(def.short_name().to_string())
            .or_default()
            .push(def.clone());
        self.symbols.insert(def.qualname.clone(), def);
    }

    /// Exact qualified-name lookup.
    pub fn lookup_exact(&self, qualname: &str) -> Option<&SymbolDef> {
        self.symbols.get(qualname)
    }

    /// All definitions sharing a short name, in stable build order.
    pub fn lookup_short(&self, short: &str) -> &[SymbolDef] {
        self.short_names.get(short).map_or(&[], Vec::as_slice)
    }

    /// Import bindings visible inside one file.
    pub fn imports_for(&self, file_rel: &str) -> Option<&HashMap<String, String>> {
        self.imports.get(file_rel)
    }

    /// Source root owning a file; defaults to the primary repository.
    pub fn root_of(&self, file_rel: &str) -> &Path {
        self.file_roots
            .get(file_rel)
            .map_or(self.repo.as_path(), PathBuf::as_path)
    }

    /// Per-file parse flag (`None` when the file was never visited).
    pub fn parse_ok(&self, file_rel: &str) -> Option<bool> {
        self.parse_ok.get(file_rel).copied()
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo
    }

    pub fn extra_roots(&self) -> &[PathBuf] {
        &self.extra_roots
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Iterate every indexed (qualified name, definition) pair in stable
    /// build order. The resolver's suffix and fuzzy scans use this.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, &SymbolDef)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains(&self, qualname: &str) -> bool {
        self.symbols.contains_key(qualname)
    }
}
