//! Python AST adapter.
//!
//! Parses one source file with tree-sitter and extracts the definitions
//! and import bindings the index needs. A tree containing syntax errors
//! counts as a parse failure: the caller records the per-file flag and
//! skips symbol extraction, but the file stays grep-targetable.

use std::collections::HashMap;
use std::path::PathBuf;
use tree_sitter::{Node, Parser};

use crate::error::{IndexError, IndexResult};
use crate::types::{SymbolDef, SymbolKind};

/// Everything extracted from one successfully parsed file.
#[derive(Debug, Default)]
pub struct ParsedModule {
    /// Top-level functions and classes, plus methods one level deep
    /// inside class bodies.
    pub defs: Vec<SymbolDef>,
    /// Local alias -> fully-qualified name, from both direct imports and
    /// from-imports (relative imports resolved against the module path).
    pub imports: HashMap<String, String>,
}

/// Reusable tree-sitter parser configured for Python.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| IndexError::ParserInit {
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    /// Parse `source` and extract definitions and import bindings.
    ///
    /// `module` is the file's dotted module name, `file_rel` its
    /// root-relative path (recorded on each definition).
    pub fn parse_module(
        &mut self,
        source: &str,
        module: &str,
        file_rel: &str,
    ) -> IndexResult<ParsedModule> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| IndexError::SyntaxError {
                path: PathBuf::from(file_rel),
            })?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(IndexError::SyntaxError {
                path: PathBuf::from(file_rel),
            });
        }

        let mut parsed = ParsedModule::default();
        let src = source.as_bytes();

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            collect_definition(&child, src, module, file_rel, &mut parsed.defs);
        }

        collect_imports(&root, src, module, &mut parsed.imports);
        Ok(parsed)
    }
}

/// Handle one top-level statement, unwrapping decorators.
fn collect_definition(
    node: &Node,
    src: &[u8],
    module: &str,
    file_rel: &str,
    defs: &mut Vec<SymbolDef>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(def) = make_def(node, src, module, file_rel, SymbolKind::Function) {
                defs.push(def);
            }
        }
        "class_definition" => collect_class(node, src, module, file_rel, defs),
        "decorated_definition" => {
            if let Some(inner) = decorated_inner(node) {
                collect_definition(&inner, src, module, file_rel, defs);
            }
        }
        _ => {}
    }
}

/// Emit the class itself and its direct methods (one level deep).
fn collect_class(node: &Node, src: &[u8], module: &str, file_rel: &str, defs: &mut Vec<SymbolDef>) {
    let Some(class_name) = field_text(node, "name", src) else {
        return;
    };
    if let Some(def) = make_def(node, src, module, file_rel, SymbolKind::Class) {
        defs.push(def);
    }

    let class_module = join_dotted(module, &class_name);
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for stmt in body.children(&mut cursor) {
        let method = match stmt.kind() {
            "function_definition" => Some(stmt),
            "decorated_definition" => {
                decorated_inner(&stmt).filter(|inner| inner.kind() == "function_definition")
            }
            _ => None,
        };
        if let Some(method) = method {
            if let Some(def) = make_def(&method, src, &class_module, file_rel, SymbolKind::Method) {
                defs.push(def);
            }
        }
    }
}

/// The function or class wrapped by a `decorated_definition`. The span of
/// the emitted symbol starts at the inner `def`/`class` line, not at the
/// decorators.
fn decorated_inner<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    node.child_by_field_name("definition").or_else(|| {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .find(|c| matches!(c.kind(), "function_definition" | "class_definition"))
    })
}

fn make_def(
    node: &Node,
    src: &[u8],
    module: &str,
    file_rel: &str,
    kind: SymbolKind,
) -> Option<SymbolDef> {
    let name = field_text(node, "name", src)?;
    Some(SymbolDef::new(
        join_dotted(module, &name),
        kind,
        file_rel,
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    ))
}

fn join_dotted(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn field_text(node: &Node, field: &str, src: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(src).ok())
        .map(str::to_string)
}

fn node_text(node: &Node, src: &[u8]) -> String {
    node.utf8_text(src).unwrap_or("").to_string()
}

/// Walk the whole tree collecting import bindings (imports can appear
/// inside function bodies too).
fn collect_imports(root: &Node, src: &[u8], module: &str, imports: &mut HashMap<String, String>) {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => handle_import(&node, src, imports),
            "import_from_statement" => handle_import_from(&node, src, module, imports),
            _ => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
        }
    }
}

/// `import a.b` binds `b` -> `a.b`; `import a.b as c` binds `c` -> `a.b`.
fn handle_import(node: &Node, src: &[u8], imports: &mut HashMap<String, String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let target = node_text(&child, src);
                if let Some(local) = target.rsplit('.').next() {
                    imports.insert(local.to_string(), target.clone());
                }
            }
            "aliased_import" => {
                let target = child
                    .child_by_field_name("name")
                    .map(|n| node_text(&n, src))
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(&n, src))
                    .unwrap_or_default();
                if !target.is_empty() && !alias.is_empty() {
                    imports.insert(alias, target);
                }
            }
            _ => {}
        }
    }
}

/// `from m import n [as a]` binds the imported name (or alias) to `m.n`.
/// Relative imports resolve their dot level against the importing
/// module's dotted path; `from . import x` and wildcards bind nothing.
fn handle_import_from(node: &Node, src: &[u8], module: &str, imports: &mut HashMap<String, String>) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };

    let base = match module_node.kind() {
        "dotted_name" => node_text(&module_node, src),
        "relative_import" => {
            let text = node_text(&module_node, src);
            let level = text.chars().take_while(|&c| c == '.').count();
            let remainder = text.trim_start_matches('.');
            if remainder.is_empty() {
                return;
            }
            let parts: Vec<&str> = module.split('.').collect();
            let keep = parts.len().saturating_sub(level);
            let mut resolved: Vec<&str> = parts[..keep].to_vec();
            resolved.push(remainder);
            resolved.join(".")
        }
        _ => return,
    };
    if base.is_empty() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.id() == module_node.id() {
            continue;
        }
        match child.kind() {
            "dotted_name" => {
                let name = node_text(&child, src);
                if !name.is_empty() {
                    imports.insert(name.clone(), format!("{base}.{name}"));
                }
            }
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(&n, src))
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(&n, src))
                    .unwrap_or_default();
                if !name.is_empty() && !alias.is_empty() {
                    imports.insert(alias, format!("{base}.{name}"));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, module: &str) -> ParsedModule {
        PythonParser::new()
            .unwrap()
            .parse_module(source, module, "pkg/mod.py")
            .unwrap()
    }

    #[test]
    fn extracts_top_level_functions_and_classes() {
        let source = r#"
def top(x):
    return x

class Widget:
    def render(self):
        return "ok"

    def _hidden(self):
        pass
"#;
        let parsed = parse(source, "pkg.mod");
        let names: Vec<&str> = parsed.defs.iter().map(|d| d.qualname.as_str()).collect();
        assert_eq!(
            names,
            vec!["pkg.mod.top", "pkg.mod.Widget", "pkg.mod.Widget.render", "pkg.mod.Widget._hidden"]
        );

        let top = &parsed.defs[0];
        assert_eq!(top.kind, SymbolKind::Function);
        assert_eq!((top.start_line, top.end_line), (2, 3));

        let render = &parsed.defs[2];
        assert_eq!(render.kind, SymbolKind::Method);
        assert_eq!(render.file, "pkg/mod.py");
    }

    #[test]
    fn nested_functions_are_not_indexed() {
        let source = r#"
def outer():
    def inner():
        pass
    return inner
"#;
        let parsed = parse(source, "m");
        let names: Vec<&str> = parsed.defs.iter().map(|d| d.qualname.as_str()).collect();
        assert_eq!(names, vec!["m.outer"]);
    }

    #[test]
    fn decorated_definitions_span_the_def_line() {
        let source = r#"
@lru_cache
@trace
def cached(x):
    return x
"#;
        let parsed = parse(source, "m");
        assert_eq!(parsed.defs.len(), 1);
        let def = &parsed.defs[0];
        assert_eq!(def.qualname, "m.cached");
        // Span starts at the `def` line, not the first decorator.
        assert_eq!(def.start_line, 4);
    }

    #[test]
    fn extracts_direct_imports() {
        let source = r#"
import os
import os.path
import numpy as np
"#;
        let parsed = parse(source, "m");
        assert_eq!(parsed.imports.get("os").map(String::as_str), Some("os"));
        assert_eq!(parsed.imports.get("path").map(String::as_str), Some("os.path"));
        assert_eq!(parsed.imports.get("np").map(String::as_str), Some("numpy"));
    }

    #[test]
    fn extracts_from_imports_with_aliases() {
        let source = r#"
from core.transformers import aggregate_metrics
from core.validators import validate_numeric_range as vnr
"#;
        let parsed = parse(source, "processors.formatters");
        assert_eq!(
            parsed.imports.get("aggregate_metrics").map(String::as_str),
            Some("core.transformers.aggregate_metrics")
        );
        assert_eq!(
            parsed.imports.get("vnr").map(String::as_str),
            Some("core.validators.validate_numeric_range")
        );
    }

    #[test]
    fn resolves_relative_imports_against_module_path() {
        let source = r#"
from .validators import check
from ..shared import helper
"#;
        let parsed = parse(source, "pkg.sub.mod");
        assert_eq!(
            parsed.imports.get("check").map(String::as_str),
            Some("pkg.sub.validators.check")
        );
        assert_eq!(
            parsed.imports.get("helper").map(String::as_str),
            Some("pkg.shared.helper")
        );
    }

    #[test]
    fn bare_relative_and_wildcard_imports_bind_nothing() {
        let source = r#"
from . import sibling
from os.path import *
"#;
        let parsed = parse(source, "pkg.mod");
        assert!(!parsed.imports.contains_key("sibling"));
        assert!(!parsed.imports.contains_key("*"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let result = PythonParser::new()
            .unwrap()
            .parse_module("def broken(:\n    pass\n", "m", "m.py");
        assert!(matches!(result, Err(IndexError::SyntaxError { .. })));
    }
}
