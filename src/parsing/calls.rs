//! Outgoing-call extraction from a definition's source text.
//!
//! Only three call shapes produce entries:
//! 1. `foo(...)`             -> `foo`
//! 2. `alias.foo(...)`       -> `alias.foo` (bare-name receiver only)
//! 3. `Cls(...).meth(...)`   -> `Cls.meth` (uppercase-initial class name)
//!
//! Everything else (attribute chains on complex receivers, subscript
//! receivers, lowercase constructor chains) is discarded: surfacing their
//! bare attribute would flood the frontier with generic method names like
//! `append`, `join`, `strip`.

use tree_sitter::{Node, Parser};

/// Extract the ordered, de-duplicated call targets from `snippet`.
///
/// The snippet is dedented before parsing (method bodies carry leading
/// indentation). Returns the empty list on parse failure.
pub fn extract_calls(snippet: &str) -> Vec<String> {
    let dedented = dedent(snippet);

    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        return Vec::new();
    }
    let Some(tree) = parser.parse(&dedented, None) else {
        return Vec::new();
    };
    let root = tree.root_node();
    if root.has_error() {
        return Vec::new();
    }

    let mut calls = Vec::new();
    let src = dedented.as_bytes();
    walk_calls(&root, src, &mut calls);

    let mut seen = std::collections::HashSet::new();
    calls.retain(|c| seen.insert(c.clone()));
    calls
}

/// Pre-order walk collecting the three supported call shapes.
fn walk_calls(node: &Node, src: &[u8], calls: &mut Vec<String>) {
    if node.kind() == "call" {
        if let Some(func) = node.child_by_field_name("function") {
            if let Some(target) = call_target(&func, src) {
                calls.push(target);
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_calls(&child, src, calls);
    }
}

fn call_target(func: &Node, src: &[u8]) -> Option<String> {
    match func.kind() {
        "identifier" => text(func, src),
        "attribute" => {
            let receiver = func.child_by_field_name("object")?;
            let attr = text(&func.child_by_field_name("attribute")?, src)?;
            match receiver.kind() {
                "identifier" => {
                    let base = text(&receiver, src)?;
                    Some(format!("{base}.{attr}"))
                }
                "call" => {
                    let inner = receiver.child_by_field_name("function")?;
                    if inner.kind() != "identifier" {
                        return None;
                    }
                    let class_name = text(&inner, src)?;
                    if class_name.chars().next().is_some_and(|c| c.is_uppercase()) {
                        Some(format!("{class_name}.{attr}"))
                    } else {
                        None
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn text(node: &Node, src: &[u8]) -> Option<String> {
    node.utf8_text(src).ok().map(str::to_string)
}

/// Remove the longest common leading whitespace from all non-blank lines.
fn dedent(s: &str) -> String {
    let mut prefix: Option<&str> = None;
    for line in s.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent_len = line.len() - line.trim_start().len();
        let indent = &line[..indent_len];
        prefix = Some(match prefix {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
        if prefix == Some("") {
            break;
        }
    }
    let prefix = prefix.unwrap_or("");
    if prefix.is_empty() {
        return s.to_string();
    }
    s.lines()
        .map(|line| line.strip_prefix(prefix).unwrap_or(line.trim_start_matches(char::is_whitespace)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, ca), cb)| ca == cb)
        .count();
    &a[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_name_calls() {
        let calls = extract_calls("def f(x):\n    validate(x)\n    return transform(x)\n");
        assert_eq!(calls, vec!["validate", "transform"]);
    }

    #[test]
    fn extracts_alias_attribute_calls() {
        let calls = extract_calls("def f(cfg):\n    return utils.merge(cfg)\n");
        assert_eq!(calls, vec!["utils.merge"]);
    }

    #[test]
    fn extracts_constructor_chain_calls() {
        let calls = extract_calls("def f(data):\n    return Pipeline().fit(data)\n");
        // The constructor call itself and the chained method.
        assert_eq!(calls, vec!["Pipeline.fit", "Pipeline"]);
    }

    #[test]
    fn lowercase_constructor_chains_are_dropped() {
        let calls = extract_calls("def f(d):\n    return builder().run(d)\n");
        assert_eq!(calls, vec!["builder"]);
    }

    #[test]
    fn complex_receivers_are_dropped() {
        let snippet = r#"
def f(items, obj):
    items[0].append(1)
    obj.config.reload()
    out = []
    out.append(2)
    return out
"#;
        let calls = extract_calls(snippet);
        // `out.append` survives as an alias-shaped call (bare-name
        // receiver); subscripts and attribute chains do not.
        assert_eq!(calls, vec!["out.append"]);
    }

    #[test]
    fn dedents_method_snippets() {
        let snippet = "    def render(self):\n        return build_rows(self.data)\n";
        assert_eq!(extract_calls(snippet), vec!["build_rows"]);
    }

    #[test]
    fn parse_failure_yields_empty_list() {
        assert!(extract_calls("def broken(:\n    oops(\n").is_empty());
    }

    #[test]
    fn extraction_is_idempotent_and_deduplicated() {
        let snippet = "def f(x):\n    check(x)\n    check(x)\n    check(x)\n";
        let first = extract_calls(snippet);
        let second = extract_calls(snippet);
        assert_eq!(first, vec!["check"]);
        assert_eq!(first, second);
    }
}
