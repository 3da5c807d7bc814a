//! Index and resolver integration tests over an on-disk fixture
//! repository with `core`, `processors`, and `utils` packages.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use codescout::indexing::RepoIndex;
use codescout::resolver::SymbolResolver;
use codescout::search::SearchEngine;
use codescout::types::{SourceKind, SymbolKind};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Lay down the sample repository used across these tests.
fn sample_repo(root: &Path) {
    write(
        root,
        "core/validators.py",
        r#"def validate_numeric_range(value, min_val, max_val):
    return min_val <= value <= max_val

def validate_string_format(text, pattern):
    return bool(text) and bool(pattern)

def create_validation_context(fields):
    results = {}
    for name, value in fields.items():
        if isinstance(value, (int, float)):
            results[name] = validate_numeric_range(float(value), 0.0, 1000.0)
    return results
"#,
    );
    write(
        root,
        "core/computations.py",
        r#"def compute_statistical_summary(data_points):
    values = [float(p['value']) for p in data_points]
    total = sum(values)
    count = len(values)
    mean = total / count if count else 0.0
    return {'metrics': {'total': total, 'count': count, 'mean': mean}}
"#,
    );
    write(
        root,
        "core/aggregators.py",
        r#"def aggregate_metrics(rows):
    return {'rows': len(rows)}
"#,
    );
    write(
        root,
        "core/transformers.py",
        r#"from core.validators import validate_numeric_range, validate_string_format

def aggregate_metrics(entries):
    merged = {}
    for entry in entries:
        merged.update(entry)
    return merged

def transform_data_structure(raw_data):
    transformed = {}
    for key, value in raw_data.items():
        if isinstance(value, str) and validate_string_format(value, '^[a-z]+$'):
            transformed[key] = value.upper()
        else:
            transformed[key] = value
    return transformed

class Widget:
    def render(self):
        return 'widget'
"#,
    );
    write(
        root,
        "processors/pipeline.py",
        r#"from core.validators import create_validation_context, validate_numeric_range
from core.computations import compute_statistical_summary
from core.transformers import transform_data_structure

def _initialize_processing_state(config):
    validation_results = create_validation_context(config)
    state = {'config': config, 'validated': all(validation_results.values()), 'step_count': 0}
    return state

def _execute_transformation_phase(raw_input, state):
    transformed = transform_data_structure(raw_input)
    state['step_count'] += 1
    return transformed

def _execute_computation_phase(transformed_data, state):
    if 'data_points' in transformed_data:
        summary = compute_statistical_summary(transformed_data['data_points'])
        transformed_data['statistics'] = summary
    state['step_count'] += 1
    return transformed_data

def process_data_pipeline(input_data, config):
    state = _initialize_processing_state(config)
    transformed = _execute_transformation_phase(input_data, state)
    result = _execute_computation_phase(transformed, state)
    return result
"#,
    );
    write(
        root,
        "processors/formatters.py",
        r#"from core.transformers import aggregate_metrics
from core import transformers as tf

def format_output_summary(processed):
    metrics = aggregate_metrics(processed)
    return tf.transform_data_structure(metrics)
"#,
    );
    write(
        root,
        "utils/helpers.py",
        r#"def merge_dicts(a, b):
    merged = dict(a)
    merged.update(b)
    return merged
"#,
    );
}

fn build(root: &Path, extra: Vec<std::path::PathBuf>) -> RepoIndex {
    let mut index = RepoIndex::new(root, extra);
    index.build().unwrap();
    index
}

const NO_PREFS: &[String] = &[];

fn prefs() -> Vec<String> {
    vec!["sklearn".to_string(), "xgboost".to_string()]
}

#[test]
fn index_catalogs_the_sample_repo() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());

    let pipeline = index
        .lookup_exact("processors.pipeline.process_data_pipeline")
        .unwrap();
    assert_eq!(pipeline.kind, SymbolKind::Function);
    assert_eq!(pipeline.file, "processors/pipeline.py");

    let widget = index.lookup_exact("core.transformers.Widget").unwrap();
    assert_eq!(widget.kind, SymbolKind::Class);
    let render = index.lookup_exact("core.transformers.Widget.render").unwrap();
    assert_eq!(render.kind, SymbolKind::Method);

    // Two definitions share the short name, in build order.
    let candidates = index.lookup_short("aggregate_metrics");
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].qualname, "core.aggregators.aggregate_metrics");
    assert_eq!(candidates[1].qualname, "core.transformers.aggregate_metrics");

    let imports = index.imports_for("processors/formatters.py").unwrap();
    assert_eq!(
        imports.get("aggregate_metrics").map(String::as_str),
        Some("core.transformers.aggregate_metrics")
    );
    assert_eq!(imports.get("tf").map(String::as_str), Some("core.transformers"));
}

#[test]
fn s1_exact_match_wins() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let resolver = SymbolResolver::new(&index, NO_PREFS);

    let def = resolver
        .resolve("core.validators.validate_numeric_range", None)
        .unwrap();
    assert_eq!(def.file, "core/validators.py");
}

#[test]
fn s2_class_method_suffix_resolves_auxiliary_definitions() {
    let repo = TempDir::new().unwrap();
    sample_repo(repo.path());
    let extra = TempDir::new().unwrap();
    write(
        extra.path(),
        "xgboost/sklearn.py",
        r#"class XGBRegressor:
    def fit(self, X, y):
        return self
"#,
    );

    let index = build(repo.path(), vec![extra.path().to_path_buf()]);
    let preferred = prefs();
    let resolver = SymbolResolver::new(&index, &preferred);

    let def = resolver.resolve("XGBRegressor.fit", None).unwrap();
    assert_eq!(def.qualname, "xgboost.sklearn.XGBRegressor.fit");

    // Evidence built from the auxiliary root carries its provenance.
    let engine = SearchEngine::new(&index, &preferred);
    let ev = engine.open_symbol("XGBRegressor.fit", None).unwrap();
    assert_eq!(ev.source, SourceKind::ExtraLib);
    assert!(ev.snippet.contains("def fit"));
}

#[test]
fn s2_ambiguity_prefers_configured_libraries_then_shorter_names() {
    let repo = TempDir::new().unwrap();
    write(
        repo.path(),
        "app/local.py",
        "class Model:\n    def fit(self):\n        pass\n",
    );
    write(
        repo.path(),
        "vendored/sklearn/base.py",
        "class Model:\n    def fit(self):\n        pass\n",
    );
    let index = build(repo.path(), Vec::new());

    let preferred = prefs();
    let with_prefs = SymbolResolver::new(&index, &preferred);
    let def = with_prefs.resolve("Model.fit", None).unwrap();
    assert_eq!(def.qualname, "vendored.sklearn.base.Model.fit");

    // Without preferences only the length tie-break remains.
    let without_prefs = SymbolResolver::new(&index, NO_PREFS);
    let def = without_prefs.resolve("Model.fit", None).unwrap();
    assert_eq!(def.qualname, "app.local.Model.fit");
}

#[test]
fn s3_resolves_module_alias_calls_through_the_hint_file() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let resolver = SymbolResolver::new(&index, NO_PREFS);

    // `tf` is an alias for core.transformers inside formatters.py.
    let def = resolver
        .resolve("tf.transform_data_structure", Some("processors/formatters.py"))
        .unwrap();
    assert_eq!(def.qualname, "core.transformers.transform_data_structure");

    // A dotted attribute chain through the alias lands on the same
    // definition.
    let def = resolver
        .resolve("tf.Widget.render", Some("processors/formatters.py"))
        .unwrap();
    assert_eq!(def.qualname, "core.transformers.Widget.render");
}

#[test]
fn s3_fuzzy_fallback_ranks_preferred_libraries_in_order() {
    let repo = TempDir::new().unwrap();
    // The hint file binds `Booster` to a module that is not indexed, so
    // the import-aware exact and suffix probes all miss and resolution
    // falls through to fuzzy containment.
    write(
        repo.path(),
        "train.py",
        "from gbm.core import Booster\n\ndef run_session():\n    pass\n",
    );
    // Two fuzzy candidates for `Booster.train`, each matching a
    // different preferred library; the xgboost name is longer.
    write(
        repo.path(),
        "vendored/sklearn/ensemble.py",
        "class BoosterMixin:\n    def train_stage(self):\n        pass\n",
    );
    write(
        repo.path(),
        "vendored/xgboost/training.py",
        "class BoosterImpl:\n    def train_loop_runner(self):\n        pass\n",
    );
    let index = build(repo.path(), Vec::new());

    // `sklearn` is listed before `xgboost`, so it wins even though the
    // xgboost-matching name is longer.
    let preferred = prefs();
    let resolver = SymbolResolver::new(&index, &preferred);
    let def = resolver.resolve("Booster.train", Some("train.py")).unwrap();
    assert_eq!(def.qualname, "vendored.sklearn.ensemble.BoosterMixin.train_stage");

    // Reversing the list flips the winner the same way S2 does.
    let reversed = vec!["xgboost".to_string(), "sklearn".to_string()];
    let resolver = SymbolResolver::new(&index, &reversed);
    let def = resolver.resolve("Booster.train", Some("train.py")).unwrap();
    assert_eq!(def.qualname, "vendored.xgboost.training.BoosterImpl.train_loop_runner");
}

#[test]
fn s4_short_name_without_hint_returns_first_candidate() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let resolver = SymbolResolver::new(&index, NO_PREFS);

    let def = resolver.resolve("aggregate_metrics", None).unwrap();
    assert_eq!(def.qualname, "core.aggregators.aggregate_metrics");
}

#[test]
fn s4_import_binding_scoring_disambiguates_with_hint_file() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let resolver = SymbolResolver::new(&index, NO_PREFS);

    // formatters.py imports aggregate_metrics from core.transformers, so
    // the import-binding bonus outweighs build order.
    let def = resolver
        .resolve("aggregate_metrics", Some("processors/formatters.py"))
        .unwrap();
    assert_eq!(def.qualname, "core.transformers.aggregate_metrics");
}

#[test]
fn s4_same_file_bonus_dominates() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "alpha.py", "def helper():\n    return 1\n");
    write(temp.path(), "beta.py", "def helper():\n    return 2\n");
    let index = build(temp.path(), Vec::new());
    let resolver = SymbolResolver::new(&index, NO_PREFS);

    let def = resolver.resolve("helper", Some("beta.py")).unwrap();
    assert_eq!(def.qualname, "beta.helper");
}

#[test]
fn resolver_reports_misses() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let resolver = SymbolResolver::new(&index, NO_PREFS);

    assert!(resolver.resolve("validate_data", None).is_none());
    assert!(resolver.resolve("no.such.symbol", Some("processors/pipeline.py")).is_none());
}

#[test]
fn evidence_snippet_matches_the_file_at_the_recorded_span() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let preferred = prefs();
    let engine = SearchEngine::new(&index, &preferred);

    let ev = engine
        .open_symbol("processors.pipeline.process_data_pipeline", None)
        .unwrap();
    assert_eq!(ev.kind, SymbolKind::Function);
    assert_eq!(ev.source, SourceKind::MainRepo);

    // The snippet equals the file content at the recorded span.
    let content = fs::read_to_string(temp.path().join(&ev.defined_in)).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    let expected = lines[(ev.span.0 as usize - 1)..(ev.span.1 as usize)].join("\n");
    assert_eq!(ev.snippet, expected);
    assert!(ev.snippet.starts_with("def process_data_pipeline"));

    assert_eq!(
        ev.extracted_calls,
        vec![
            "_initialize_processing_state",
            "_execute_transformation_phase",
            "_execute_computation_phase",
        ]
    );
}

#[test]
fn find_usages_caps_hits_and_records_locations() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let preferred = prefs();
    let engine = SearchEngine::new(&index, &preferred);

    let hits = engine.find_usages("validate_numeric_range", 2);
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.text.contains("validate_numeric_range")));
    assert!(hits[0].line >= 1);

    let all = engine.find_usages("validate_numeric_range", 50);
    assert!(all.len() > 2);
}

#[test]
fn hybrid_search_returns_defs_and_usages() {
    let temp = TempDir::new().unwrap();
    sample_repo(temp.path());
    let index = build(temp.path(), Vec::new());
    let preferred = prefs();
    let engine = SearchEngine::new(&index, &preferred);

    let result = engine.hybrid_search("transform_data_structure", None, 5);
    assert_eq!(result.defs.len(), 1);
    assert_eq!(result.defs[0].qualname, "core.transformers.transform_data_structure");
    assert!(!result.usages.is_empty());

    // A miss still greps for textual occurrences.
    let miss = engine.hybrid_search("validate_data", None, 5);
    assert!(miss.defs.is_empty());
}
