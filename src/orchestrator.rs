//! Run orchestration.
//!
//! Builds the index, bootstraps the blackboard with the target's
//! evidence, then alternates planner and executor until the planner
//! stops or the iteration cap is reached, and finally synthesizes the
//! explanation. The blackboard is persisted after every phase so the
//! last good state survives a crash.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::agents::{ExecutorAgent, PlannerAgent, SynthesizerAgent};
use crate::blackboard::Blackboard;
use crate::config::Settings;
use crate::error::{RunError, RunResult};
use crate::indexing::RepoIndex;
use crate::llm::LanguageModel;
use crate::logging;
use crate::output::{RunLogger, write_json, write_text};
use crate::search::SearchEngine;

/// Everything one run needs, resolved from CLI arguments and settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub repo: PathBuf,
    pub target: String,
    pub outdir: PathBuf,
    pub max_iters: usize,
    pub planner_model: String,
    pub synth_model: String,
    pub hint_file: Option<String>,
    pub extra_roots: Vec<PathBuf>,
    pub explanation_prompt: Option<String>,
}

/// Execute one full comprehension run.
pub async fn run<M: LanguageModel>(
    opts: &RunOptions,
    llm: &M,
    settings: &Settings,
) -> RunResult<()> {
    std::fs::create_dir_all(&opts.outdir).map_err(|e| RunError::Artifact {
        path: opts.outdir.clone(),
        source: e,
    })?;
    let run_log_path = opts.outdir.join("run.log");
    let logger = RunLogger::new(&run_log_path);
    // Tracing diagnostics land in the same artifact for the duration of
    // the run; the guard detaches them on any exit path.
    let _diagnostics = logging::mirror_to(&run_log_path);
    logger.log(&format!(
        "START run repo={} target={} max_iters={} planner_model={} synth_model={} \
         hint_file={:?} extra_roots={:?} explanation_prompt={:?}",
        opts.repo.display(),
        opts.target,
        opts.max_iters,
        opts.planner_model,
        opts.synth_model,
        opts.hint_file,
        opts.extra_roots,
        opts.explanation_prompt,
    ));

    println!("[init] building AST index ...");
    logger.log("[init] building AST index ...");
    if !opts.extra_roots.is_empty() {
        let roots: Vec<String> = opts.extra_roots.iter().map(|p| p.display().to_string()).collect();
        println!("[init] indexing repo + {} extra root(s): {roots:?}", roots.len());
        logger.log(&format!("[init] extra_roots: {roots:?}"));
    }
    let mut index = RepoIndex::new(opts.repo.clone(), opts.extra_roots.clone());
    index.build()?;
    println!("[init] indexed symbols: {}", index.symbol_count());
    logger.log(&format!("[init] indexed symbols: {}", index.symbol_count()));

    let search = SearchEngine::new(&index, &settings.resolver.preferred_libraries);
    let planner = PlannerAgent::new(llm, &opts.planner_model, opts.explanation_prompt.clone());
    let executor = ExecutorAgent::new(&search);
    let synthesizer = SynthesizerAgent::new(llm, &opts.synth_model, opts.explanation_prompt.clone());

    let mut bb = Blackboard::new(opts.repo.clone(), opts.target.clone());
    let hint_file = opts.hint_file.as_deref();

    println!("[bootstrap] OPEN target symbol ...");
    logger.log(&format!(
        "[bootstrap] target={}, hint_file={hint_file:?}",
        opts.target
    ));
    let bootstrap_hint = bootstrap_hint_file(&opts.repo, &opts.target, hint_file);
    logger.log(&format!("[bootstrap] effective hint_file={bootstrap_hint:?}"));

    let Some(ev0) = search.open_symbol(&opts.target, bootstrap_hint.as_deref()) else {
        let msg = format!("[fatal] cannot resolve target symbol: {}", opts.target);
        println!("{msg}");
        logger.log(&msg);
        bb.mark_unresolved(&opts.target, "bootstrap OPEN_SYMBOL failed");
        persist(&opts.outdir, &bb)?;
        logger.log_json("blackboard_fatal", &bb.to_json());
        return Err(RunError::TargetUnresolved {
            target: opts.target.clone(),
        });
    };
    bb.current_focus = ev0.symbol_ref.clone();
    bb.add_evidence(ev0);
    persist(&opts.outdir, &bb)?;
    logger.log_json("blackboard_after_bootstrap", &bb.to_json());

    for iteration in 0..opts.max_iters {
        bb.iterations = iteration as u32 + 1;
        persist(&opts.outdir, &bb)?;

        let header = format!("[loop] iter={} focus={}", bb.iterations, bb.current_focus);
        println!("\n{header}");
        logger.log(&header);

        let plan = planner.plan(&bb, hint_file).await?;
        bb.log(format!("[planner] stop={} reason={}", plan.stop, plan.reason));
        logger.log_json(
            "planner_output",
            &serde_json::json!({
                "stop": plan.stop,
                "reason": plan.reason,
                "actions": plan.actions,
                "blackboard_patch": plan.blackboard_patch,
            }),
        );
        bb.apply_patch(&plan.blackboard_patch);

        if plan.stop {
            let msg = "[loop] planner stop=true, synthesizing ...";
            println!("{msg}");
            logger.log(msg);
            break;
        }

        let msg = format!("[loop] executor actions={}", plan.actions.len());
        println!("{msg}");
        logger.log(&msg);
        executor.execute(&mut bb, &plan.actions, hint_file);

        persist(&opts.outdir, &bb)?;
        logger.log_json("blackboard_after_executor", &bb.to_json());
    }

    info!("synthesizing final explanation");
    let explanation = synthesizer.synthesize(&bb).await?;
    let explanation_path = opts.outdir.join("final_explanation.md");
    write_text(&explanation_path, &explanation).map_err(|e| RunError::Artifact {
        path: explanation_path.clone(),
        source: e,
    })?;
    persist(&opts.outdir, &bb)?;
    logger.log_json("final_blackboard", &bb.to_json());
    logger.log(&format!("final_explanation:\n{explanation}"));

    println!("\n[done] outputs:");
    println!("  - {}", opts.outdir.join("blackboard.json").display());
    println!("  - {}", explanation_path.display());
    logger.log("[done] run finished");
    Ok(())
}

/// Bootstrap hint file: the caller-supplied value, else probe whether the
/// target's first dotted segment names a module file at the repo root.
fn bootstrap_hint_file(repo: &Path, target: &str, hint_file: Option<&str>) -> Option<String> {
    if let Some(hint) = hint_file {
        return Some(hint.to_string());
    }
    let first = target.split('.').next()?;
    if !target.contains('.') {
        return None;
    }
    let candidate = format!("{first}.py");
    repo.join(&candidate).exists().then_some(candidate)
}

fn persist(outdir: &Path, bb: &Blackboard) -> RunResult<()> {
    let path = outdir.join("blackboard.json");
    write_json(&path, &bb.to_json()).map_err(|e| RunError::Artifact { path, source: e })
}
