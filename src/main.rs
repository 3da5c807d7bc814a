use clap::Parser;
use std::path::PathBuf;

use codescout::orchestrator::{self, RunOptions};
use codescout::{ChatClient, Settings, logging};

#[derive(Parser)]
#[command(name = "codescout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Explain a symbol from evidence gathered out of its repository")]
struct Cli {
    /// Path to the repository root
    repo: PathBuf,

    /// Target symbol, e.g. pkg.mod.func
    target: String,

    /// Output directory for run artifacts
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Maximum planner iterations
    #[arg(long)]
    max_iters: Option<usize>,

    /// Model used for planning
    #[arg(long)]
    planner_model: Option<String>,

    /// Model used for the final explanation
    #[arg(long)]
    synth_model: Option<String>,

    /// Repository-relative file that biases resolution of ambiguous references
    #[arg(long)]
    hint_file: Option<String>,

    /// Additional source roots to index (e.g. a vendored library checkout)
    #[arg(long, num_args = 0..)]
    extra_paths: Vec<PathBuf>,

    /// Custom instructions controlling explanation depth and focus
    #[arg(long)]
    explanation_prompt: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Using default configuration.");
        Settings::default()
    });
    logging::init_with_config(&settings.logging);

    // The credential is checked before any indexing happens.
    let llm = match ChatClient::new(&settings.llm) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let repo = std::fs::canonicalize(&cli.repo).unwrap_or(cli.repo);
    let extra_roots = cli
        .extra_paths
        .into_iter()
        .map(|p| std::fs::canonicalize(&p).unwrap_or(p))
        .collect();

    let opts = RunOptions {
        repo,
        target: cli.target,
        outdir: cli.outdir.unwrap_or_else(|| settings.run.output_dir.clone()),
        max_iters: cli.max_iters.unwrap_or(settings.run.max_iters),
        planner_model: cli
            .planner_model
            .unwrap_or_else(|| settings.run.planner_model.clone()),
        synth_model: cli
            .synth_model
            .unwrap_or_else(|| settings.run.synth_model.clone()),
        hint_file: cli.hint_file.filter(|h| !h.trim().is_empty()),
        extra_roots,
        explanation_prompt: cli.explanation_prompt.filter(|p| !p.trim().is_empty()),
    };

    if let Err(e) = orchestrator::run(&opts, &llm, &settings).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
