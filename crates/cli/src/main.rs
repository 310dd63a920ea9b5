use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zk_triage::commands::{
    analyze_command, evaluate_command, list_tools_command, AnalyzeArgs, EvaluateArgs,
};

/// Harness for running third-party zero-knowledge circuit analyzers and
/// scoring their reports against ground truth.
///
/// All substantive logic lives in `triage-core` (exposed in code as
/// `triage_core`); this binary only parses arguments and formats output.
#[derive(Parser, Debug)]
#[command(
    name = "zk-triage",
    version,
    about = "Run and score zero-knowledge circuit analyzers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the analyzers this binary knows how to drive.
    ListTools {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run tools against a single circuit and persist the raw results.
    Analyze {
        /// Path to the circuit file.
        #[arg(long)]
        circuit: String,

        /// Circuit DSL (circom, cairo, pil).
        #[arg(long, default_value = "circom")]
        dsl: String,

        /// Tools to run: `all` or a comma-separated list of names.
        #[arg(long, default_value = "all")]
        tools: Vec<String>,

        /// Per-invocation timeout in seconds; overrides each tool's default.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Directory under which the run tree is created.
        #[arg(long, default_value = "runs")]
        out: String,

        /// Maximum concurrent tool invocations.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Extra arguments appended to every tool invocation.
        #[arg(long = "extra-arg")]
        extra_args: Vec<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run tools against a batch of targets and score them against ground
    /// truth.
    ///
    /// Targets come either from a YAML manifest or from a curated dataset
    /// tree holding one `zkbugs_config.json` per bug directory.
    Evaluate {
        /// YAML manifest listing targets.
        #[arg(long, conflicts_with = "dataset")]
        manifest: Option<String>,

        /// Dataset root to scan for bug directories.
        #[arg(long)]
        dataset: Option<String>,

        /// Tools to run: `all` or a comma-separated list of names.
        #[arg(long, default_value = "all")]
        tools: Vec<String>,

        /// Per-invocation timeout in seconds; overrides each tool's default.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Directory under which the run tree is created.
        #[arg(long, default_value = "runs")]
        out: String,

        /// Maximum concurrent tool invocations.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::ListTools { json } => list_tools_command(json)?,
        Command::Analyze { circuit, dsl, tools, timeout_secs, out, workers, extra_args, json } => {
            analyze_command(AnalyzeArgs {
                circuit,
                dsl,
                tools,
                timeout_secs,
                out,
                workers,
                extra_args,
                json,
            })
            .await?
        }
        Command::Evaluate { manifest, dataset, tools, timeout_secs, out, workers, json } => {
            evaluate_command(EvaluateArgs {
                manifest,
                dataset,
                tools,
                timeout_secs,
                out,
                workers,
                json,
            })
            .await?
        }
    }

    Ok(())
}
