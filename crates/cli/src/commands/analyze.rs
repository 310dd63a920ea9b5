use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use triage_core::aggregate::{ResultRow, RunLayout};
use triage_core::batch::{BatchOptions, BatchRunner, TargetSpec};
use triage_core::evaluate::Evaluator;
use triage_core::model::Dsl;
use triage_core::prepare::CopyPreparer;
use triage_core::registry::default_registry;

use crate::{canonicalize_or_current, infer_target_id, parse_tool_selection, sha256_file};

pub struct AnalyzeArgs {
    pub circuit: String,
    pub dsl: String,
    pub tools: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub out: String,
    pub workers: usize,
    pub extra_args: Vec<String>,
    pub json: bool,
}

#[derive(Serialize)]
struct AnalyzeReport<'a> {
    circuit: String,
    circuit_sha256: String,
    run_dir: String,
    rows: &'a [ResultRow],
}

/// Run the selected tools against one circuit and persist the run tree.
///
/// No ground truth is involved here, so rows carry findings but no verdicts.
pub async fn analyze_command(args: AnalyzeArgs) -> Result<()> {
    let circuit = canonicalize_or_current(&args.circuit)?;
    if !circuit.is_file() {
        return Err(anyhow!("Circuit file does not exist: {}", circuit.display()));
    }
    let dsl: Dsl = args.dsl.parse().map_err(|e: String| anyhow!(e))?;
    let digest = sha256_file(&circuit)?;

    let target = TargetSpec {
        id: infer_target_id(&circuit),
        circuit: circuit.clone(),
        dsl,
        ground_truth: None,
    };
    let selection = parse_tool_selection(&args.tools);
    let options = BatchOptions {
        timeout: args.timeout_secs.map(Duration::from_secs),
        workers: args.workers,
        extra_args: args.extra_args.clone(),
        ..BatchOptions::default()
    };
    let runner = BatchRunner::new(
        default_registry(),
        Evaluator::default(),
        Arc::new(CopyPreparer),
        options,
    );

    tracing::info!(circuit = %circuit.display(), "starting analysis");
    let aggregator =
        runner.run(std::slice::from_ref(&target), &selection).await.context("Analysis failed")?;

    let out_base = canonicalize_or_current(&args.out)?;
    let layout = RunLayout::allocate(&out_base).context("Failed to allocate run directory")?;
    aggregator.persist(&layout).context("Failed to persist run artifacts")?;

    let mut rows = aggregator.into_rows();
    rows.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));

    if args.json {
        let report = AnalyzeReport {
            circuit: circuit.display().to_string(),
            circuit_sha256: digest,
            run_dir: layout.root().display().to_string(),
            rows: &rows,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Analyzed circuit: {}", circuit.display());
    println!("  SHA-256: {digest}");
    println!("  Run dir: {}", layout.root().display());
    println!();
    for row in &rows {
        let exit = row
            .record
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| if row.record.timed_out { "timeout".into() } else { "-".into() });
        println!(
            "- {}: {} finding(s) [exit {}, {} ms]",
            row.tool_id,
            row.findings.len(),
            exit,
            row.record.duration_ms
        );
        for finding in &row.findings {
            match &finding.location {
                Some(loc) => {
                    let lines =
                        loc.lines.map(|span| format!(":{span}")).unwrap_or_default();
                    println!("    {} {}{} - {}", finding.check_id, loc.file, lines, finding.message);
                }
                None => println!("    {} - {}", finding.check_id, finding.message),
            }
        }
        for warning in &row.parse_warnings {
            println!("    (warning) {warning}");
        }
    }

    Ok(())
}
