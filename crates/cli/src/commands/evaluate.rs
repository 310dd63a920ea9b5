use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use triage_core::aggregate::{ResultRow, RunLayout};
use triage_core::batch::{BatchOptions, BatchRunner, TargetSpec};
use triage_core::evaluate::Evaluator;
use triage_core::model::{Dsl, SummaryStatistics};
use triage_core::prepare::CopyPreparer;
use triage_core::registry::default_registry;

use crate::{canonicalize_or_current, parse_tool_selection};

/// File name marking a curated bug directory inside a dataset tree.
const DATASET_CONFIG_NAME: &str = "zkbugs_config.json";

pub struct EvaluateArgs {
    pub manifest: Option<String>,
    pub dataset: Option<String>,
    pub tools: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub out: String,
    pub workers: usize,
    pub json: bool,
}

/// YAML batch manifest: a list of targets, each with an optional ground
/// truth. Relative paths resolve against the manifest's own directory.
#[derive(Debug, Deserialize)]
struct Manifest {
    targets: Vec<TargetSpec>,
}

#[derive(Serialize)]
struct EvaluateReport<'a> {
    run_dir: String,
    summary: &'a SummaryStatistics,
    rows: &'a [ResultRow],
}

/// Score the selected tools against a batch of targets with ground truth.
pub async fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    let targets = match (&args.manifest, &args.dataset) {
        (Some(manifest), None) => load_manifest(&canonicalize_or_current(manifest)?)?,
        (None, Some(dataset)) => discover_dataset(&canonicalize_or_current(dataset)?)?,
        _ => return Err(anyhow!("Provide exactly one of --manifest or --dataset")),
    };
    if targets.is_empty() {
        return Err(anyhow!("No targets to evaluate"));
    }
    tracing::info!(targets = targets.len(), "loaded evaluation targets");

    let selection = parse_tool_selection(&args.tools);
    let options = BatchOptions {
        timeout: args.timeout_secs.map(Duration::from_secs),
        workers: args.workers,
        ..BatchOptions::default()
    };
    let runner = BatchRunner::new(
        default_registry(),
        Evaluator::default(),
        Arc::new(CopyPreparer),
        options,
    );

    let aggregator = runner.run(&targets, &selection).await.context("Evaluation failed")?;

    let out_base = canonicalize_or_current(&args.out)?;
    let layout = RunLayout::allocate(&out_base).context("Failed to allocate run directory")?;
    let summary = aggregator.persist(&layout).context("Failed to persist run artifacts")?;

    let mut rows = aggregator.into_rows();
    rows.sort_by(|a, b| (&a.target_id, &a.tool_id).cmp(&(&b.target_id, &b.tool_id)));

    if args.json {
        let report = EvaluateReport {
            run_dir: layout.root().display().to_string(),
            summary: &summary,
            rows: &rows,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Evaluated {} target(s), {} execution(s)", targets.len(), summary.executions);
    println!("  Run dir: {}", layout.root().display());
    println!();
    for row in &rows {
        match &row.verdict {
            Some(verdict) => println!(
                "- {} / {}: {} ({})",
                row.target_id, row.tool_id, verdict.kind, verdict.rationale
            ),
            None => println!(
                "- {} / {}: {} finding(s), no ground truth",
                row.target_id,
                row.tool_id,
                row.findings.len()
            ),
        }
    }
    println!();
    let counts = &summary.batch;
    println!("Totals:");
    println!("  true positives: {}", counts.true_positive);
    println!("  false negatives: {}", counts.false_negative);
    println!("  errors: {}", counts.error);
    println!("  timeouts: {}", counts.timeout);
    println!("  manual review: {}", counts.manual_review);

    Ok(())
}

fn load_manifest(path: &Path) -> Result<Vec<TargetSpec>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest at {}", path.display()))?;
    let manifest: Manifest =
        serde_yaml::from_str(&text).context("Failed to parse manifest YAML")?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(manifest
        .targets
        .into_iter()
        .map(|mut target| {
            target.circuit = resolve_against(base, &target.circuit);
            target.ground_truth = target.ground_truth.map(|p| resolve_against(base, &p));
            target
        })
        .collect())
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Walk a curated dataset tree. Every directory holding a
/// `zkbugs_config.json` becomes one target; the circuit is
/// `circuits/circuit.circom` when present, otherwise the first `.circom`
/// file found in the directory.
fn discover_dataset(root: &Path) -> Result<Vec<TargetSpec>> {
    let mut targets = Vec::new();
    walk_dataset(root, root, &mut targets)?;
    targets.sort_by(|a, b| a.id.cmp(&b.id));
    if targets.is_empty() {
        return Err(anyhow!(
            "No {} files found under {}",
            DATASET_CONFIG_NAME,
            root.display()
        ));
    }
    Ok(targets)
}

fn walk_dataset(root: &Path, dir: &Path, targets: &mut Vec<TargetSpec>) -> Result<()> {
    let config = dir.join(DATASET_CONFIG_NAME);
    if config.is_file() {
        if let Some(circuit) = find_circuit(dir) {
            let id = dir
                .strip_prefix(root)
                .map(|rel| rel.to_string_lossy().replace(['/', '\\'], "_"))
                .ok()
                .filter(|rel| !rel.is_empty())
                .unwrap_or_else(|| crate::infer_target_id(dir));
            targets.push(TargetSpec {
                id,
                circuit,
                dsl: Dsl::Circom,
                ground_truth: Some(config),
            });
        }
        return Ok(());
    }
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read dataset directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read dataset directory {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            walk_dataset(root, &path, targets)?;
        }
    }
    Ok(())
}

fn find_circuit(dir: &Path) -> Option<PathBuf> {
    let conventional = dir.join("circuits").join("circuit.circom");
    if conventional.is_file() {
        return Some(conventional);
    }
    for candidate_dir in [dir.to_path_buf(), dir.join("circuits")] {
        let Ok(entries) = fs::read_dir(&candidate_dir) else { continue };
        let mut circom: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "circom"))
            .collect();
        circom.sort();
        if let Some(first) = circom.into_iter().next() {
            return Some(first);
        }
    }
    None
}
