//! Batch orchestration: run selected tools against selected targets.
//!
//! Each (target, tool) pair is one unit of work. Pairs run concurrently up
//! to a worker limit, each inside its own scratch directory, and every pair
//! yields exactly one result row no matter what went wrong inside it. A
//! missing binary, a crashed solver, or a timeout degrades that single row;
//! nothing short of a panicking worker aborts the batch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::adapters::{InvocationOptions, ParseOutcome, ToolAdapter};
use crate::aggregate::{sanitize, Aggregator, ResultRow};
use crate::engine::ExecutionEngine;
use crate::evaluate::Evaluator;
use crate::ground_truth::{load_ground_truth, GroundTruthError};
use crate::model::{Dsl, ExecutionRecord, GroundTruth};
use crate::prepare::{ScratchDir, TargetPreparer};
use crate::registry::{RegistryError, ToolRegistry};

/// One circuit to analyze, with an optional ground truth for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub id: String,
    pub circuit: PathBuf,
    pub dsl: Dsl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<PathBuf>,
}

/// Which registered tools to run.
#[derive(Debug, Clone)]
pub enum ToolSelection {
    /// Every registered tool that supports the target's DSL.
    All,
    /// Named tools; each must exist, but a tool that does not support a
    /// particular target's DSL is skipped for that target with a warning.
    Named(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Overrides each tool's own default timeout when set.
    pub timeout: Option<Duration>,
    pub workers: usize,
    /// Base directory for per-pair scratch directories. Defaults to the
    /// system temp directory.
    pub scratch_root: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { timeout: None, workers: 4, scratch_root: None, extra_args: Vec::new() }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    GroundTruth(#[from] GroundTruthError),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Drives a whole batch and collects rows into an [`Aggregator`].
pub struct BatchRunner {
    registry: Arc<ToolRegistry>,
    engine: ExecutionEngine,
    evaluator: Arc<Evaluator>,
    preparer: Arc<dyn TargetPreparer>,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(
        registry: ToolRegistry,
        evaluator: Evaluator,
        preparer: Arc<dyn TargetPreparer>,
        options: BatchOptions,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            engine: ExecutionEngine::new(),
            evaluator: Arc::new(evaluator),
            preparer,
            options,
        }
    }

    /// Run `selection` against every target and return the filled collector.
    ///
    /// Ground-truth files are loaded up front so a malformed one fails the
    /// batch before any tool runs. Unknown tool names fail immediately too;
    /// everything after that point degrades per row.
    pub async fn run(
        &self,
        targets: &[TargetSpec],
        selection: &ToolSelection,
    ) -> Result<Aggregator, BatchError> {
        let mut units = Vec::new();
        for target in targets {
            let truth: Option<Arc<GroundTruth>> = match &target.ground_truth {
                Some(path) => Some(Arc::new(load_ground_truth(path)?)),
                None => None,
            };
            for adapter in self.select(selection, target)? {
                units.push((target.clone(), adapter, truth.clone()));
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut set: JoinSet<ResultRow> = JoinSet::new();
        for (target, adapter, truth) in units {
            let semaphore = Arc::clone(&semaphore);
            let engine = self.engine;
            let evaluator = Arc::clone(&self.evaluator);
            let preparer = Arc::clone(&self.preparer);
            let timeout = self.options.timeout;
            let extra_args = self.options.extra_args.clone();
            let scratch_root =
                self.options.scratch_root.clone().unwrap_or_else(std::env::temp_dir);
            set.spawn(async move {
                // Permit acquisition only fails when the semaphore is
                // closed, which never happens here.
                let _permit = semaphore.acquire_owned().await;
                run_pair(
                    &target,
                    adapter.as_ref(),
                    truth.as_deref(),
                    &engine,
                    &evaluator,
                    preparer.as_ref(),
                    timeout,
                    extra_args,
                    &scratch_root,
                )
                .await
            });
        }

        let aggregator = Aggregator::new();
        while let Some(joined) = set.join_next().await {
            aggregator.record(joined?);
        }
        Ok(aggregator)
    }

    fn select(
        &self,
        selection: &ToolSelection,
        target: &TargetSpec,
    ) -> Result<Vec<Arc<dyn ToolAdapter>>, RegistryError> {
        match selection {
            ToolSelection::All => Ok(self.registry.resolve_all(target.dsl)),
            ToolSelection::Named(names) => {
                let mut adapters = Vec::new();
                for name in names {
                    match self.registry.resolve(name, target.dsl) {
                        Ok(adapter) => adapters.push(adapter),
                        Err(err @ RegistryError::UnknownTool(_)) => return Err(err),
                        Err(RegistryError::UnsupportedDsl { tool, dsl }) => {
                            warn!(
                                tool = tool.as_str(),
                                target = target.id.as_str(),
                                dsl = %dsl,
                                "tool does not support target DSL, skipping pair"
                            );
                        }
                    }
                }
                Ok(adapters)
            }
        }
    }
}

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique scratch directory name for one pair. The pid separates concurrent
/// processes and the sequence number separates concurrent batches within one
/// process; the same (target, tool) pair may be live in both at once.
fn scratch_name(target_id: &str, tool_id: &str) -> String {
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("zk-triage-{}-{}-{}-{}", std::process::id(), sanitize(target_id), tool_id, seq)
}

/// Execute one (target, tool) pair end to end. Infallible by construction:
/// every failure mode is folded into the returned row.
#[allow(clippy::too_many_arguments)]
async fn run_pair(
    target: &TargetSpec,
    adapter: &dyn ToolAdapter,
    truth: Option<&GroundTruth>,
    engine: &ExecutionEngine,
    evaluator: &Evaluator,
    preparer: &dyn TargetPreparer,
    timeout: Option<Duration>,
    extra_args: Vec<String>,
    scratch_root: &std::path::Path,
) -> ResultRow {
    let tool_id = adapter.descriptor().id.clone();
    let scratch_name = scratch_name(&target.id, &tool_id);

    let failure = |reason: String| {
        let record = ExecutionRecord::launch_failure(&tool_id, &target.id, &reason);
        let outcome = ParseOutcome::failed(reason);
        let verdict = truth.map(|t| evaluator.evaluate(&record, &outcome, t));
        ResultRow {
            target_id: target.id.clone(),
            tool_id: tool_id.clone(),
            record,
            findings: outcome.findings,
            parse_warnings: outcome.warnings,
            verdict,
        }
    };

    let scratch = match ScratchDir::create(scratch_root, &scratch_name) {
        Ok(scratch) => scratch,
        Err(e) => return failure(format!("failed to create scratch directory: {e}")),
    };
    let staged = match preparer.prepare(&target.circuit, scratch.path()) {
        Ok(staged) => staged,
        Err(e) => return failure(format!("failed to prepare target: {e}")),
    };

    let mut invocation = adapter.build_invocation(&staged, &InvocationOptions { extra_args });
    if invocation.cwd.is_none() {
        invocation.cwd = Some(scratch.path().to_path_buf());
    }
    let timeout = timeout.unwrap_or_else(|| adapter.descriptor().default_timeout());

    let record = match engine.run(&invocation, &tool_id, &target.id, timeout).await {
        Ok(record) => record,
        Err(e) => return failure(e.to_string()),
    };
    let outcome = adapter.parse(&record);
    let verdict = truth.map(|t| evaluator.evaluate(&record, &outcome, t));

    ResultRow {
        target_id: target.id.clone(),
        tool_id,
        record,
        findings: outcome.findings,
        parse_warnings: outcome.warnings,
        verdict,
    }
}
