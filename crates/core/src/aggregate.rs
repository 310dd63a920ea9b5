//! Result aggregation and on-disk persistence.
//!
//! Rows from concurrent workers funnel into one [`Aggregator`] behind a lock;
//! summaries are recomputed from the recorded rows so calling
//! [`Aggregator::summarize`] twice always yields the same answer. Persisted
//! artifacts form an append-only tree, one directory per (target, tool) pair:
//!
//! ```text
//! run_20260824_153000/
//!   summary.json
//!   <target>/
//!     <tool>/
//!       raw.json        execution record, verbatim output included
//!       findings.json   normalized findings plus parse warnings
//!       verdict.json    only when the target carried a ground truth
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::model::{ExecutionRecord, Finding, SummaryStatistics, Verdict};

/// Everything produced for one (target, tool) pair.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub target_id: String,
    pub tool_id: String,
    pub record: ExecutionRecord,
    pub findings: Vec<Finding>,
    pub parse_warnings: Vec<String>,
    /// Absent when the target shipped no ground truth.
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize result artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Thread-safe collector for result rows.
#[derive(Debug, Default)]
pub struct Aggregator {
    rows: Mutex<Vec<ResultRow>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, row: ResultRow) {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).push(row);
    }

    /// Recompute batch statistics from the rows recorded so far.
    pub fn summarize(&self) -> SummaryStatistics {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut stats = SummaryStatistics::default();
        for row in rows.iter() {
            stats.executions += 1;
            stats.total_findings += row.findings.len();
            *stats.findings_per_tool.entry(row.tool_id.clone()).or_default() +=
                row.findings.len();
            stats.total_duration_ms += row.record.duration_ms;
            if let Some(verdict) = &row.verdict {
                stats.batch.bump(verdict.kind);
                stats.per_target.entry(row.target_id.clone()).or_default().bump(verdict.kind);
            }
        }
        stats
    }

    /// Drain the collector, returning rows in the order they were recorded.
    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    /// Write every recorded row plus the batch summary under `layout`.
    pub fn persist(&self, layout: &RunLayout) -> Result<SummaryStatistics, PersistError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        for row in rows.iter() {
            let dir = layout.pair_dir(&row.target_id, &row.tool_id);
            fs::create_dir_all(&dir)
                .map_err(|source| PersistError::Io { path: dir.clone(), source })?;
            write_json(&dir.join("raw.json"), &row.record)?;
            write_json(
                &dir.join("findings.json"),
                &FindingsArtifact { findings: &row.findings, warnings: &row.parse_warnings },
            )?;
            if let Some(verdict) = &row.verdict {
                write_json(&dir.join("verdict.json"), verdict)?;
            }
        }
        drop(rows);

        let stats = self.summarize();
        write_json(&layout.summary_path(), &stats)?;
        info!(run = %layout.root().display(), executions = stats.executions, "persisted run");
        Ok(stats)
    }
}

#[derive(Serialize)]
struct FindingsArtifact<'a> {
    findings: &'a [Finding],
    warnings: &'a [String],
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|source| PersistError::Io { path: path.to_path_buf(), source })
}

/// Filesystem layout of one persisted run.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Allocate a fresh timestamped run directory under `base`. When two
    /// runs land in the same second, a numeric suffix keeps them distinct;
    /// an existing run directory is never reused or overwritten.
    pub fn allocate(base: &Path) -> Result<Self, PersistError> {
        fs::create_dir_all(base)
            .map_err(|source| PersistError::Io { path: base.to_path_buf(), source })?;
        let stamp = Utc::now().format("run_%Y%m%d_%H%M%S").to_string();
        let mut candidate = base.join(&stamp);
        let mut suffix = 1u32;
        loop {
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(Self { root: candidate }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    candidate = base.join(format!("{stamp}-{suffix}"));
                    suffix += 1;
                }
                Err(source) => return Err(PersistError::Io { path: candidate, source }),
            }
        }
    }

    /// Reopen an existing run directory (used by tests and tooling).
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pair_dir(&self, target_id: &str, tool_id: &str) -> PathBuf {
        self.root.join(sanitize(target_id)).join(sanitize(tool_id))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join("summary.json")
    }
}

/// Target ids come from dataset directory names and manifest keys; squash
/// anything that would escape the run directory.
pub(crate) fn sanitize(id: &str) -> String {
    id.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect()
}
