//! Per-analyzer adapters.
//!
//! Each wrapped analyzer has its own invocation quirks and an incompatible,
//! independently versioned output grammar (line-oriented diagnostics, JSON,
//! plain verdict lines). An adapter encapsulates both sides for one tool:
//! building the command the engine will spawn, and turning the raw execution
//! record back into normalized findings. The engine stays indifferent to
//! output formats; format churn is isolated to one adapter at a time.

use std::env;
use std::path::{Path, PathBuf};

use crate::model::{ExecutionRecord, Finding};
use crate::registry::ToolDescriptor;

mod circomspect;
mod picus;
mod zkfuzz;

pub use circomspect::CircomspectAdapter;
pub use picus::PicusAdapter;
pub use zkfuzz::ZkfuzzAdapter;

/// Fully resolved command the engine will spawn for one (tool, target) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory override. When `None`, the batch runner scopes the
    /// process to the target's scratch directory.
    pub cwd: Option<PathBuf>,
}

/// Extra, caller-supplied flags for an invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationOptions {
    pub extra_args: Vec<String>,
}

/// Result of parsing one execution record.
///
/// Parsing is total: malformed, truncated, or empty output degrades to an
/// empty finding list plus warnings, never an error. Partial output is the
/// normal case after a timeout kill and must not abort the batch.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub findings: Vec<Finding>,
    /// Parse degradations worth surfacing to a human (recorded, not raised).
    pub warnings: Vec<String>,
    /// The adapter judged this run a tool-internal failure. A non-zero exit
    /// code alone is not enough; several analyzers report findings through
    /// their exit status.
    pub tool_failed: bool,
}

impl ParseOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self { findings: Vec::new(), warnings: vec![reason.into()], tool_failed: true }
    }
}

/// Adapter contract implemented once per wrapped analyzer.
pub trait ToolAdapter: Send + Sync {
    /// Static identity and capabilities of the tool.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Build the command for one target. Deterministic: the same target and
    /// options always yield the same invocation.
    fn build_invocation(&self, circuit: &Path, options: &InvocationOptions) -> Invocation;

    /// Parse the raw record into normalized findings. Must accept any byte
    /// sequence without erroring.
    fn parse(&self, record: &ExecutionRecord) -> ParseOutcome;
}

impl std::fmt::Debug for dyn ToolAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAdapter").field("id", &self.descriptor().id).finish()
    }
}

/// Resolve a tool binary from an env override, falling back to PATH lookup
/// of the default name. Lets tests and exotic installs substitute binaries
/// without touching configuration.
pub fn resolve_tool_binary(env_var: &str, default: &str) -> PathBuf {
    env::var_os(env_var).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}
