//! Adapter for Picus, an SMT-backed under-constraint prover.
//!
//! Picus emits a single verdict line rather than located diagnostics:
//! `The circuit is underconstrained`, `The circuit is properly constrained`,
//! or `Cannot determine whether the circuit is properly constrained`. A
//! positive verdict therefore produces one finding with no source location;
//! the evaluator routes those to manual review when the ground truth asks
//! for a specific spot.

use std::path::Path;

use crate::model::{ExecutionRecord, Finding, Severity, VulnClass};
use crate::registry::ToolDescriptor;
use crate::Dsl;

use super::{resolve_tool_binary, Invocation, InvocationOptions, ParseOutcome, ToolAdapter};

/// Env var overriding the Picus launcher (defaults to `run-picus` on PATH).
pub const PICUS_BIN_ENV: &str = "ZK_TRIAGE_PICUS_BIN";

const UNDERCONSTRAINED: &str = "The circuit is underconstrained";
const PROPERLY_CONSTRAINED: &str = "The circuit is properly constrained";
const UNDETERMINED: &str = "Cannot determine whether the circuit is properly constrained";

pub struct PicusAdapter {
    descriptor: ToolDescriptor,
}

impl PicusAdapter {
    pub fn new() -> Self {
        Self { descriptor: ToolDescriptor::new("picus", &[Dsl::Circom], 600) }
    }
}

impl Default for PicusAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolAdapter for PicusAdapter {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn build_invocation(&self, circuit: &Path, options: &InvocationOptions) -> Invocation {
        let mut args = vec![circuit.display().to_string()];
        args.extend(options.extra_args.iter().cloned());
        Invocation { program: resolve_tool_binary(PICUS_BIN_ENV, "run-picus"), args, cwd: None }
    }

    fn parse(&self, record: &ExecutionRecord) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        // A run that printed nothing at all gave no verdict; treat it as a
        // miss rather than a solver crash, which always leaves a trace on
        // one of the streams.
        if record.stdout.trim().is_empty() && record.stderr.trim().is_empty() {
            if !record.timed_out {
                outcome.warnings.push("picus produced no output".to_string());
            }
            return outcome;
        }

        let mut verdict_seen = false;

        for line in record.stdout.lines().map(str::trim) {
            if line.contains(UNDERCONSTRAINED) {
                verdict_seen = true;
                outcome.findings.push(Finding {
                    check_id: "picus::underconstrained".to_string(),
                    message: UNDERCONSTRAINED.to_string(),
                    severity: Severity::Error,
                    class: Some(VulnClass::UnderConstrained),
                    location: None,
                });
                break;
            }
            if line.contains(PROPERLY_CONSTRAINED) {
                verdict_seen = true;
                break;
            }
            if line.contains(UNDETERMINED) {
                verdict_seen = true;
                outcome
                    .warnings
                    .push("picus could not determine constraint status".to_string());
                break;
            }
        }

        // No recognizable verdict from a completed run means the solver
        // itself fell over (stack traces, setup errors, etc.).
        if !verdict_seen && !record.timed_out {
            return ParseOutcome::failed("picus produced no recognizable verdict".to_string());
        }

        outcome
    }
}
