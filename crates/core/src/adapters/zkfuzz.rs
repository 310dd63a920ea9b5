//! Adapter for zkfuzz, a mutation fuzzer for Circom witness generators.
//!
//! A healthy run ends with the `Everything went okay` trailer. A discovered
//! bug appears as a `Counter Example` marker with the violated expression on
//! the following line, wrapped in box-drawing junk that gets stripped.

use std::path::Path;

use crate::model::{ExecutionRecord, Finding, Severity, VulnClass};
use crate::registry::ToolDescriptor;
use crate::Dsl;

use super::{resolve_tool_binary, Invocation, InvocationOptions, ParseOutcome, ToolAdapter};

/// Env var overriding the zkfuzz binary (defaults to PATH lookup).
pub const ZKFUZZ_BIN_ENV: &str = "ZK_TRIAGE_ZKFUZZ_BIN";

const OK_TRAILER: &str = "Everything went okay";
const COUNTER_EXAMPLE: &str = "Counter Example";
const NO_COUNTER_EXAMPLE: &str = "No Counter Example Found";

pub struct ZkfuzzAdapter {
    descriptor: ToolDescriptor,
}

impl ZkfuzzAdapter {
    pub fn new() -> Self {
        Self { descriptor: ToolDescriptor::new("zkfuzz", &[Dsl::Circom], 300) }
    }
}

impl Default for ZkfuzzAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolAdapter for ZkfuzzAdapter {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn build_invocation(&self, circuit: &Path, options: &InvocationOptions) -> Invocation {
        let mut args = vec![circuit.display().to_string()];
        args.extend(options.extra_args.iter().cloned());
        Invocation { program: resolve_tool_binary(ZKFUZZ_BIN_ENV, "zkfuzz"), args, cwd: None }
    }

    fn parse(&self, record: &ExecutionRecord) -> ParseOutcome {
        let lines: Vec<&str> = record.stdout.lines().collect();

        let clean_exit = lines.iter().rev().find(|l| !l.trim().is_empty());
        match clean_exit {
            Some(last) if last.contains(OK_TRAILER) => {}
            _ if record.timed_out => {}
            _ => {
                return ParseOutcome::failed(
                    "zkfuzz output is missing the completion trailer".to_string(),
                );
            }
        }

        let mut outcome = ParseOutcome::default();
        for (i, line) in lines.iter().enumerate() {
            if line.contains(NO_COUNTER_EXAMPLE) {
                break;
            }
            if line.contains(COUNTER_EXAMPLE) {
                match lines.get(i + 1).map(|raw| strip_decoration(raw)) {
                    Some(detail) if !detail.is_empty() => {
                        let class = detect_class(&detail);
                        outcome.findings.push(Finding {
                            check_id: "zkfuzz::counter-example".to_string(),
                            message: detail,
                            severity: Severity::Error,
                            class,
                            location: None,
                        });
                    }
                    _ => outcome.warnings.push(
                        "zkfuzz reported a counter example without detail".to_string(),
                    ),
                }
                break;
            }
        }

        outcome
    }
}

/// Drop box-drawing characters and other leading/trailing junk around the
/// counter-example detail line.
fn strip_decoration(raw: &str) -> String {
    raw.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '(' || c == ')')).to_string()
}

/// Best-effort class tag from the counter-example text.
fn detect_class(detail: &str) -> Option<VulnClass> {
    [
        VulnClass::UnderConstrained,
        VulnClass::OverConstrained,
        VulnClass::AssignmentWithoutConstraint,
        VulnClass::TypeConfusion,
    ]
    .into_iter()
    .find(|class| class.mentioned_in(detail))
}
