//! Adapter for circomspect, Trail of Bits' static analyzer for Circom.
//!
//! Output is line-oriented in the codespan style:
//!
//! ```text
//! circomspect: analyzing template 'Multiplier'
//! warning[CS0005]: Intermediate signals should typically occur in at least two separate constraints.
//!    ┌─ circuits/circuit.circom:7:5
//!    │
//!  7 │     out <-- a * b;
//! ```
//!
//! Section markers give the enclosing template/function, the `┌─` line gives
//! file and line, and the `CS` code maps onto a vulnerability class.

use std::path::Path;

use crate::model::{ExecutionRecord, Finding, LineSpan, Severity, SourceLocation, VulnClass};
use crate::registry::ToolDescriptor;
use crate::Dsl;

use super::{resolve_tool_binary, Invocation, InvocationOptions, ParseOutcome, ToolAdapter};

/// Env var overriding the circomspect binary (defaults to PATH lookup).
pub const CIRCOMSPECT_BIN_ENV: &str = "ZK_TRIAGE_CIRCOMSPECT_BIN";

/// Map from circomspect report codes to vulnerability classes, mirroring the
/// tool's report_code table. CS0014 (UnconstrainedLessThan), CS0015
/// (UnconstrainedDivision), and CS0017 (UnderConstrainedSignal) are the
/// under-constraint checks; every other code keeps its descriptive name.
fn cs_class(code: &str) -> Option<VulnClass> {
    let name = match code {
        "CS0001" => "shadowing-variable",
        "CS0002" => "parameter-name-collision",
        "CS0003" => "field-element-comparison",
        "CS0004" => "field-element-arithmetic",
        "CS0005" => "signal-assignment-statement",
        "CS0006" => "unused-variable-value",
        "CS0007" => "unused-parameter-value",
        "CS0008" => "variable-without-side-effect",
        "CS0009" => "constant-branch-condition",
        "CS0010" => "non-strict-binary-conversion",
        "CS0011" => "cyclomatic-complexity",
        "CS0012" => "too-many-arguments",
        "CS0013" => "unnecessary-signal-assignment",
        "CS0014" | "CS0015" | "CS0017" => "under-constrained",
        "CS0016" => "bn254-specific-circuit",
        "CS0018" => "unused-output-signal",
        _ => return None,
    };
    name.parse().ok()
}

pub struct CircomspectAdapter {
    descriptor: ToolDescriptor,
}

impl CircomspectAdapter {
    pub fn new() -> Self {
        Self { descriptor: ToolDescriptor::new("circomspect", &[Dsl::Circom], 300) }
    }
}

impl Default for CircomspectAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolAdapter for CircomspectAdapter {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn build_invocation(&self, circuit: &Path, options: &InvocationOptions) -> Invocation {
        // -v enables the per-template section markers the parser keys
        // function attribution off.
        let mut args = vec![
            circuit.display().to_string(),
            "-l".to_string(),
            "INFO".to_string(),
            "-v".to_string(),
        ];
        args.extend(options.extra_args.iter().cloned());
        Invocation {
            program: resolve_tool_binary(CIRCOMSPECT_BIN_ENV, "circomspect"),
            args,
            cwd: None,
        }
    }

    fn parse(&self, record: &ExecutionRecord) -> ParseOutcome {
        // circomspect exits 1 when it reported anything; only genuinely
        // abnormal terminations count as tool failure.
        if let Some(code) = record.exit_code {
            if code != 0 && code != 1 {
                return ParseOutcome::failed(format!("circomspect exited with code {code}"));
            }
        }

        let mut outcome = ParseOutcome::default();
        let mut current: Option<PendingFinding> = None;
        let mut context_function: Option<String> = None;

        // Diagnostics go to stderr in recent releases; accept either stream.
        for line in record.stdout.lines().chain(record.stderr.lines()) {
            if let Some(name) = section_marker(line) {
                if let Some(pending) = current.take() {
                    outcome.findings.push(pending.finish());
                }
                context_function = Some(name.to_string());
                continue;
            }

            if let Some(header) = parse_header(line) {
                if let Some(pending) = current.take() {
                    outcome.findings.push(pending.finish());
                }
                current = Some(PendingFinding {
                    code: header.0,
                    message: header.1,
                    severity: header.2,
                    function: context_function.clone(),
                    file: None,
                    line: None,
                });
                continue;
            }

            if let Some(pending) = current.as_mut() {
                if let Some((file, line_no)) = parse_anchor(line) {
                    pending.file = Some(file);
                    pending.line = pending.line.or(line_no);
                } else if pending.line.is_none() {
                    if let Some(n) = snippet_line_number(line) {
                        pending.line = Some(n);
                    }
                }
            }
        }

        if let Some(pending) = current.take() {
            outcome.findings.push(pending.finish());
        }

        if outcome.findings.is_empty()
            && record.exit_code == Some(1)
            && !record.timed_out
            && record.stdout.is_empty()
            && record.stderr.is_empty()
        {
            outcome.warnings.push("circomspect exited 1 without producing any output".to_string());
        }

        outcome
    }
}

struct PendingFinding {
    code: String,
    message: String,
    severity: Severity,
    function: Option<String>,
    file: Option<String>,
    line: Option<u32>,
}

impl PendingFinding {
    fn finish(self) -> Finding {
        let location = self.file.map(|file| SourceLocation {
            file,
            function: self.function,
            lines: self.line.map(LineSpan::single),
        });
        Finding {
            class: cs_class(&self.code),
            check_id: self.code,
            message: self.message,
            severity: self.severity,
            location,
        }
    }
}

/// `circomspect: analyzing template 'Multiplier'` (also `function '...'`).
fn section_marker(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("circomspect: analyzing ")?;
    let rest = rest.strip_prefix("template ").or_else(|| rest.strip_prefix("function "))?;
    rest.strip_prefix('\'')?.strip_suffix('\'')
}

/// `warning[CS0005]: message` header line.
fn parse_header(line: &str) -> Option<(String, String, Severity)> {
    let trimmed = line.trim_start();
    let severity = if trimmed.starts_with("warning[") {
        Severity::Warning
    } else if trimmed.starts_with("error[") {
        Severity::Error
    } else if trimmed.starts_with("note[") {
        Severity::Info
    } else {
        return None;
    };
    let open = trimmed.find('[')?;
    let close = trimmed.find(']')?;
    if close <= open + 1 {
        return None;
    }
    let code = &trimmed[open + 1..close];
    if !code.starts_with("CS") {
        return None;
    }
    let message = trimmed[close + 1..].trim_start_matches(':').trim().to_string();
    Some((code.to_string(), message, severity))
}

/// `   ┌─ circuits/circuit.circom:7:5` anchor line.
fn parse_anchor(line: &str) -> Option<(String, Option<u32>)> {
    let rest = line.split("┌─").nth(1)?.trim();
    // path:line:column; the path itself may contain no further colons here.
    let mut parts = rest.rsplitn(3, ':');
    let _col = parts.next()?;
    let line_no = parts.next()?.parse::<u32>().ok();
    let file = parts.next()?.trim().to_string();
    if file.is_empty() {
        return None;
    }
    Some((file, line_no))
}

/// ` 7 │ out <-- a * b;` snippet line; the leading number is the source line.
fn snippet_line_number(line: &str) -> Option<u32> {
    let (prefix, _) = line.split_once('│')?;
    prefix.trim().parse::<u32>().ok()
}
