//! Core data model for analyzer runs, findings, ground truth, and verdicts.
//!
//! Everything in here is a plain value type: created once, serialized as-is,
//! and never mutated after construction. The engine, adapters, evaluator, and
//! aggregator all communicate through these types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Circuit DSLs the harness knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dsl {
    Circom,
    Cairo,
    Pil,
}

impl Dsl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dsl::Circom => "circom",
            Dsl::Cairo => "cairo",
            Dsl::Pil => "pil",
        }
    }
}

impl fmt::Display for Dsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dsl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "circom" => Ok(Dsl::Circom),
            "cairo" => Ok(Dsl::Cairo),
            "pil" => Ok(Dsl::Pil),
            other => Err(format!("unknown DSL '{other}'")),
        }
    }
}

/// Severity as reported by the analyzer itself, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Inclusive line range. Ground-truth records use both `"7"` and `"10-15"`
/// spellings; both parse into this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpan {
    pub start: u32,
    pub end: u32,
}

impl LineSpan {
    pub fn single(line: u32) -> Self {
        Self { start: line, end: line }
    }

    pub fn contains(&self, line: u32) -> bool {
        line >= self.start && line <= self.end
    }

    pub fn overlaps(&self, other: &LineSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for LineSpan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse =
            |p: &str| p.trim().parse::<u32>().map_err(|_| format!("invalid line number '{p}'"));
        match s.split_once('-') {
            Some((a, b)) => Ok(Self { start: parse(a)?, end: parse(b)? }),
            None => Ok(Self::single(parse(s)?)),
        }
    }
}

/// Where an analyzer claims a problem lives. Granularity varies per tool:
/// some report file+function+line, some only a file, some nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<LineSpan>,
}

/// Known vulnerability classes for ZK circuits, with an escape hatch for
/// classes the built-in set does not cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VulnClass {
    UnderConstrained,
    OverConstrained,
    AssignmentWithoutConstraint,
    TrustedSetup,
    TypeConfusion,
    Other(String),
}

impl VulnClass {
    pub fn as_str(&self) -> &str {
        match self {
            VulnClass::UnderConstrained => "under-constrained",
            VulnClass::OverConstrained => "over-constrained",
            VulnClass::AssignmentWithoutConstraint => "assignment-without-constraint",
            VulnClass::TrustedSetup => "trusted-setup",
            VulnClass::TypeConfusion => "type-confusion",
            VulnClass::Other(name) => name.as_str(),
        }
    }

    /// Keyword fragments (normalized form) that signal this class in free text.
    fn fragments(&self) -> Vec<String> {
        match self {
            VulnClass::UnderConstrained => {
                vec!["underconstrained".into(), "notconstrained".into(), "unconstrained".into()]
            }
            VulnClass::OverConstrained => vec!["overconstrained".into()],
            VulnClass::AssignmentWithoutConstraint => {
                vec!["assignmentwithoutconstraint".into(), "signalassignment".into()]
            }
            VulnClass::TrustedSetup => vec!["trustedsetup".into()],
            VulnClass::TypeConfusion => vec!["typeconfusion".into()],
            VulnClass::Other(name) => vec![normalize(name)],
        }
    }

    /// True when `text` plausibly refers to this vulnerability class.
    /// Comparison ignores case, hyphens, and whitespace so that zkbugs
    /// spellings like `Under-Constrained` match analyzer phrasings like
    /// `the circuit is underconstrained`.
    pub fn mentioned_in(&self, text: &str) -> bool {
        let haystack = normalize(text);
        self.fragments().iter().any(|frag| !frag.is_empty() && haystack.contains(frag.as_str()))
    }
}

fn normalize(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_ascii_lowercase()
}

impl fmt::Display for VulnClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VulnClass {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match normalize(s).as_str() {
            "underconstrained" => VulnClass::UnderConstrained,
            "overconstrained" => VulnClass::OverConstrained,
            "assignmentwithoutconstraint" | "assignedbutnotconstrained" => {
                VulnClass::AssignmentWithoutConstraint
            }
            "trustedsetup" | "trustedsetupissue" => VulnClass::TrustedSetup,
            "typeconfusion" => VulnClass::TypeConfusion,
            _ => VulnClass::Other(s.trim().to_string()),
        })
    }
}

impl Serialize for VulnClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VulnClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(VulnClass::Other(raw)))
    }
}

/// One normalized diagnostic produced by an analyzer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Tool-specific rule or check identifier (e.g. `CS0005`).
    pub check_id: String,
    pub message: String,
    pub severity: Severity,
    /// Vulnerability class the adapter mapped this check to, when a stable
    /// mapping exists for the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<VulnClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// Expected vulnerability location from a ground-truth record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<LineSpan>,
}

/// Externally supplied, known-correct description of a target's bug.
/// Used only for scoring, never for detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub vulnerability: VulnClass,
    #[serde(default)]
    pub location: GroundTruthLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Raw outcome of one analyzer invocation against one target.
///
/// Created exactly once per (tool, target) pair and immutable afterwards.
/// Timeouts are recorded here, not raised: `timed_out = true` plus whatever
/// partial output the process produced before it was killed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_id: String,
    pub target_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when the process was killed (timeout) or never launched.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ExecutionRecord {
    /// Record for an invocation that could not be launched at all (binary
    /// missing or not executable). The failure text lands in `stderr` so the
    /// persisted artifact still explains what happened.
    pub fn launch_failure(tool_id: &str, target_id: &str, reason: &str) -> Self {
        let now = Utc::now();
        Self {
            tool_id: tool_id.to_string(),
            target_id: target_id.to_string(),
            started_at: now,
            finished_at: now,
            exit_code: None,
            stdout: String::new(),
            stderr: reason.to_string(),
            timed_out: false,
            duration_ms: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Outcome tag for one (tool, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    TruePositive,
    FalseNegative,
    Error,
    Timeout,
    ManualReview,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictKind::TruePositive => "true_positive",
            VerdictKind::FalseNegative => "false_negative",
            VerdictKind::Error => "error",
            VerdictKind::Timeout => "timeout",
            VerdictKind::ManualReview => "manual_review",
        };
        f.write_str(s)
    }
}

/// Classification of one tool's performance against one target's ground
/// truth, with the matched finding (if any) and a human-readable rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<Finding>,
    pub rationale: String,
}

impl Verdict {
    pub fn new(kind: VerdictKind, matched: Option<Finding>, rationale: impl Into<String>) -> Self {
        Self { kind, matched, rationale: rationale.into() }
    }
}

/// Verdict tallies for one target or for a whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub true_positive: usize,
    pub false_negative: usize,
    pub error: usize,
    pub timeout: usize,
    pub manual_review: usize,
}

impl VerdictCounts {
    pub fn bump(&mut self, kind: VerdictKind) {
        match kind {
            VerdictKind::TruePositive => self.true_positive += 1,
            VerdictKind::FalseNegative => self.false_negative += 1,
            VerdictKind::Error => self.error += 1,
            VerdictKind::Timeout => self.timeout += 1,
            VerdictKind::ManualReview => self.manual_review += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_negative + self.error + self.timeout + self.manual_review
    }
}

/// Batch-wide statistics, recomputable at any time from the recorded rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub batch: VerdictCounts,
    /// Per-target tallies, keyed by target id. BTreeMap keeps report order
    /// stable across runs.
    pub per_target: std::collections::BTreeMap<String, VerdictCounts>,
    /// Rows executed, including those without a ground truth (no verdict).
    pub executions: usize,
    pub total_findings: usize,
    /// Findings reported per tool, across all targets.
    pub findings_per_tool: std::collections::BTreeMap<String, usize>,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_span_parses_single_and_range() {
        assert_eq!("7".parse::<LineSpan>().unwrap(), LineSpan::single(7));
        assert_eq!("10-15".parse::<LineSpan>().unwrap(), LineSpan { start: 10, end: 15 });
        assert!("x".parse::<LineSpan>().is_err());
    }

    #[test]
    fn line_span_containment_and_overlap() {
        let span = LineSpan { start: 10, end: 15 };
        assert!(span.contains(10));
        assert!(span.contains(15));
        assert!(!span.contains(16));
        assert!(span.overlaps(&LineSpan::single(12)));
        assert!(!span.overlaps(&LineSpan { start: 16, end: 20 }));
    }

    #[test]
    fn vuln_class_parses_zkbugs_spellings() {
        let class: VulnClass = "Under-Constrained".parse().unwrap();
        assert_eq!(class, VulnClass::UnderConstrained);
        let class: VulnClass = "assignment-without-constraint".parse().unwrap();
        assert_eq!(class, VulnClass::AssignmentWithoutConstraint);
        let class: VulnClass = "something-new".parse().unwrap();
        assert_eq!(class, VulnClass::Other("something-new".into()));
    }

    #[test]
    fn vuln_class_keyword_overlap_ignores_punctuation() {
        assert!(VulnClass::UnderConstrained.mentioned_in("The circuit is underconstrained"));
        assert!(VulnClass::UnderConstrained.mentioned_in("signal is not constrained"));
        assert!(!VulnClass::TrustedSetup.mentioned_in("nothing to see here"));
    }

    #[test]
    fn verdict_counts_accumulate() {
        let mut counts = VerdictCounts::default();
        counts.bump(VerdictKind::TruePositive);
        counts.bump(VerdictKind::Timeout);
        counts.bump(VerdictKind::Timeout);
        assert_eq!(counts.true_positive, 1);
        assert_eq!(counts.timeout, 2);
        assert_eq!(counts.total(), 3);
    }
}
