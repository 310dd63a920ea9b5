//! Verdict evaluation: scoring findings against ground truth.
//!
//! Location evidence dominates. A finding that names the right file,
//! function, and line is a confident true positive; class-keyword overlap
//! only ever adds a small bonus and is never sufficient on its own, because
//! every Circom analyzer says "constraint" somewhere in its output. Runs
//! with weak but non-zero evidence land in manual review rather than being
//! silently counted either way.

use tracing::debug;

use crate::adapters::ParseOutcome;
use crate::model::{
    ExecutionRecord, Finding, GroundTruth, GroundTruthLocation, SourceLocation, Verdict,
    VerdictKind,
};

/// Scoring knobs. The defaults keep the ordering invariant
/// exact > function > file, with the class bonus too small to lift a
/// file-only match over the acceptance threshold by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWeights {
    pub exact: u32,
    pub function: u32,
    pub file: u32,
    pub class_bonus: u32,
    /// Minimum score for a true positive.
    pub threshold: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self { exact: 100, function: 60, file: 25, class_bonus: 15, threshold: 50 }
    }
}

/// How specifically a finding's location pins down the ground-truth spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchLevel {
    None,
    File,
    Function,
    Exact,
}

#[derive(Debug, Clone, Copy)]
struct Scored {
    score: u32,
    level: MatchLevel,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    weights: MatchWeights,
}

impl Evaluator {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    /// Classify one run against the target's ground truth.
    ///
    /// Precedence: timeout, then tool failure, then finding evidence. The
    /// result is deterministic for a given record and parse outcome; ties
    /// between findings keep the earlier one in parse order.
    pub fn evaluate(
        &self,
        record: &ExecutionRecord,
        outcome: &ParseOutcome,
        truth: &GroundTruth,
    ) -> Verdict {
        if record.timed_out {
            return Verdict::new(
                VerdictKind::Timeout,
                None,
                format!("killed after {} ms", record.duration_ms),
            );
        }
        if outcome.tool_failed {
            let reason = outcome
                .warnings
                .first()
                .map(String::as_str)
                .unwrap_or("tool reported an internal failure");
            return Verdict::new(VerdictKind::Error, None, reason.to_string());
        }
        if outcome.findings.is_empty() {
            return Verdict::new(
                VerdictKind::FalseNegative,
                None,
                "tool completed without reporting any findings",
            );
        }

        let mut best: Option<(&Finding, Scored)> = None;
        for finding in &outcome.findings {
            let scored = self.score(finding, truth);
            debug!(
                tool = record.tool_id.as_str(),
                check = finding.check_id.as_str(),
                score = scored.score,
                "scored finding"
            );
            let better = match best {
                None => true,
                Some((_, prev)) => {
                    scored.score > prev.score
                        || (scored.score == prev.score && scored.level > prev.level)
                }
            };
            if better {
                best = Some((finding, scored));
            }
        }

        let Some((finding, scored)) = best else {
            return Verdict::new(
                VerdictKind::FalseNegative,
                None,
                "tool completed without reporting any findings",
            );
        };
        if scored.score >= self.weights.threshold && scored.level >= MatchLevel::Function {
            return Verdict::new(
                VerdictKind::TruePositive,
                Some(finding.clone()),
                format!("{} matched the expected location (score {})", finding.check_id, scored.score),
            );
        }
        if scored.score > 0 {
            return Verdict::new(
                VerdictKind::ManualReview,
                Some(finding.clone()),
                format!(
                    "{} partially matched (score {}, below confident acceptance)",
                    finding.check_id, scored.score
                ),
            );
        }
        Verdict::new(
            VerdictKind::FalseNegative,
            None,
            format!("{} findings, none matching the expected vulnerability", outcome.findings.len()),
        )
    }

    fn score(&self, finding: &Finding, truth: &GroundTruth) -> Scored {
        let level = location_match(finding.location.as_ref(), &truth.location);
        let mut score = match level {
            MatchLevel::Exact => self.weights.exact,
            MatchLevel::Function => self.weights.function,
            MatchLevel::File => self.weights.file,
            MatchLevel::None => 0,
        };
        if class_matches(finding, truth) {
            score += self.weights.class_bonus;
        }
        Scored { score, level }
    }
}

/// Compare a finding's claimed location with the expected one.
///
/// Granularity cascades: a function-level match requires the file to agree
/// (or be unspecified in the ground truth), and a line match requires the
/// function to agree. Files compare by basename since tools report paths
/// relative to whatever directory they were pointed at.
fn location_match(found: Option<&SourceLocation>, expected: &GroundTruthLocation) -> MatchLevel {
    let found = match found {
        Some(loc) => loc,
        None => return MatchLevel::None,
    };

    let file_ok = match expected.file.as_deref() {
        Some(expected_file) => same_basename(&found.file, expected_file),
        None => true,
    };
    if !file_ok {
        return MatchLevel::None;
    }

    let func_ok = match (found.function.as_deref(), expected.function.as_deref()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if func_ok {
        if let (Some(found_lines), Some(expected_lines)) = (found.lines, expected.lines) {
            if found_lines.overlaps(&expected_lines) {
                return MatchLevel::Exact;
            }
        }
        return MatchLevel::Function;
    }

    // File agreement alone only counts when the ground truth actually names
    // a file; otherwise there is no evidence at all.
    if expected.file.is_some() {
        MatchLevel::File
    } else {
        MatchLevel::None
    }
}

fn same_basename(a: &str, b: &str) -> bool {
    let base = |p: &str| {
        p.rsplit(['/', '\\']).next().map(str::to_ascii_lowercase).unwrap_or_default()
    };
    !a.is_empty() && base(a) == base(b)
}

/// The finding refers to the expected vulnerability class, either through
/// the adapter's explicit mapping or through keyword overlap in its message.
fn class_matches(finding: &Finding, truth: &GroundTruth) -> bool {
    if let Some(class) = &finding.class {
        if class == &truth.vulnerability {
            return true;
        }
    }
    truth.vulnerability.mentioned_in(&finding.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineSpan, Severity, VulnClass};
    use chrono::Utc;

    fn record() -> ExecutionRecord {
        ExecutionRecord {
            tool_id: "fake".into(),
            target_id: "target".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            duration_ms: 10,
        }
    }

    fn truth() -> GroundTruth {
        GroundTruth {
            vulnerability: VulnClass::UnderConstrained,
            location: GroundTruthLocation {
                file: Some("circuit.circom".into()),
                function: Some("Multiplier".into()),
                lines: Some(LineSpan { start: 10, end: 15 }),
            },
            description: None,
        }
    }

    fn finding(function: Option<&str>, line: Option<u32>) -> Finding {
        Finding {
            check_id: "CS0005".into(),
            message: "intermediate signal in one constraint".into(),
            severity: Severity::Warning,
            class: Some(VulnClass::UnderConstrained),
            location: Some(SourceLocation {
                file: "circuits/circuit.circom".into(),
                function: function.map(String::from),
                lines: line.map(LineSpan::single),
            }),
        }
    }

    fn outcome(findings: Vec<Finding>) -> ParseOutcome {
        ParseOutcome { findings, warnings: Vec::new(), tool_failed: false }
    }

    #[test]
    fn exact_location_match_is_true_positive() {
        let verdict = Evaluator::default().evaluate(
            &record(),
            &outcome(vec![finding(Some("Multiplier"), Some(12))]),
            &truth(),
        );
        assert_eq!(verdict.kind, VerdictKind::TruePositive);
        assert_eq!(verdict.matched.unwrap().check_id, "CS0005");
    }

    #[test]
    fn function_match_without_line_is_true_positive() {
        let verdict = Evaluator::default().evaluate(
            &record(),
            &outcome(vec![finding(Some("Multiplier"), None)]),
            &truth(),
        );
        assert_eq!(verdict.kind, VerdictKind::TruePositive);
    }

    #[test]
    fn file_only_match_goes_to_manual_review() {
        // 25 (file) + 15 (class bonus) stays below the acceptance threshold.
        let verdict =
            Evaluator::default().evaluate(&record(), &outcome(vec![finding(None, None)]), &truth());
        assert_eq!(verdict.kind, VerdictKind::ManualReview);
        assert!(verdict.matched.is_some());
    }

    #[test]
    fn class_overlap_alone_is_never_a_true_positive() {
        let mut f = finding(None, None);
        f.location = None;
        f.message = "the circuit is underconstrained".into();
        let verdict = Evaluator::default().evaluate(&record(), &outcome(vec![f]), &truth());
        assert_eq!(verdict.kind, VerdictKind::ManualReview);
    }

    #[test]
    fn unrelated_findings_are_a_false_negative() {
        let mut f = finding(None, None);
        f.location = Some(SourceLocation { file: "other.circom".into(), function: None, lines: None });
        f.class = None;
        f.message = "too many arguments".into();
        let verdict = Evaluator::default().evaluate(&record(), &outcome(vec![f]), &truth());
        assert_eq!(verdict.kind, VerdictKind::FalseNegative);
        assert!(verdict.matched.is_none());
    }

    #[test]
    fn timeout_takes_precedence_over_findings() {
        let mut rec = record();
        rec.timed_out = true;
        let verdict = Evaluator::default().evaluate(
            &rec,
            &outcome(vec![finding(Some("Multiplier"), Some(12))]),
            &truth(),
        );
        assert_eq!(verdict.kind, VerdictKind::Timeout);
    }

    #[test]
    fn tool_failure_becomes_error_verdict() {
        let verdict = Evaluator::default().evaluate(
            &record(),
            &ParseOutcome::failed("solver crashed"),
            &truth(),
        );
        assert_eq!(verdict.kind, VerdictKind::Error);
        assert_eq!(verdict.rationale, "solver crashed");
    }

    #[test]
    fn no_findings_is_a_false_negative() {
        let verdict = Evaluator::default().evaluate(&record(), &outcome(Vec::new()), &truth());
        assert_eq!(verdict.kind, VerdictKind::FalseNegative);
    }

    #[test]
    fn threshold_is_inclusive_and_configurable() {
        // A function-level match scores exactly 60 without a class bonus.
        let mut f = finding(Some("Multiplier"), None);
        f.class = None;
        f.message = "too many arguments".into();

        let at_threshold =
            Evaluator::new(MatchWeights { threshold: 60, ..MatchWeights::default() });
        let verdict = at_threshold.evaluate(&record(), &outcome(vec![f.clone()]), &truth());
        assert_eq!(verdict.kind, VerdictKind::TruePositive);

        let above_threshold =
            Evaluator::new(MatchWeights { threshold: 61, ..MatchWeights::default() });
        let verdict = above_threshold.evaluate(&record(), &outcome(vec![f]), &truth());
        assert_eq!(verdict.kind, VerdictKind::ManualReview);
    }

    #[test]
    fn ties_keep_the_earlier_finding() {
        let first = finding(Some("Multiplier"), Some(12));
        let mut second = finding(Some("Multiplier"), Some(14));
        second.check_id = "CS0014".into();
        let verdict = Evaluator::default().evaluate(
            &record(),
            &outcome(vec![first, second]),
            &truth(),
        );
        assert_eq!(verdict.matched.unwrap().check_id, "CS0005");
    }

    #[test]
    fn more_specific_finding_wins_over_weaker_one() {
        let weak = finding(None, None);
        let strong = finding(Some("Multiplier"), Some(11));
        let verdict =
            Evaluator::default().evaluate(&record(), &outcome(vec![weak, strong]), &truth());
        assert_eq!(verdict.kind, VerdictKind::TruePositive);
        assert_eq!(verdict.matched.unwrap().location.unwrap().lines, Some(LineSpan::single(11)));
    }
}
