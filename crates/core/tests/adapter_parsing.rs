use std::path::Path;

use chrono::Utc;
use triage_core::adapters::{
    CircomspectAdapter, InvocationOptions, PicusAdapter, ToolAdapter, ZkfuzzAdapter,
};
use triage_core::model::{ExecutionRecord, LineSpan, Severity, VulnClass};

fn record(stdout: &str, stderr: &str, exit_code: Option<i32>) -> ExecutionRecord {
    ExecutionRecord {
        tool_id: "test".into(),
        target_id: "target".into(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        exit_code,
        stdout: stdout.into(),
        stderr: stderr.into(),
        timed_out: false,
        duration_ms: 5,
    }
}

const CIRCOMSPECT_OUTPUT: &str = "\
circomspect: analyzing template 'Multiplier'
warning[CS0005]: Intermediate signals should typically occur in at least two separate constraints.
   \u{250c}\u{2500} circuits/circuit.circom:7:5
   \u{2502}
 7 \u{2502}     out <-- a * b;
   \u{2502}     ^^^^^^^^^^^^^^ The intermediate signal `out` is declared here.

warning[CS0015]: Divisors should be constrained to be non-zero.
   \u{250c}\u{2500} circuits/circuit.circom:12:9
   \u{2502}
12 \u{2502}     q <-- a / b;

circomspect: 2 issues found.
";

#[test]
fn circomspect_parses_located_findings() {
    let adapter = CircomspectAdapter::new();
    let outcome = adapter.parse(&record(CIRCOMSPECT_OUTPUT, "", Some(1)));
    assert!(!outcome.tool_failed);
    assert_eq!(outcome.findings.len(), 2);

    let first = &outcome.findings[0];
    assert_eq!(first.check_id, "CS0005");
    assert_eq!(first.severity, Severity::Warning);
    assert_eq!(first.class, Some(VulnClass::Other("signal-assignment-statement".into())));
    let loc = first.location.as_ref().unwrap();
    assert_eq!(loc.file, "circuits/circuit.circom");
    assert_eq!(loc.function.as_deref(), Some("Multiplier"));
    assert_eq!(loc.lines, Some(LineSpan::single(7)));

    // The under-constraint checks share one class, so their reports earn the
    // class bonus against under-constrained ground truths.
    let second = &outcome.findings[1];
    assert_eq!(second.check_id, "CS0015");
    assert_eq!(second.class, Some(VulnClass::UnderConstrained));
    assert_eq!(second.location.as_ref().unwrap().lines, Some(LineSpan::single(12)));
}

#[test]
fn circomspect_reads_diagnostics_from_stderr_too() {
    let adapter = CircomspectAdapter::new();
    let outcome = adapter.parse(&record("", CIRCOMSPECT_OUTPUT, Some(1)));
    assert_eq!(outcome.findings.len(), 2);
}

#[test]
fn circomspect_abnormal_exit_is_a_tool_failure() {
    let adapter = CircomspectAdapter::new();
    let outcome = adapter.parse(&record("", "panicked at src/lib.rs", Some(101)));
    assert!(outcome.tool_failed);
    assert!(outcome.findings.is_empty());
}

#[test]
fn circomspect_tolerates_garbage_input() {
    let adapter = CircomspectAdapter::new();
    for garbage in ["", "\u{0}\u{1}\u{2}binary noise", "warning[", "\u{250c}\u{2500} :::"] {
        let outcome = adapter.parse(&record(garbage, "", Some(0)));
        assert!(!outcome.tool_failed, "input {garbage:?} should not fail");
        assert!(outcome.findings.is_empty());
    }
}

#[test]
fn circomspect_truncated_output_keeps_the_partial_finding() {
    // Output cut off mid-diagnostic after a timeout kill.
    let truncated = "\
circomspect: analyzing template 'Multiplier'
warning[CS0005]: Intermediate signals should typically occur in at least two
";
    let adapter = CircomspectAdapter::new();
    let mut rec = record(truncated, "", None);
    rec.timed_out = true;
    let outcome = adapter.parse(&rec);
    assert_eq!(outcome.findings.len(), 1);
    // No anchor line was seen, so there is no location to claim.
    assert!(outcome.findings[0].location.is_none());
}

#[test]
fn circomspect_invocation_is_deterministic() {
    let adapter = CircomspectAdapter::new();
    let circuit = Path::new("/tmp/c.circom");
    let a = adapter.build_invocation(circuit, &InvocationOptions::default());
    let b = adapter.build_invocation(circuit, &InvocationOptions::default());
    assert_eq!(a, b);
    // -v turns on the verbose section markers; without them no finding
    // carries a function and location matching tops out at file level.
    assert_eq!(a.args, vec!["/tmp/c.circom", "-l", "INFO", "-v"]);
}

#[test]
fn circomspect_under_constraint_codes_map_to_one_class() {
    let adapter = CircomspectAdapter::new();
    for code in ["CS0014", "CS0015", "CS0017"] {
        let output = format!("warning[{code}]: some constraint is missing\n");
        let outcome = adapter.parse(&record(&output, "", Some(1)));
        assert_eq!(outcome.findings[0].class, Some(VulnClass::UnderConstrained), "{code}");
    }
    // Non-constraint checks keep their own names instead of being promoted.
    let outcome = adapter.parse(&record("warning[CS0013]: unnecessary assignment\n", "", Some(1)));
    assert_eq!(
        outcome.findings[0].class,
        Some(VulnClass::Other("unnecessary-signal-assignment".into()))
    );
}

#[test]
fn picus_underconstrained_verdict_becomes_one_finding() {
    let adapter = PicusAdapter::new();
    let outcome = adapter.parse(&record(
        "solving constraints...\nThe circuit is underconstrained\nCounterexample:\n  in: 1\n",
        "",
        Some(0),
    ));
    assert!(!outcome.tool_failed);
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].class, Some(VulnClass::UnderConstrained));
    assert!(outcome.findings[0].location.is_none());
}

#[test]
fn picus_properly_constrained_yields_no_findings() {
    let adapter = PicusAdapter::new();
    let outcome =
        adapter.parse(&record("The circuit is properly constrained\n", "", Some(0)));
    assert!(!outcome.tool_failed);
    assert!(outcome.findings.is_empty());
    assert!(outcome.warnings.is_empty());
}

#[test]
fn picus_undetermined_yields_a_warning() {
    let adapter = PicusAdapter::new();
    let outcome = adapter.parse(&record(
        "Cannot determine whether the circuit is properly constrained\n",
        "",
        Some(0),
    ));
    assert!(!outcome.tool_failed);
    assert!(outcome.findings.is_empty());
    assert_eq!(outcome.warnings.len(), 1);
}

#[test]
fn picus_empty_output_is_a_miss_not_a_failure() {
    // A clean exit with nothing on either stream is "no result", which the
    // evaluator should score as a false negative, not a tool error.
    let adapter = PicusAdapter::new();
    let outcome = adapter.parse(&record("", "", Some(0)));
    assert!(!outcome.tool_failed);
    assert!(outcome.findings.is_empty());
    assert_eq!(outcome.warnings.len(), 1);
}

#[test]
fn picus_stack_trace_is_a_tool_failure() {
    let adapter = PicusAdapter::new();
    let outcome = adapter.parse(&record("", "contract violation\n  context...", Some(1)));
    assert!(outcome.tool_failed);
}

#[test]
fn picus_timeout_without_verdict_is_not_a_failure() {
    let adapter = PicusAdapter::new();
    let mut rec = record("solving constraints...\n", "", None);
    rec.timed_out = true;
    let outcome = adapter.parse(&rec);
    assert!(!outcome.tool_failed);
    assert!(outcome.findings.is_empty());
}

#[test]
fn zkfuzz_counter_example_is_extracted_and_cleaned() {
    let adapter = ZkfuzzAdapter::new();
    let outcome = adapter.parse(&record(
        "fuzzing...\nCounter Example:\n    \u{2551} assert(out == (a * b)) \u{2551}\nEverything went okay\n",
        "",
        Some(0),
    ));
    assert!(!outcome.tool_failed);
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].message, "assert(out == (a * b))");
}

#[test]
fn zkfuzz_no_counter_example_yields_no_findings() {
    let adapter = ZkfuzzAdapter::new();
    let outcome = adapter
        .parse(&record("fuzzing...\nNo Counter Example Found\nEverything went okay\n", "", Some(0)));
    assert!(!outcome.tool_failed);
    assert!(outcome.findings.is_empty());
}

#[test]
fn zkfuzz_missing_trailer_is_a_tool_failure() {
    let adapter = ZkfuzzAdapter::new();
    let outcome = adapter.parse(&record("thread 'main' panicked at ...\n", "", Some(101)));
    assert!(outcome.tool_failed);
}

#[test]
fn zkfuzz_timeout_without_trailer_is_not_a_failure() {
    let adapter = ZkfuzzAdapter::new();
    let mut rec = record("fuzzing...\n", "", None);
    rec.timed_out = true;
    let outcome = adapter.parse(&rec);
    assert!(!outcome.tool_failed);
}
