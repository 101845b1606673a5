use chrono::{Local, TimeZone};
use covmut::coverage::CoverageInfo;
use covmut::mutants::{Impact, MutantStatus, Mutation, MutationResult};
use covmut::report::{self, Report, RunLog};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn result(line: usize, mutation_type: &str, status: MutantStatus) -> MutationResult {
    MutationResult {
        mutation: Mutation {
            line_number: line,
            original_line: "    if (a > b) {".to_string(),
            mutated_line: "    if (a >= b) {".to_string(),
            mutation_type: mutation_type.to_string(),
        },
        file_name: "Foo.java".to_string(),
        status,
        impact: Impact::classify(mutation_type),
        duration_ms: 10,
        diff: String::new(),
        error: None,
    }
}

#[test]
fn empty_report_has_zero_coverage() {
    let report = Report::new();
    assert_eq!(report.total(), 0);
    assert_eq!(report.survived(), 0);
    assert_eq!(report.killed(), 0);
    assert_eq!(report.mutation_coverage(), 0.0);
    assert_eq!(report.line_coverage(), 0.0);
}

#[test]
fn half_killed_is_fifty_percent() {
    let mut report = Report::new();
    report.record(result(10, "Changed operator", MutantStatus::Survived));
    report.record(result(12, "Changed operator", MutantStatus::Killed));

    assert_eq!(report.total(), 2);
    assert_eq!(report.survived(), 1);
    assert_eq!(report.killed(), 1);
    assert_eq!(report.mutation_coverage(), 50.0);
}

#[test]
fn timeouts_and_errors_count_as_killed() {
    let mut report = Report::new();
    report.record(result(1, "x", MutantStatus::Timeout));
    report.record(result(2, "x", MutantStatus::Error));
    report.record(result(3, "x", MutantStatus::Killed));
    report.record(result(4, "x", MutantStatus::Survived));

    assert_eq!(report.killed(), 3);
    assert_eq!(report.timed_out(), 1);
    assert_eq!(report.errored(), 1);
    assert_eq!(report.mutation_coverage(), 75.0);
}

#[test]
fn line_coverage_uses_reported_lines() {
    let mut report = Report::new();
    report.add_file(&CoverageInfo {
        file_path: PathBuf::from("/p/A.java"),
        covered_lines: BTreeSet::from([1, 2, 3]),
        reported_lines: 4,
        source_code: String::new(),
    });
    assert_eq!(report.line_coverage(), 75.0);
}

#[test]
fn impact_classification() {
    assert_eq!(Impact::classify("Comparison operator flip"), Impact::ControlFlow);
    assert_eq!(Impact::classify("CHANGED constant"), Impact::ChangedBehavior);
    assert_eq!(Impact::classify("Removed method call"), Impact::RemovedFunctionality);
    assert_eq!(Impact::classify("Added negation"), Impact::AddedBehavior);
    assert_eq!(Impact::classify("Boundary shift"), Impact::Modified);
    assert_eq!(Impact::Modified.describe(), "Modified program behavior");
    assert_eq!(
        Impact::ControlFlow.describe(),
        "Modified condition affecting control flow"
    );
}

#[test]
fn render_summary_contains_totals_and_details() {
    let mut report = Report::new();
    report.record(result(10, "Comparison boundary", MutantStatus::Survived));
    report.record(result(12, "Removed return", MutantStatus::Killed));

    let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
    let summary = report.render_summary(now);

    assert!(summary.starts_with("2024-03-05 14:07:09 INFO:"));
    assert!(summary.contains("Mutation Coverage: 50.00%"));
    assert!(summary.contains("Total Mutants: 2"));
    assert!(summary.contains("Survived Mutants: 1"));
    assert!(summary.contains("Killed Mutants: 1"));
    assert!(summary.contains("[SURVIVED] M1:"));
    assert!(summary.contains("[KILLED] M2:"));
    assert!(summary.contains("├─ Line 10:"));
    assert!(summary.contains("│  ├─ Original: if (a > b) {"));
    assert!(summary.contains("│  └─ Mutated:  if (a >= b) {"));
    assert!(summary.contains("└─ Impact: Modified condition affecting control flow"));
    assert!(summary.contains("└─ Impact: Removed functionality"));
}

#[test]
fn summary_serializes_to_json() {
    let mut report = Report::new();
    report.record(result(10, "Changed operator", MutantStatus::Survived));

    let json = serde_json::to_value(report.summary()).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["survived"], 1);
    assert_eq!(json["killed"], 0);
    assert_eq!(json["mutation_coverage"], 0.0);
    assert_eq!(json["mutations"][0]["line_number"], 10);
    assert_eq!(json["mutations"][0]["status"], "survived");
    assert_eq!(json["mutations"][0]["impact"], "changed_behavior");
}

#[test]
fn run_log_records_attempts_in_order() {
    let mut log = RunLog::new();
    log.file_header(Path::new("/p/Foo.java"));
    let r = result(10, "Changed operator", MutantStatus::Killed);
    let entry = log.mutation(1, &r.mutation).to_string();
    log.outcome(&r);

    assert!(entry.contains("Mutation 1:"));
    assert!(entry.contains("Line 10:"));
    let text = log.as_str();
    let header = text.find("=== Analyzing /p/Foo.java ===").unwrap();
    let mutation = text.find("Mutation 1:").unwrap();
    let status = text.find("Status: KILLED").unwrap();
    assert!(header < mutation && mutation < status);
}

#[test]
fn run_log_notes_errors() {
    let mut log = RunLog::new();
    let mut r = result(99, "Changed operator", MutantStatus::Error);
    r.error = Some("line 99 is out of range (5 lines)".to_string());
    let outcome = log.outcome(&r).to_string();
    assert!(outcome.contains("KILLED (error: line 99 is out of range"));
}

#[test]
fn write_outputs_creates_both_files() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("reports");
    let (log_path, summary_path) = report::write_outputs(&out, "full log", "summary").unwrap();

    assert_eq!(log_path, out.join(report::LOG_FILE));
    assert_eq!(summary_path, out.join(report::SUMMARY_FILE));
    assert_eq!(std::fs::read_to_string(log_path).unwrap(), "full log");
    assert_eq!(std::fs::read_to_string(summary_path).unwrap(), "summary");
}
