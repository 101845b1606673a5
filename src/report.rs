//! Aggregation of mutation results and the two text artifacts of a run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::coverage::CoverageInfo;
use crate::mutants::{MutantStatus, Mutation, MutationResult};

pub const LOG_FILE: &str = "mutation_testing_log.txt";
pub const SUMMARY_FILE: &str = "mutation_testing_summary.txt";

const RULE: &str = "=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=";

#[derive(Debug, Default, Clone)]
pub struct Report {
    results: Vec<MutationResult>,
    covered_lines: usize,
    reported_lines: usize,
}

/// Machine-readable view of a [`Report`].
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub mutation_coverage: f64,
    pub line_coverage: f64,
    pub total: usize,
    pub survived: usize,
    pub killed: usize,
    pub timeout: usize,
    pub error: usize,
    pub mutations: &'a [MutationResult],
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: MutationResult) {
        self.results.push(result);
    }

    /// Count an analysed file towards line coverage.
    pub fn add_file(&mut self, info: &CoverageInfo) {
        self.covered_lines += info.covered_lines.len();
        self.reported_lines += info.reported_lines.max(info.covered_lines.len());
    }

    pub fn results(&self) -> &[MutationResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn survived(&self) -> usize {
        self.results.iter().filter(|r| r.survived()).count()
    }

    /// Everything that did not survive, including timeouts and errors.
    pub fn killed(&self) -> usize {
        self.total() - self.survived()
    }

    pub fn timed_out(&self) -> usize {
        self.count(MutantStatus::Timeout)
    }

    pub fn errored(&self) -> usize {
        self.count(MutantStatus::Error)
    }

    fn count(&self, status: MutantStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// killed / total × 100, or 0 with no mutations.
    pub fn mutation_coverage(&self) -> f64 {
        percent(self.killed(), self.total())
    }

    pub fn line_coverage(&self) -> f64 {
        percent(self.covered_lines, self.reported_lines)
    }

    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            mutation_coverage: self.mutation_coverage(),
            line_coverage: self.line_coverage(),
            total: self.total(),
            survived: self.survived(),
            killed: self.killed(),
            timeout: self.timed_out(),
            error: self.errored(),
            mutations: &self.results,
        }
    }

    pub fn render_summary(&self, now: DateTime<Local>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} INFO:", now.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Overall Mutation Coverage");
        let _ = writeln!(out, "Line Coverage: {:.2}%", self.line_coverage());
        let _ = writeln!(out, "Mutation Coverage: {:.2}%", self.mutation_coverage());
        let _ = writeln!(out, "Total Mutants: {}", self.total());
        let _ = writeln!(out, "Survived Mutants: {}", self.survived());
        let _ = writeln!(out, "Killed Mutants: {}", self.killed());
        let _ = writeln!(out, "Timeout Mutants: {}", self.timed_out());
        let _ = writeln!(out, "Error Mutants: {}", self.errored());
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out);
        let _ = writeln!(out, "Mutation Details:");

        for (idx, r) in self.results.iter().enumerate() {
            let marker = if r.survived() { "[SURVIVED]" } else { "[KILLED]" };
            let m = &r.mutation;
            let _ = writeln!(out);
            let _ = writeln!(out, "{marker} M{}:", idx + 1);
            let _ = writeln!(out, "├─ Type: {}", m.mutation_type);
            let _ = writeln!(out, "├─ File: {}", r.file_name);
            let _ = writeln!(out, "├─ Line {}:", m.line_number);
            let _ = writeln!(out, "│  ├─ Original: {}", m.original_line.trim());
            let _ = writeln!(out, "│  └─ Mutated:  {}", m.mutated_line.trim());
            let _ = writeln!(out, "├─ Status: {}", r.status.label());
            let _ = writeln!(out, "└─ Impact: {}", r.impact.describe());
        }
        out
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Chronological record of every mutation attempt in a run.
#[derive(Debug, Default, Clone)]
pub struct RunLog {
    text: String,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_header(&mut self, path: &Path) -> &str {
        self.append(format!("\n=== Analyzing {} ===\n", path.display()))
    }

    pub fn mutation(&mut self, index: usize, mutation: &Mutation) -> &str {
        self.append(format!(
            "\nMutation {index}:\nType: {}\nLine {}:\nOriginal: {}\nMutated:  {}\n",
            mutation.mutation_type,
            mutation.line_number,
            mutation.original_line.trim(),
            mutation.mutated_line.trim(),
        ))
    }

    pub fn outcome(&mut self, result: &MutationResult) -> &str {
        let mut entry = String::new();
        if !result.diff.is_empty() {
            entry.push_str(&result.diff);
            if !result.diff.ends_with('\n') {
                entry.push('\n');
            }
        }
        let status = if result.survived() { "SURVIVED" } else { "KILLED" };
        match (&result.error, result.status) {
            (Some(e), _) => {
                let _ = writeln!(entry, "Status: {status} (error: {e})");
            }
            (None, MutantStatus::Timeout) => {
                let _ = writeln!(entry, "Status: {status} (timeout)");
            }
            (None, _) => {
                let _ = writeln!(entry, "Status: {status}");
            }
        }
        self.append(entry)
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn append(&mut self, entry: String) -> &str {
        let start = self.text.len();
        self.text.push_str(&entry);
        &self.text[start..]
    }
}

/// Write the run log and the summary into `dir`. Returns both paths.
pub fn write_outputs(dir: &Path, log: &str, summary: &str) -> std::io::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let log_path = dir.join(LOG_FILE);
    let summary_path = dir.join(SUMMARY_FILE);
    std::fs::write(&log_path, log)?;
    std::fs::write(&summary_path, summary)?;
    Ok((log_path, summary_path))
}
