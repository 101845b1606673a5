use chrono::{DateTime, Local};
use tracing::{error, info};

use crate::coverage::CoverageMap;
use crate::error::RestoreFailure;
use crate::output;
use crate::proposer::{self, GenerationService};
use crate::report::{Report, RunLog};
use crate::runner::{self, TestCommand};

/// One mutation-testing run: files in path order, mutations one at a time.
pub struct Session<'a> {
    service: &'a dyn GenerationService,
    test_cmd: &'a TestCommand,
    progress: bool,
    report: Report,
    log: RunLog,
}

impl<'a> Session<'a> {
    pub fn new(service: &'a dyn GenerationService, test_cmd: &'a TestCommand) -> Self {
        Self {
            service,
            test_cmd,
            progress: false,
            report: Report::new(),
            log: RunLog::new(),
        }
    }

    /// Echo log entries to the terminal as they are produced.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Propose, apply and test mutations for every file in `coverage`.
    ///
    /// Stops at the first [`RestoreFailure`]; results gathered so far stay
    /// available through [`Session::report`] and [`Session::log`].
    pub fn run(&mut self, coverage: &CoverageMap) -> Result<(), RestoreFailure> {
        info!(files = coverage.len(), "starting mutation testing");

        for (path, info) in coverage {
            self.report.add_file(info);
            let header = self.log.file_header(path).to_string();
            if self.progress {
                output::print_file_header(&header);
            }

            let mutations = proposer::propose(self.service, info);
            for (idx, mutation) in mutations.iter().enumerate() {
                let entry = self.log.mutation(idx + 1, mutation).to_string();
                if self.progress {
                    output::print_entry(&entry);
                }

                let result = runner::test_mutation(info, mutation, self.test_cmd).inspect_err(|e| {
                    error!(
                        file = %path.display(),
                        mutation = idx + 1,
                        line = mutation.line_number,
                        error = %e,
                        "restore failed, stopping the run"
                    );
                })?;

                let outcome = self.log.outcome(&result).to_string();
                if self.progress {
                    output::print_outcome(&outcome, &result);
                }
                self.report.record(result);
            }
        }

        info!(
            total = self.report.total(),
            survived = self.report.survived(),
            killed = self.report.killed(),
            "mutation testing finished"
        );
        Ok(())
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Full log (with the summary appended) and the standalone summary.
    pub fn render(&self, now: DateTime<Local>) -> (String, String) {
        let summary = self.report.render_summary(now);
        let mut log = self.log.clone();
        log.push_str("\n");
        log.push_str(&summary);
        (log.as_str().to_string(), summary)
    }
}
