//! The mutate → test → restore cycle.
//!
//! Every cycle runs under a [`MutationLease`]: the target file is copied to
//! a sibling backup before anything is written, and the backup is moved
//! back over the target on every exit path. A failed restore is the one
//! error that escapes this module.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::coverage::CoverageInfo;
use crate::error::{ApplyError, RestoreFailure};
use crate::mutants::{Impact, MutantStatus, Mutation, MutationResult};
use crate::proposer::find_anchor;
use crate::safety;

/// Executable plus arguments used to run the project's tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
    /// `None` waits for the test run however long it takes.
    pub timeout: Option<Duration>,
}

impl TestCommand {
    /// `sub_command` is split on whitespace, so `"clean test -q"` works.
    pub fn new(program: &str, sub_command: &str) -> Self {
        Self {
            program: program.to_string(),
            args: sub_command.split_whitespace().map(str::to_string).collect(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tests run from the mutated file's directory, so a relative program
    /// path such as `./mvnw` has to be pinned down first.
    pub fn resolve(mut self, project_dir: &Path, cwd: &Path) -> Self {
        self.program = resolve_program(&self.program, project_dir, cwd);
        self
    }
}

fn resolve_program(program: &str, project_dir: &Path, cwd: &Path) -> String {
    let p = Path::new(program);
    if p.is_absolute() || !program.contains(['/', '\\']) {
        // Bare names are left to PATH.
        return program.to_string();
    }
    for base in [cwd, project_dir] {
        let candidate = base.join(p);
        if candidate.exists() {
            return candidate.to_string_lossy().into_owned();
        }
    }
    program.to_string()
}

/// Captured result of one test command invocation.
#[derive(Debug, Clone, Default)]
pub struct TestRun {
    /// `None` when the process was killed or ended by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl TestRun {
    pub fn passed(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn status(&self) -> MutantStatus {
        if self.timed_out {
            MutantStatus::Timeout
        } else if self.passed() {
            MutantStatus::Survived
        } else {
            MutantStatus::Killed
        }
    }
}

/// Exclusive hold on a source file for one mutation cycle. The pristine
/// content lives in a sibling backup until [`MutationLease::restore`] (or
/// drop) moves it back.
#[derive(Debug)]
pub struct MutationLease {
    target: PathBuf,
    backup: PathBuf,
    restored: bool,
}

impl MutationLease {
    /// Copy `target` to its backup path. Refuses to overwrite an existing
    /// backup, which may be the only intact copy of the source.
    pub fn acquire(target: &Path) -> Result<Self, ApplyError> {
        let backup = safety::backup_path(target);
        copy_exclusive(target, &backup).map_err(|source| ApplyError::Backup {
            path: target.to_path_buf(),
            source,
        })?;
        debug!(file = %target.display(), backup = %backup.display(), "backup created");
        Ok(Self {
            target: target.to_path_buf(),
            backup,
            restored: false,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Put the original content back and remove the backup.
    pub fn restore(mut self) -> Result<(), RestoreFailure> {
        self.restored = true;
        self.restore_inner()
    }

    fn restore_inner(&self) -> Result<(), RestoreFailure> {
        safety::restore_from_backup(&self.target, &self.backup).map_err(|source| RestoreFailure {
            target: self.target.clone(),
            backup: self.backup.clone(),
            source,
        })?;
        debug!(file = %self.target.display(), "restored original file");
        Ok(())
    }
}

impl Drop for MutationLease {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.restore_inner() {
            error!(error = %e, "original source could not be restored; recover it from the backup by hand");
        }
    }
}

fn copy_exclusive(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut src = File::open(from)?;
    let permissions = src.metadata()?.permissions();
    let mut dst = OpenOptions::new().write(true).create_new(true).open(to)?;
    let copied = std::io::copy(&mut src, &mut dst).and_then(|_| dst.sync_all());
    if let Err(e) = copied {
        drop(dst);
        let _ = fs::remove_file(to);
        return Err(e);
    }
    dst.set_permissions(permissions)
}

/// Replace the 1-based `line_number` of `source` with `mutated_line`,
/// keeping that line's terminator and every other byte.
pub fn apply_line_mutation(
    source: &str,
    line_number: usize,
    mutated_line: &str,
) -> Result<String, ApplyError> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    if line_number == 0 || line_number > lines.len() {
        return Err(ApplyError::LineOutOfRange {
            line: line_number,
            len: lines.len(),
        });
    }

    let index = line_number - 1;
    let terminator = if lines[index].ends_with("\r\n") { "\r\n" } else { "\n" };
    let mut result = String::with_capacity(source.len() + mutated_line.len());
    for (i, line) in lines.iter().enumerate() {
        if i == index {
            result.push_str(mutated_line.trim_end_matches(['\r', '\n']));
            result.push_str(terminator);
        } else {
            result.push_str(line);
        }
    }
    Ok(result)
}

pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}

/// Write `content` to a sibling temp file and rename it over `target`.
fn write_replacing(target: &Path, content: &str) -> std::io::Result<()> {
    let dir = target.parent().unwrap_or(Path::new("."));
    let permissions = fs::metadata(target)?.permissions();
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Run the test command in `working_dir` and wait for it (or its timeout).
pub fn run_tests(cmd: &TestCommand, working_dir: &Path) -> Result<TestRun, ApplyError> {
    let start = Instant::now();
    let mut child = Command::new(&cmd.program)
        .args(&cmd.args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ApplyError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

    // Build tools are chatty; drain both pipes so the child never blocks on
    // a full buffer while we wait.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let (status, timed_out): (Option<ExitStatus>, bool) = match cmd.timeout {
        None => (Some(child.wait()?), false),
        Some(limit) => loop {
            let polled = match child.try_wait() {
                Ok(polled) => polled,
                Err(e) => {
                    stop(&mut child);
                    return Err(e.into());
                }
            };
            match polled {
                Some(status) => break (Some(status), false),
                None if start.elapsed() > limit => {
                    stop(&mut child);
                    break (None, true);
                }
                None => thread::sleep(Duration::from_millis(10)),
            }
        },
    };

    let mut run = TestRun {
        exit_code: status.and_then(|s| s.code()),
        timed_out,
        duration_ms: start.elapsed().as_millis() as u64,
        ..TestRun::default()
    };
    // After a kill, grandchildren may still hold the pipes open; don't wait
    // on them.
    if !timed_out {
        run.stdout = collect(stdout);
        run.stderr = collect(stderr);
    }
    Ok(run)
}

/// Kill and reap, so the build never outlives the mutation it was testing.
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Apply `mutation` to the file behind `lease`, then run the tests.
fn apply_and_test(
    lease: &MutationLease,
    mutation: &Mutation,
    cmd: &TestCommand,
) -> Result<(MutantStatus, String), ApplyError> {
    let target = lease.target();
    let current = fs::read_to_string(target)?;

    // The anchor only gates the cycle; line numbers are absolute.
    if find_anchor(&current).is_none() {
        return Err(ApplyError::NoAnchor(target.to_path_buf()));
    }

    let mutated = apply_line_mutation(&current, mutation.line_number, &mutation.mutated_line)?;
    let diff = generate_diff(&current, &mutated);
    write_replacing(target, &mutated)?;

    let working_dir = target.parent().unwrap_or(Path::new("."));
    info!(file = %target.display(), line = mutation.line_number, "running tests");
    let run = run_tests(cmd, working_dir)?;
    debug!(
        exit_code = ?run.exit_code,
        timed_out = run.timed_out,
        duration_ms = run.duration_ms,
        stdout = %run.stdout,
        stderr = %run.stderr,
        "test run finished"
    );
    Ok((run.status(), diff))
}

/// One full cycle for `mutation` against `info.file_path`.
///
/// Apply and test failures are folded into a [`MutantStatus::Error`] result
/// (counted as killed). Only a failed restore is returned as an error, and
/// the caller must stop mutating.
pub fn test_mutation(
    info: &CoverageInfo,
    mutation: &Mutation,
    cmd: &TestCommand,
) -> Result<MutationResult, RestoreFailure> {
    let start = Instant::now();
    let attempt = match MutationLease::acquire(&info.file_path) {
        Ok(lease) => {
            let attempt = apply_and_test(&lease, mutation, cmd);
            lease.restore()?;
            attempt
        }
        Err(e) => Err(e),
    };

    let (status, diff, error) = match attempt {
        Ok((status, diff)) => (status, diff, None),
        Err(e) => {
            warn!(
                file = %info.file_path.display(),
                line = mutation.line_number,
                error = %e,
                "mutation could not be tested, counting it as killed"
            );
            (MutantStatus::Error, String::new(), Some(e.to_string()))
        }
    };

    Ok(MutationResult {
        mutation: mutation.clone(),
        file_name: info.file_name(),
        status,
        impact: Impact::classify(&mutation.mutation_type),
        duration_ms: start.elapsed().as_millis() as u64,
        diff,
        error,
    })
}
