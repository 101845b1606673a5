use std::path::PathBuf;

use thiserror::Error;

/// Failures reading the coverage report. All of these end the run.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// The report file does not exist.
    #[error("coverage report not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The report is not well-formed XML or a line entry is unreadable.
    #[error("malformed coverage report {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    /// The report or a source file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures asking the generation service for mutations. Non-fatal per file.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport-level failure talking to the service.
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("generation service returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The reply carried no message content.
    #[error("generation reply had no content")]
    EmptyReply,
    /// The reply content was not the expected mutation document.
    #[error("could not parse mutation reply: {0}")]
    Reply(#[from] serde_json::Error),
}

/// Failures applying one mutation or running the tests against it.
/// Non-fatal; the mutation is recorded as not survived.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// No type declaration line in the file.
    #[error("no class declaration found in {}", .0.display())]
    NoAnchor(PathBuf),
    /// The mutation points past the end of the file (or at line 0).
    #[error("line {line} is out of range ({len} lines)")]
    LineOutOfRange { line: usize, len: usize },
    /// The sibling backup could not be created, so nothing was written.
    #[error("could not back up {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading or writing the target file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The test command could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// The backup could not be written back over the source file. Fatal: the
/// original source may be lost and the run must stop.
#[derive(Debug, Error)]
#[error(
    "failed to restore {} from {}: {source}",
    .target.display(),
    .backup.display()
)]
pub struct RestoreFailure {
    pub target: PathBuf,
    pub backup: PathBuf,
    #[source]
    pub source: std::io::Error,
}
