//! JaCoCo XML coverage report reader.
//!
//! Walks `package` / `sourcefile` / `line` elements, maps every source file
//! onto the Maven layout (`<project>/src/main/java/<package path>/<file>`)
//! and keeps the line numbers whose covered-instruction count (`ci`) is
//! greater than zero. Files that do not exist on disk are skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info, warn};

use crate::error::CoverageError;
use crate::safety;

const SOURCE_ROOT: &[&str] = &["src", "main", "java"];

/// Coverage of one source file, keyed by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageInfo {
    pub file_path: PathBuf,
    /// 1-based line numbers with at least one covered instruction.
    pub covered_lines: BTreeSet<usize>,
    /// Number of line entries the report lists for this file, covered or not.
    pub reported_lines: usize,
    pub source_code: String,
}

impl CoverageInfo {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }
}

pub type CoverageMap = BTreeMap<PathBuf, CoverageInfo>;

/// A `sourcefile` entry as it appears in the report, before path resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceEntry {
    pub package: String,
    pub name: String,
    pub covered_lines: BTreeSet<usize>,
    pub reported_lines: usize,
}

/// Read the report at `report_path` and resolve its entries under `project_dir`.
pub fn read_report(report_path: &Path, project_dir: &Path) -> Result<CoverageMap, CoverageError> {
    info!(report = %report_path.display(), "parsing coverage report");
    if !report_path.exists() {
        return Err(CoverageError::NotFound(report_path.to_path_buf()));
    }
    let xml = std::fs::read_to_string(report_path).map_err(|source| CoverageError::Io {
        path: report_path.to_path_buf(),
        source,
    })?;
    let entries = parse_report(&xml).map_err(|message| CoverageError::Parse {
        path: report_path.to_path_buf(),
        message,
    })?;
    load_sources(entries, project_dir)
}

/// Conventional on-disk location of a report entry.
pub fn resolve_source_path(project_dir: &Path, package: &str, file_name: &str) -> PathBuf {
    let mut path = project_dir.to_path_buf();
    for segment in SOURCE_ROOT {
        path.push(segment);
    }
    for segment in package.split(['.', '/']).filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path.push(file_name);
    path
}

/// Parse report XML into per-file entries. Errors carry a human-readable
/// message; the caller attaches the report path.
pub fn parse_report(xml: &str) -> Result<Vec<SourceEntry>, String> {
    let mut reader = Reader::from_str(xml);
    let mut saw_report = false;
    let mut package: Option<String> = None;
    let mut current: Option<SourceEntry> = None;
    let mut entries = Vec::new();
    let mut open: Vec<String> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                open.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                match e.name().as_ref() {
                    b"report" => saw_report = true,
                    b"package" => package = Some(attribute(&e, b"name")?.unwrap_or_default()),
                    b"sourcefile" => current = Some(open_source(&e, package.as_deref())?),
                    b"line" => record_line(&e, current.as_mut())?,
                    _ => {}
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"report" => saw_report = true,
                b"sourcefile" => entries.push(open_source(&e, package.as_deref())?),
                b"line" => record_line(&e, current.as_mut())?,
                _ => {}
            },
            Event::End(e) => {
                open.pop();
                match e.name().as_ref() {
                    b"package" => package = None,
                    b"sourcefile" => entries.extend(current.take()),
                    _ => {}
                }
            }
            // A report cut off mid-write still reaches Eof.
            Event::Eof => match open.last() {
                Some(name) => return Err(format!("unexpected end of report inside <{name}>")),
                None => break,
            },
            _ => {}
        }
    }

    if !saw_report {
        return Err("no <report> element".to_string());
    }
    Ok(entries)
}

fn open_source(e: &BytesStart<'_>, package: Option<&str>) -> Result<SourceEntry, String> {
    let name = attribute(e, b"name")?.ok_or("sourcefile without a name attribute")?;
    Ok(SourceEntry {
        package: package.unwrap_or_default().to_string(),
        name,
        ..SourceEntry::default()
    })
}

fn record_line(e: &BytesStart<'_>, entry: Option<&mut SourceEntry>) -> Result<(), String> {
    // Class-level line elements outside a sourcefile are not part of the format.
    let Some(entry) = entry else {
        return Ok(());
    };
    let nr = attribute(e, b"nr")?.ok_or("line without an nr attribute")?;
    let nr: usize = nr
        .trim()
        .parse()
        .map_err(|_| format!("line number {nr:?} in {} is not a number", entry.name))?;
    let ci: u64 = match attribute(e, b"ci")? {
        Some(ci) => ci
            .trim()
            .parse()
            .map_err(|_| format!("ci count {ci:?} on line {nr} of {} is not a number", entry.name))?,
        None => 0,
    };
    entry.reported_lines += 1;
    if ci > 0 {
        entry.covered_lines.insert(nr);
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Resolve each entry to a file, recover any interrupted mutation, and read
/// the source text. Entries naming the same file are merged.
pub fn load_sources(entries: Vec<SourceEntry>, project_dir: &Path) -> Result<CoverageMap, CoverageError> {
    let mut coverage = CoverageMap::new();

    for entry in entries {
        let listed = resolve_source_path(project_dir, &entry.package, &entry.name);
        debug!(file = %listed.display(), "looking for source file");

        if !listed.is_file() {
            warn!(file = %listed.display(), "source file listed in report not found, skipping");
            continue;
        }
        let file_path = real_source_path(listed)?;

        if let Some(info) = coverage.get_mut(&file_path) {
            info.covered_lines.extend(entry.covered_lines);
            info.reported_lines += entry.reported_lines;
            continue;
        }

        if let Some(backup) = safety::check_interrupted_run(&file_path) {
            warn!(
                file = %file_path.display(),
                backup = %backup.display(),
                "found backup from an interrupted run, restoring original source"
            );
            safety::restore_from_backup(&file_path, &backup).map_err(|source| CoverageError::Io {
                path: backup.clone(),
                source,
            })?;
        }

        let source_code = std::fs::read_to_string(&file_path).map_err(|source| CoverageError::Io {
            path: file_path.clone(),
            source,
        })?;

        info!(
            file = %file_path.display(),
            covered = entry.covered_lines.len(),
            "parsed coverage"
        );
        coverage.insert(
            file_path.clone(),
            CoverageInfo {
                file_path,
                covered_lines: entry.covered_lines,
                reported_lines: entry.reported_lines,
                source_code,
            },
        );
    }

    Ok(coverage)
}

/// Mutations are written by renaming over the path, which would replace a
/// symlink with a plain file. Work on the link target instead.
fn real_source_path(listed: PathBuf) -> Result<PathBuf, CoverageError> {
    let is_link = std::fs::symlink_metadata(&listed)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if !is_link {
        return Ok(listed);
    }
    let target = std::fs::canonicalize(&listed).map_err(|source| CoverageError::Io {
        path: listed.clone(),
        source,
    })?;
    debug!(link = %listed.display(), target = %target.display(), "source file is a symlink");
    Ok(target)
}
