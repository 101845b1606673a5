//! Backup files for sources under mutation.
//!
//! While a mutation is tested, the pristine source sits next to it as
//! `.<name>.covmut.bak`. A backup found when the report is loaded means a
//! previous run died mid-mutation, and it is moved back before anything else
//! touches the file.

use std::path::{Path, PathBuf};

use tracing::warn;

pub fn backup_path(source_file: &Path) -> PathBuf {
    let mut backup = source_file.to_path_buf();
    let name = format!(
        ".{}.covmut.bak",
        source_file.file_name().unwrap_or_default().to_string_lossy()
    );
    backup.set_file_name(name);
    backup
}

/// The backup left by a run that never restored `source_file`, if any.
pub fn check_interrupted_run(source_file: &Path) -> Option<PathBuf> {
    let backup = backup_path(source_file);
    backup.is_file().then_some(backup)
}

/// Put the pristine content from `backup_file` back at `source_file`.
///
/// Errors only when the source still holds mutated content. A leftover
/// backup after a successful copy is logged; the next run recovers it.
pub fn restore_from_backup(source_file: &Path, backup_file: &Path) -> std::io::Result<()> {
    if std::fs::rename(backup_file, source_file).is_ok() {
        return Ok(());
    }
    std::fs::copy(backup_file, source_file)?;
    if let Err(e) = std::fs::remove_file(backup_file) {
        warn!(
            file = %source_file.display(),
            backup = %backup_file.display(),
            error = %e,
            "source restored but backup could not be removed"
        );
    }
    Ok(())
}
