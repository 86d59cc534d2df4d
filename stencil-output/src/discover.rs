//! Source discovery inside directories.

use std::path::{Path, PathBuf};

use crate::error::{io_err, OutputError};

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), OutputError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Every file below `dir`, recursively, in sorted path order.
///
/// The order is the processing order of the run, so it must not depend on
/// the filesystem's directory listing order.
pub fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    tracing::debug!("discovered {} file(s) under {}", files.len(), dir.display());
    Ok(files)
}
