//! Output writer: applies the overwrite policy and the ledger to every
//! primary output and secondary write of a job.
//!
//! ## Write protocol
//!
//! 1. Resolve the target (secondary targets are anchored at the job's base
//!    directory).
//! 2. `write` replaces the file, `append` extends it (creating it if
//!    needed).
//! 3. On a `write` of a file that existed before the run, apply the
//!    overwrite policy (`deny` skips and leaves the ledger untouched). Files
//!    this run already produced are replaced without a check.
//! 4. Trim trailing whitespace if configured.
//! 5. Truncating writes go to `<path>.stencil.tmp` then rename over the
//!    target; appends open the file in append mode.
//! 6. Record the touch in the ledger.

use std::io::Write;
use std::path::{Path, PathBuf};

use stencil_core::{Diagnostic, DiagnosticKind, Diagnostics, OverwritePolicy};
use stencil_renderer::{RenderOutput, WriteMode};

use crate::error::{io_err, OutputError};
use crate::ledger::{WriteLedger, WriteOp};
use crate::paths::resolve_target;

// ---------------------------------------------------------------------------
// Write outcome
// ---------------------------------------------------------------------------

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File was created or replaced.
    Written { path: PathBuf },
    /// Content was added to the end of the file.
    Appended { path: PathBuf },
    /// File exists and the overwrite policy is `deny`.
    Skipped { path: PathBuf },
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Written { path }
            | WriteOutcome::Appended { path }
            | WriteOutcome::Skipped { path } => path,
        }
    }
}

/// Everything one flush did.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub errors: Vec<OutputError>,
}

impl FlushReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn record(&mut self, result: Result<WriteOutcome, OutputError>) {
        match result {
            Ok(WriteOutcome::Skipped { path }) => self.skipped.push(path),
            Ok(WriteOutcome::Written { path } | WriteOutcome::Appended { path }) => {
                self.written.push(path)
            }
            Err(err) => self.errors.push(err),
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: FlushReport) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
    }
}

// ---------------------------------------------------------------------------
// Low-level writes
// ---------------------------------------------------------------------------

fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))
        }
        _ => Ok(()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.stencil.tmp", path.display()))
}

/// Replace `path` with `content` through a temp file and a rename.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<(), OutputError> {
    ensure_parent(path)?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn append_to(path: &Path, content: &[u8]) -> Result<(), OutputError> {
    ensure_parent(path)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(content).map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// OutputWriter
// ---------------------------------------------------------------------------

/// Writes job outputs for a whole run. Owns the run's [`WriteLedger`].
#[derive(Debug)]
pub struct OutputWriter {
    ledger: WriteLedger,
    overwrite: OverwritePolicy,
    trim_whitespace: bool,
}

impl OutputWriter {
    pub fn new(overwrite: OverwritePolicy, trim_whitespace: bool) -> Self {
        Self { ledger: WriteLedger::new(), overwrite, trim_whitespace }
    }

    pub fn ledger(&self) -> &WriteLedger {
        &self.ledger
    }

    /// `true` when the write may proceed. Only replacing a file that was on
    /// disk before this run is subject to the overwrite policy.
    fn check_overwrite(&self, path: &Path, op: WriteOp, diagnostics: &mut Diagnostics) -> bool {
        if op != WriteOp::Truncate || self.ledger.is_touched(path) || !path.exists() {
            return true;
        }
        match self.overwrite {
            OverwritePolicy::Default => true,
            OverwritePolicy::Warn => {
                diagnostics.push(
                    Diagnostic::warning(DiagnosticKind::Write, "output file already exists and will be overwritten")
                        .with_path(path),
                );
                true
            }
            OverwritePolicy::Deny => {
                diagnostics.push(
                    Diagnostic::warning(DiagnosticKind::Write, "output file already exists, skipped to avoid overwrite")
                        .with_path(path),
                );
                false
            }
        }
    }

    /// Write `content` to the already-resolved `path`.
    pub fn write(
        &mut self,
        path: &Path,
        mode: WriteMode,
        content: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<WriteOutcome, OutputError> {
        let op = WriteOp::from(mode);
        if !self.check_overwrite(path, op, diagnostics) {
            return Ok(WriteOutcome::Skipped { path: path.to_path_buf() });
        }

        let content = if self.trim_whitespace { content.trim_end() } else { content };
        let outcome = match op {
            WriteOp::Truncate => {
                atomic_write(path, content.as_bytes())?;
                WriteOutcome::Written { path: path.to_path_buf() }
            }
            WriteOp::Append => {
                append_to(path, content.as_bytes())?;
                WriteOutcome::Appended { path: path.to_path_buf() }
            }
        };
        let entry = self.ledger.record(path, mode);
        tracing::info!(
            "{} {} (touch {})",
            if op == WriteOp::Truncate { "wrote" } else { "appended" },
            path.display(),
            entry.touch_count
        );
        Ok(outcome)
    }

    /// Copy `source` byte for byte to `path`, as a `write`.
    pub fn copy(
        &mut self,
        source: &Path,
        path: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<WriteOutcome, OutputError> {
        if !self.check_overwrite(path, WriteOp::Truncate, diagnostics) {
            return Ok(WriteOutcome::Skipped { path: path.to_path_buf() });
        }
        let bytes = std::fs::read(source).map_err(|e| io_err(source, e))?;
        atomic_write(path, &bytes)?;
        self.ledger.record(path, WriteMode::Write);
        tracing::info!("copied {} -> {}", source.display(), path.display());
        Ok(WriteOutcome::Written { path: path.to_path_buf() })
    }

    /// Flush one rendered job: secondary writes in document order, then the
    /// primary output unless it was suppressed.
    ///
    /// Relative secondary targets resolve against `base`. Failures are
    /// reported as `Write` diagnostics and in the returned report; one failed
    /// write does not stop the others.
    pub fn flush(
        &mut self,
        output: &RenderOutput,
        primary_path: &Path,
        base: &Path,
        diagnostics: &mut Diagnostics,
    ) -> FlushReport {
        let mut report = FlushReport::default();

        for request in &output.requests {
            let target = resolve_target(&request.target, base);
            let result = self.write(&target, request.mode, &request.content, diagnostics);
            if let Err(err) = &result {
                diagnostics.push(Diagnostic::error(DiagnosticKind::Write, err.to_string()).with_path(&target));
            }
            report.record(result);
        }

        match &output.primary {
            Some(text) => {
                let result = self.write(primary_path, WriteMode::Write, text, diagnostics);
                if let Err(err) = &result {
                    diagnostics.push(
                        Diagnostic::error(DiagnosticKind::Write, err.to_string()).with_path(primary_path),
                    );
                }
                report.record(result);
            }
            None => tracing::debug!("primary output {} suppressed", primary_path.display()),
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stencil_renderer::WriteRequest;
    use tempfile::TempDir;

    fn request(target: &str, mode: WriteMode, content: &str) -> WriteRequest {
        WriteRequest {
            target: PathBuf::from(target),
            mode,
            content: content.to_string(),
            preserve_in_parent: false,
            suppress_parent_output: false,
        }
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn first_write_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/c.txt");
        let mut writer = OutputWriter::new(OverwritePolicy::Default, false);
        let outcome = writer.write(&path, WriteMode::Write, "x", &mut Diagnostics::new()).unwrap();
        assert!(matches!(outcome, WriteOutcome::Written { .. }));
        assert_eq!(read(&path), "x");
        assert!(!tmp_path(&path).exists(), ".stencil.tmp must be cleaned up");
    }

    #[test]
    fn write_truncates_across_writers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.txt");
        std::fs::write(&path, "previous run content").unwrap();
        let mut writer = OutputWriter::new(OverwritePolicy::Default, false);
        writer.write(&path, WriteMode::Write, "new", &mut Diagnostics::new()).unwrap();
        assert_eq!(read(&path), "new");
    }

    #[test]
    fn repeated_write_in_a_run_keeps_latest_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.txt");
        let mut writer = OutputWriter::new(OverwritePolicy::Default, false);
        let mut diags = Diagnostics::new();
        writer.write(&path, WriteMode::Write, "1", &mut diags).unwrap();
        writer.write(&path, WriteMode::Append, "2", &mut diags).unwrap();
        let third = writer.write(&path, WriteMode::Write, "3", &mut diags).unwrap();
        assert!(matches!(third, WriteOutcome::Written { .. }));
        assert_eq!(read(&path), "3");
        writer.write(&path, WriteMode::Append, "4", &mut diags).unwrap();
        assert_eq!(read(&path), "34");
        assert_eq!(writer.ledger().get(&path).unwrap().touch_count, 4);
    }

    #[test]
    fn append_keeps_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.txt");
        std::fs::write(&path, "old;").unwrap();
        let mut writer = OutputWriter::new(OverwritePolicy::Deny, false);
        let mut diags = Diagnostics::new();
        writer.write(&path, WriteMode::Append, "new;", &mut diags).unwrap();
        assert_eq!(read(&path), "old;new;");
        assert!(diags.is_empty(), "append is never an overwrite");
    }

    #[rstest]
    #[case(OverwritePolicy::Default, "new", 0)]
    #[case(OverwritePolicy::Warn, "new", 1)]
    #[case(OverwritePolicy::Deny, "old", 1)]
    fn overwrite_policy(#[case] policy: OverwritePolicy, #[case] expected: &str, #[case] warnings: usize) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        std::fs::write(&path, "old").unwrap();
        let mut writer = OutputWriter::new(policy, false);
        let mut diags = Diagnostics::new();
        let outcome = writer.write(&path, WriteMode::Write, "new", &mut diags).unwrap();
        assert_eq!(read(&path), expected);
        assert_eq!(diags.warnings().count(), warnings);
        assert_eq!(matches!(outcome, WriteOutcome::Skipped { .. }), policy == OverwritePolicy::Deny);
        assert_eq!(writer.ledger().is_touched(&path), policy != OverwritePolicy::Deny);
    }

    #[test]
    fn deny_does_not_apply_to_files_created_in_this_run() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        let mut writer = OutputWriter::new(OverwritePolicy::Deny, false);
        let mut diags = Diagnostics::new();
        writer.write(&path, WriteMode::Write, "a", &mut diags).unwrap();
        let second = writer.write(&path, WriteMode::Write, "b", &mut diags).unwrap();
        assert!(matches!(second, WriteOutcome::Written { .. }));
        assert_eq!(read(&path), "b");
        assert!(diags.is_empty());
    }

    #[test]
    fn deny_keeps_skipping_a_preexisting_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        std::fs::write(&path, "old").unwrap();
        let mut writer = OutputWriter::new(OverwritePolicy::Deny, false);
        let mut diags = Diagnostics::new();
        writer.write(&path, WriteMode::Write, "a", &mut diags).unwrap();
        let second = writer.write(&path, WriteMode::Write, "b", &mut diags).unwrap();
        assert!(matches!(second, WriteOutcome::Skipped { .. }));
        assert_eq!(read(&path), "old");
        assert_eq!(diags.warnings().count(), 2);
    }

    #[test]
    fn trimming_applies_to_each_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        let mut writer = OutputWriter::new(OverwritePolicy::Default, true);
        let mut diags = Diagnostics::new();
        writer.write(&path, WriteMode::Write, "a  \n\n", &mut diags).unwrap();
        writer.write(&path, WriteMode::Append, "b \n", &mut diags).unwrap();
        assert_eq!(read(&path), "ab");
    }

    #[test]
    fn flush_writes_secondaries_then_primary() {
        let tmp = TempDir::new().unwrap();
        let out_dir = tmp.path().join("out");
        let primary = out_dir.join("foo.c");
        let output = RenderOutput {
            primary: Some("parent".into()),
            requests: vec![
                request("child.txt", WriteMode::Write, "one"),
                request("nested/child.txt", WriteMode::Append, "two"),
                request("foo.c", WriteMode::Write, "from-directive;"),
            ],
        };

        let mut writer = OutputWriter::new(OverwritePolicy::Default, false);
        let mut diags = Diagnostics::new();
        let report = writer.flush(&output, &primary, &out_dir, &mut diags);

        assert!(report.is_ok());
        assert_eq!(report.written.len(), 4);
        assert_eq!(read(&out_dir.join("child.txt")), "one");
        assert_eq!(read(&out_dir.join("nested/child.txt")), "two");
        // The primary is flushed last and replaces what the directive wrote.
        assert_eq!(read(&primary), "parent");
    }

    #[test]
    fn flush_skips_suppressed_primary() {
        let tmp = TempDir::new().unwrap();
        let primary = tmp.path().join("foo.c");
        let output = RenderOutput {
            primary: None,
            requests: vec![request("only.txt", WriteMode::Write, "x")],
        };
        let mut writer = OutputWriter::new(OverwritePolicy::Default, false);
        let report = writer.flush(&output, &primary, tmp.path(), &mut Diagnostics::new());
        assert_eq!(report.written, vec![tmp.path().join("only.txt")]);
        assert!(!primary.exists());
    }

    #[test]
    fn flush_reports_errors_and_continues() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("taken")).unwrap();
        let output = RenderOutput {
            primary: Some("p".into()),
            requests: vec![request("taken", WriteMode::Append, "x")],
        };
        let mut writer = OutputWriter::new(OverwritePolicy::Default, false);
        let mut diags = Diagnostics::new();
        let report = writer.flush(&output, &tmp.path().join("p.txt"), tmp.path(), &mut diags);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.written, vec![tmp.path().join("p.txt")]);
        assert!(diags.has_errors());
    }

    #[test]
    fn copy_is_verbatim() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("logo.bin");
        std::fs::write(&src, [0u8, 159, 146, 150]).unwrap();
        let dst = tmp.path().join("out/logo.bin");
        let mut writer = OutputWriter::new(OverwritePolicy::Default, true);
        writer.copy(&src, &dst, &mut Diagnostics::new()).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), vec![0u8, 159, 146, 150]);
    }
}
