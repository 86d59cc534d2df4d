//! Side effects recorded while a template renders.
//!
//! Directive filters never touch the filesystem: they push [`WriteRequest`]s
//! into the job's [`Capture`], which the output writer flushes once the render
//! has succeeded.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// How a secondary target is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file's content.
    Write,
    /// Add to the end of the file.
    Append,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Write => "write",
            WriteMode::Append => "append",
        }
    }
}

/// A block of rendered text bound for a secondary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Target as written in the template; resolved by the output writer.
    pub target: PathBuf,
    pub mode: WriteMode,
    pub content: String,
    /// The block also stays in the parent output.
    pub preserve_in_parent: bool,
    /// The directive asked for the parent output to be dropped.
    pub suppress_parent_output: bool,
}

/// Everything captured during one render pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Capture {
    pub requests: Vec<WriteRequest>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl Capture {
    /// Only the first directive of a job decides whether the parent output is
    /// written.
    pub fn suppresses_parent(&self) -> bool {
        self.requests.first().is_some_and(|r| r.suppress_parent_output)
    }
}

/// Handle shared between the engine and its directive filters.
#[derive(Debug, Clone, Default)]
pub struct SharedCapture(Arc<Mutex<Capture>>);

impl SharedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> tera::Result<MutexGuard<'_, Capture>> {
        self.0
            .lock()
            .map_err(|_| tera::Error::msg("directive capture lock poisoned"))
    }

    /// Drop everything recorded so far.
    pub fn reset(&self) -> tera::Result<()> {
        *self.lock()? = Capture::default();
        Ok(())
    }

    /// Take the recorded capture, leaving an empty one behind.
    pub fn take(&self) -> tera::Result<Capture> {
        Ok(std::mem::take(&mut *self.lock()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(suppress: bool) -> WriteRequest {
        WriteRequest {
            target: PathBuf::from("x.txt"),
            mode: WriteMode::Write,
            content: String::new(),
            preserve_in_parent: false,
            suppress_parent_output: suppress,
        }
    }

    #[test]
    fn only_first_request_controls_parent_output() {
        let mut capture = Capture::default();
        assert!(!capture.suppresses_parent());

        capture.requests.push(request(false));
        capture.requests.push(request(true));
        assert!(!capture.suppresses_parent());

        capture.requests.remove(0);
        assert!(capture.suppresses_parent());
    }

    #[test]
    fn take_leaves_empty_capture() {
        let shared = SharedCapture::new();
        shared.lock().unwrap().warnings.push("w".into());
        let taken = shared.take().unwrap();
        assert_eq!(taken.warnings, vec!["w".to_string()]);
        assert_eq!(shared.take().unwrap(), Capture::default());
    }
}
