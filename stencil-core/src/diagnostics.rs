//! Run-wide diagnostic list.
//!
//! Every recoverable problem (bad variable file, dropped key, failed render,
//! refused write) is pushed here and reported once at the end of a run.
//! Pushing also mirrors the entry to `tracing`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// How bad a diagnostic is. Any [`Severity::Error`] makes the run fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Which stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// A variable file could not be decoded.
    Parse,
    /// A key is not a valid identifier.
    Identifier,
    /// A variable was defined twice inside one source.
    Redefinition,
    /// A user hook failed.
    Hook,
    /// A template failed to render, or emitted a warning.
    Render,
    /// An output could not be written, or overwrote an existing file.
    Write,
    /// Invalid invocation detail that does not abort the run.
    Usage,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::Identifier => "identifier",
            DiagnosticKind::Redefinition => "redefinition",
            DiagnosticKind::Hook => "hook",
            DiagnosticKind::Render => "render",
            DiagnosticKind::Write => "write",
            DiagnosticKind::Usage => "usage",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, kind, message: message.into(), path: None }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, kind, message: message.into(), path: None }
    }

    /// Attach the file the diagnostic is about, unless one is already set.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.as_ref().to_path_buf());
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(kind = %diagnostic.kind, "{diagnostic}"),
            Severity::Error => tracing::error!(kind = %diagnostic.kind, "{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::warning(kind, message));
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::error(kind, message));
    }

    /// Move every entry of `other` into `self`, tagging untagged ones with `path`.
    pub fn absorb(&mut self, other: Diagnostics, path: &Path) {
        self.entries
            .extend(other.entries.into_iter().map(|d| d.with_path(path)));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
