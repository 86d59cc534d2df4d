//! Error types for stencil-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// Why a render job failed, or why the engine could not be built.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template does not parse.
    #[error("syntax error: {message}")]
    Syntax { message: String },

    /// A variable is undefined and undefined variables are strict.
    #[error("undefined variable '{name}'")]
    Undefined { name: String },

    /// An `include`, `import` or `extends` target is not registered.
    #[error("template '{name}' not found")]
    MissingTemplate { name: String },

    /// The template raised an error through the `error` filter.
    #[error("{message}")]
    Directive { message: String },

    /// Any other failure reported by the template engine.
    #[error("template engine error: {message}")]
    Engine { message: String },

    /// JSON serialization error (building the tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while loading include directories.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

impl From<tera::Error> for RenderError {
    fn from(err: tera::Error) -> Self {
        RenderError::Engine { message: error_chain(&err) }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

/// Every message in `err`'s source chain, outermost first, joined by `: `.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(source) = current {
        messages.push(source.to_string());
        current = source.source();
    }
    messages.join(": ")
}
