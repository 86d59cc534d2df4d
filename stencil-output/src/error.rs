//! Error types for stencil-output.

use std::path::PathBuf;

use thiserror::Error;

use stencil_renderer::RenderError;

/// All errors that can arise while planning jobs or writing their outputs.
#[derive(Debug, Error)]
pub enum OutputError {
    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source path that is neither a file nor a directory.
    #[error("unresolved source '{path}'")]
    UnresolvedSource { path: PathBuf },

    /// A directory source given without an output directory.
    #[error("source directory '{path}' requires an output directory")]
    OutdirRequired { path: PathBuf },
}

/// Convenience constructor for [`OutputError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.into(),
        source,
    }
}
