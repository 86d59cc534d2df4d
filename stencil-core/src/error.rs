//! Error types for stencil-core.

use std::path::PathBuf;

use thiserror::Error;

/// A variable file that could not be decoded.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HJSON parse error: {0}")]
    Hjson(#[from] deser_hjson::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("INI parse error: {0}")]
    Ini(#[from] ini::ParseError),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// A line of an ENV file without `=`.
    #[error("line {line}: expected `key = value`, got '{content}'")]
    EnvLine { line: usize, content: String },

    /// The document root decoded to something other than a mapping.
    #[error("root of the document is a {found}, expected a mapping")]
    NotAMapping { found: &'static str },

    /// CSV/TSV delimiters and escape characters must be single ASCII bytes.
    #[error("CSV {what} '{value}' must be a single ASCII character")]
    InvalidDelimiter { what: &'static str, value: char },

    /// Extension (or `:format` suffix) is not a supported format.
    #[error("unsupported variable format '{0}'")]
    UnknownFormat(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<quick_xml::Error> for FormatError {
    fn from(e: quick_xml::Error) -> Self {
        FormatError::Xml(e.to_string())
    }
}

/// A user hook (adapter, filter or test) that failed.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to run hook command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("hook command '{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("hook command '{program}' returned invalid JSON: {source}")]
    Output {
        program: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("hook returned a {found}, expected a mapping")]
    NotAMapping { found: &'static str },

    #[error("{0}")]
    Message(String),
}

/// A `-D key=value` define that cannot be turned into a mapping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefineError {
    #[error("define '{0}' has no '=': expected KEY=VALUE")]
    MissingEquals(String),

    #[error("define '{0}' has an empty key segment")]
    EmptyKey(String),
}

/// Fatal configuration problems: they abort before anything is rendered.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid hook specification '{0}': expected NAME=COMMAND")]
    HookSpec(String),
}

/// Convenience constructor for [`FormatError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FormatError {
    FormatError::Io { path: path.into(), source }
}
