//! Format adapters: decode variable files into a sanitised [`Mapping`].
//!
//! | Extension        | Decoder                         |
//! |------------------|---------------------------------|
//! | `yaml`, `yml`    | serde_yaml                      |
//! | `json`           | serde_json                      |
//! | `hjson`          | deser-hjson                     |
//! | `toml`           | toml                            |
//! | `xml`            | quick-xml (see [`xml`])         |
//! | `ini`, `cfg`     | rust-ini (see [`ini_file`])     |
//! | `env`            | line based (see [`dotenv`])     |
//! | `csv`, `tsv`     | csv (see [`delimited`])         |
//!
//! A file may declare its format explicitly with a `path:format` suffix, which
//! wins over the extension.

pub mod delimited;
pub mod dotenv;
pub mod ini_file;
pub mod xml;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{io_err, FormatError};
use crate::identifier::{sanitize_mapping, IdentifierPolicy};
use crate::value::{Mapping, Value};

pub use delimited::CsvOptions;
pub use xml::XmlOptions;

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Yaml,
    Json,
    Hjson,
    Xml,
    Toml,
    Ini,
    Env,
    Csv,
    Tsv,
}

impl Format {
    /// Map a file extension (case-insensitive) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            "hjson" => Some(Format::Hjson),
            "xml" => Some(Format::Xml),
            "toml" => Some(Format::Toml),
            "ini" | "cfg" => Some(Format::Ini),
            "env" => Some(Format::Env),
            "csv" => Some(Format::Csv),
            "tsv" => Some(Format::Tsv),
            _ => None,
        }
    }

    /// Detect the format of `path` from its extension.
    pub fn detect(path: &Path) -> Result<Self, FormatError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Format::from_extension(ext).ok_or_else(|| FormatError::UnknownFormat(ext.to_string()))
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_extension(s).ok_or_else(|| FormatError::UnknownFormat(s.to_string()))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Hjson => "hjson",
            Format::Xml => "xml",
            Format::Toml => "toml",
            Format::Ini => "ini",
            Format::Env => "env",
            Format::Csv => "csv",
            Format::Tsv => "tsv",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// VarFile
// ---------------------------------------------------------------------------

/// A variable file named on the command line, with its resolved format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarFile {
    pub path: PathBuf,
    pub format: Format,
}

impl VarFile {
    pub fn new(path: impl Into<PathBuf>, format: Format) -> Self {
        Self { path: path.into(), format }
    }
}

impl FromStr for VarFile {
    type Err = FormatError;

    /// `vars.txt:yaml` declares the format; otherwise it comes from the
    /// extension. A suffix that is not a known format is part of the path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((path, suffix)) = s.rsplit_once(':') {
            if let Some(format) = Format::from_extension(suffix) {
                return Ok(VarFile::new(path, format));
            }
        }
        let path = PathBuf::from(s);
        let format = Format::detect(&path)?;
        Ok(VarFile { path, format })
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Everything the adapters need besides the text itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub identifiers: IdentifierPolicy,
    pub csv: CsvOptions,
    pub xml: XmlOptions,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode `text` as `format`, then sanitise every key.
///
/// Recoverable issues (dropped keys, redefinitions, malformed ENV lines) are
/// pushed onto `diagnostics`; an undecodable document is an `Err`.
pub fn parse(
    text: &str,
    format: Format,
    options: &FormatOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Mapping, FormatError> {
    let raw = if text.trim().is_empty() {
        Mapping::new()
    } else {
        decode(text, format, options, diagnostics)?
    };
    Ok(sanitize_mapping(raw, options.identifiers, diagnostics))
}

fn decode(
    text: &str,
    format: Format,
    options: &FormatOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Mapping, FormatError> {
    match format {
        Format::Yaml => {
            let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
            root_mapping(Value::from(doc))
        }
        Format::Json => {
            let doc: serde_json::Value = serde_json::from_str(text)?;
            root_mapping(Value::from(doc))
        }
        Format::Hjson => {
            let doc: serde_json::Value = deser_hjson::from_str(text)?;
            root_mapping(Value::from(doc))
        }
        Format::Toml => {
            let table = text.parse::<toml::Table>()?;
            root_mapping(Value::from(toml::Value::Table(table)))
        }
        Format::Xml => xml::parse(text, &options.xml),
        Format::Ini => ini_file::parse(text),
        Format::Env => Ok(dotenv::parse(text, diagnostics)),
        Format::Csv => delimited::parse(text, ',', &options.csv, diagnostics),
        Format::Tsv => delimited::parse(text, '\t', &options.csv, diagnostics),
    }
}

/// Read and decode a variable file. Diagnostics raised while decoding are
/// tagged with the file path.
pub fn load_file(
    file: &VarFile,
    options: &FormatOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Mapping, FormatError> {
    let text = std::fs::read_to_string(&file.path).map_err(|e| io_err(&file.path, e))?;
    let mut local = Diagnostics::new();
    let result = parse(&text, file.format, options, &mut local);
    diagnostics.absorb(local, &file.path);
    tracing::debug!("loaded {} variables from {}", file.format, file.path.display());
    result
}

/// Documents must decode to a mapping; an explicit null counts as empty.
pub(crate) fn root_mapping(value: Value) -> Result<Mapping, FormatError> {
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(FormatError::NotAMapping { found: other.type_name() }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
