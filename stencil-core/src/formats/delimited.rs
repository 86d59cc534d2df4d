//! CSV and TSV tables.
//!
//! The first row is the header and the first column names each row:
//!
//! ```text
//! name,cost,pop          →  {alice: {cost: 10, pop: 3}, bob: {cost: 20, pop: 4}}
//! alice,10,3
//! bob,20,4
//! ```

use serde::{Deserialize, Serialize};

use crate::coerce::coerce;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::FormatError;
use crate::value::{Mapping, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter. Defaults to `,` for CSV and tab for TSV.
    pub delimiter: Option<char>,
    /// Escape character inside quoted fields. Without one, quotes are doubled.
    pub escape_char: Option<char>,
    /// Strip whitespace around headers and values.
    pub strip: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: None, escape_char: None, strip: true }
    }
}

fn ascii_byte(what: &'static str, value: char) -> Result<u8, FormatError> {
    if value.is_ascii() {
        Ok(value as u8)
    } else {
        Err(FormatError::InvalidDelimiter { what, value })
    }
}

/// Parse a delimited table. `default_delimiter` applies when the options do
/// not override it.
pub fn parse(
    text: &str,
    default_delimiter: char,
    options: &CsvOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Mapping, FormatError> {
    let delimiter = ascii_byte("delimiter", options.delimiter.unwrap_or(default_delimiter))?;

    let mut builder = csv::ReaderBuilder::new();
    builder.delimiter(delimiter).has_headers(true).flexible(true);
    if let Some(escape) = options.escape_char {
        builder.escape(Some(ascii_byte("escape character", escape)?)).double_quote(false);
    }
    if options.strip {
        builder.trim(csv::Trim::All);
    }

    let mut reader = builder.from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let mut rows = Mapping::new();
    if headers.is_empty() {
        return Ok(rows);
    }

    for record in reader.records() {
        let record = record?;
        let key = record.get(0).unwrap_or_default().to_string();
        let row: Mapping = headers
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, header)| {
                let value = record.get(idx).map(coerce).unwrap_or(Value::Null);
                (header.to_string(), value)
            })
            .collect();
        if rows.insert(key.clone(), Value::Mapping(row)).is_some() {
            diagnostics.warn(
                DiagnosticKind::Redefinition,
                format!("row '{key}' redefined"),
            );
        }
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
