//! Identifier checks for variable keys.
//!
//! Templates reach variables by name, so every key of every loaded mapping is
//! validated (or repaired) before it is merged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::value::{Mapping, Value};

/// What to do with keys that are not valid identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierPolicy {
    /// Drop invalid keys with a warning.
    #[default]
    Strict,
    /// Keep every key as is.
    Permissive,
    /// Replace invalid characters with `_`.
    Fix,
}

impl FromStr for IdentifierPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            "fix" => Ok(Self::Fix),
            other => Err(format!(
                "unknown identifier policy '{other}'; expected: strict, permissive, fix"
            )),
        }
    }
}

impl fmt::Display for IdentifierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierPolicy::Strict => write!(f, "strict"),
            IdentifierPolicy::Permissive => write!(f, "permissive"),
            IdentifierPolicy::Fix => write!(f, "fix"),
        }
    }
}

/// `true` if `key` starts with a letter or `_` and continues with letters,
/// digits or `_`.
pub fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Replace every character outside `[A-Za-z0-9_]` with `_` and prefix a
/// leading digit with `_`.
pub fn fix_identifier(key: &str) -> String {
    let mut fixed: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if fixed.is_empty() || fixed.starts_with(|c: char| c.is_ascii_digit()) {
        fixed.insert(0, '_');
    }
    fixed
}

/// Validate or repair a single key according to `policy`.
pub fn check_or_fix(key: &str, policy: IdentifierPolicy) -> Result<String, Diagnostic> {
    match policy {
        IdentifierPolicy::Permissive => Ok(key.to_string()),
        IdentifierPolicy::Fix => Ok(fix_identifier(key)),
        IdentifierPolicy::Strict if is_identifier(key) => Ok(key.to_string()),
        IdentifierPolicy::Strict => Err(Diagnostic::warning(
            DiagnosticKind::Identifier,
            format!("variable '{key}' is not a valid identifier and was dropped"),
        )),
    }
}

/// Apply [`check_or_fix`] to every key at every depth of `mapping`, including
/// mappings nested in sequences.
pub fn sanitize_mapping(
    mapping: Mapping,
    policy: IdentifierPolicy,
    diagnostics: &mut Diagnostics,
) -> Mapping {
    if policy == IdentifierPolicy::Permissive {
        return mapping;
    }
    sanitize_level(mapping, policy, "", diagnostics)
}

fn sanitize_level(
    mapping: Mapping,
    policy: IdentifierPolicy,
    prefix: &str,
    diagnostics: &mut Diagnostics,
) -> Mapping {
    let mut out = Mapping::new();
    for (key, value) in mapping {
        let dotted = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        let clean = match check_or_fix(&key, policy) {
            Ok(clean) => clean,
            Err(mut diagnostic) => {
                diagnostic.message = format!(
                    "variable '{dotted}' is not a valid identifier and was dropped"
                );
                diagnostics.push(diagnostic);
                continue;
            }
        };
        if clean != key {
            tracing::debug!("renamed variable '{dotted}' to '{clean}'");
        }
        let value = sanitize_value(value, policy, &dotted, diagnostics);
        if out.insert(clean.clone(), value).is_some() {
            diagnostics.warn(
                DiagnosticKind::Identifier,
                format!("variable '{dotted}' collides with another key once fixed as '{clean}'"),
            );
        }
    }
    out
}

fn sanitize_value(
    value: Value,
    policy: IdentifierPolicy,
    prefix: &str,
    diagnostics: &mut Diagnostics,
) -> Value {
    match value {
        Value::Mapping(inner) => Value::Mapping(sanitize_level(inner, policy, prefix, diagnostics)),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| sanitize_value(item, policy, prefix, diagnostics))
                .collect(),
        ),
        scalar => scalar,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
