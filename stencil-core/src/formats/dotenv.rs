//! `KEY = value` files.

use crate::coerce::coerce;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::FormatError;
use crate::value::Mapping;

/// Parse an ENV file. Malformed lines are reported and skipped.
pub fn parse(text: &str, diagnostics: &mut Diagnostics) -> Mapping {
    let mut vars = Mapping::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            let err = FormatError::EnvLine { line: idx + 1, content: line.to_string() };
            diagnostics.error(DiagnosticKind::Parse, err.to_string());
            continue;
        };
        let key = key.trim().to_string();
        let value = coerce(value.trim());
        if let Some(previous) = vars.get(&key) {
            diagnostics.warn(
                DiagnosticKind::Redefinition,
                format!("variable '{key}' redefined from '{previous}' to '{value}'"),
            );
        }
        vars.insert(key, value);
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn comments_blank_lines_and_coercion() {
        let mut diags = Diagnostics::new();
        let vars = parse("# header\n\nPORT = 8080\nNAME=api\nFLAGS=[1, 2]\n", &mut diags);
        assert_eq!(vars["PORT"], Value::Int(8080));
        assert_eq!(vars["NAME"], Value::from("api"));
        assert_eq!(vars["FLAGS"], Value::Sequence(vec![Value::Int(1), Value::Int(2)]));
        assert!(diags.is_empty());
    }

    #[test]
    fn value_may_contain_equals() {
        let mut diags = Diagnostics::new();
        let vars = parse("URL=a=b\n", &mut diags);
        assert_eq!(vars["URL"], Value::from("a=b"));
    }

    #[test]
    fn malformed_line_is_an_error_but_parsing_continues() {
        let mut diags = Diagnostics::new();
        let vars = parse("GOOD=1\nnot a pair\nALSO=2\n", &mut diags);
        assert_eq!(vars.len(), 2);
        assert_eq!(diags.errors().count(), 1);
        assert!(diags.iter().next().unwrap().message.starts_with("line 2"));
    }

    #[test]
    fn redefinition_warns() {
        let mut diags = Diagnostics::new();
        let vars = parse("A=1\nA=2\n", &mut diags);
        assert_eq!(vars["A"], Value::Int(2));
        assert_eq!(diags.warnings().count(), 1);
    }
}
