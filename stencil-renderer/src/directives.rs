//! Side-effecting template directives.
//!
//! ```text
//! {% filter write(path="out/a.txt") %}...{% endfilter %}
//! {% filter append(path="log.txt", preserve=true) %}...{% endfilter %}
//! {% filter write(path="only.txt", write_source=false) %}...{% endfilter %}
//! {{ "check the inputs" | warning }}
//! {{ "unsupported mode" | error }}
//! ```
//!
//! Filter sections only run when the enclosing branch executes, so a
//! directive inside a false `{% if %}` records nothing.

use std::collections::HashMap;
use std::path::PathBuf;

use tera::{Filter, Value};

use crate::capture::{SharedCapture, WriteMode, WriteRequest};

fn bool_arg(args: &HashMap<String, Value>, name: &str, default: bool) -> tera::Result<bool> {
    match args.get(name) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(tera::Error::msg(format!(
            "argument `{name}` must be a boolean, got {other}"
        ))),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `write` / `append`: capture the block as a [`WriteRequest`].
pub struct OutputDirective {
    mode: WriteMode,
    capture: SharedCapture,
}

impl OutputDirective {
    pub fn new(mode: WriteMode, capture: SharedCapture) -> Self {
        Self { mode, capture }
    }
}

impl Filter for OutputDirective {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let target = args
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                tera::Error::msg(format!("`{}` requires a `path` argument", self.mode.as_str()))
            })?;
        let preserve = bool_arg(args, "preserve", false)?;
        let write_source = bool_arg(args, "write_source", true)?;
        let content = text_of(value);

        tracing::debug!("{} directive captured {} bytes for {target}", self.mode.as_str(), content.len());
        self.capture.lock()?.requests.push(WriteRequest {
            target: PathBuf::from(target),
            mode: self.mode,
            content: content.clone(),
            preserve_in_parent: preserve,
            suppress_parent_output: !write_source,
        });

        Ok(Value::String(if preserve { content } else { String::new() }))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// `warning`: record a diagnostic and render nothing.
pub struct WarningDirective {
    capture: SharedCapture,
}

impl WarningDirective {
    pub fn new(capture: SharedCapture) -> Self {
        Self { capture }
    }
}

impl Filter for WarningDirective {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.capture.lock()?.warnings.push(text_of(value));
        Ok(Value::String(String::new()))
    }
}

/// `error`: fail the job with the given message.
pub struct ErrorDirective {
    capture: SharedCapture,
}

impl ErrorDirective {
    pub fn new(capture: SharedCapture) -> Self {
        Self { capture }
    }
}

impl Filter for ErrorDirective {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let message = text_of(value);
        self.capture.lock()?.error = Some(message.clone());
        Err(tera::Error::msg(message))
    }
}

/// Register every directive on `tera`, sharing `capture`.
pub fn register(tera: &mut tera::Tera, capture: &SharedCapture) {
    tera.register_filter("write", OutputDirective::new(WriteMode::Write, capture.clone()));
    tera.register_filter("append", OutputDirective::new(WriteMode::Append, capture.clone()));
    tera.register_filter("warning", WarningDirective::new(capture.clone()));
    tera.register_filter("error", ErrorDirective::new(capture.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn write_captures_and_hides_block() {
        let capture = SharedCapture::new();
        let directive = OutputDirective::new(WriteMode::Write, capture.clone());
        let out = directive
            .filter(&Value::from("body"), &args(&[("path", Value::from("a.txt"))]))
            .unwrap();
        assert_eq!(out, Value::from(""));

        let captured = capture.take().unwrap();
        assert_eq!(captured.requests.len(), 1);
        assert_eq!(captured.requests[0].content, "body");
        assert_eq!(captured.requests[0].mode, WriteMode::Write);
        assert!(!captured.requests[0].suppress_parent_output);
    }

    #[test]
    fn preserve_keeps_block_in_parent() {
        let capture = SharedCapture::new();
        let directive = OutputDirective::new(WriteMode::Append, capture.clone());
        let out = directive
            .filter(
                &Value::from("body"),
                &args(&[
                    ("path", Value::from("a.txt")),
                    ("preserve", Value::Bool(true)),
                    ("write_source", Value::Bool(false)),
                ]),
            )
            .unwrap();
        assert_eq!(out, Value::from("body"));
        assert!(capture.take().unwrap().suppresses_parent());
    }

    #[test]
    fn missing_path_is_an_error() {
        let directive = OutputDirective::new(WriteMode::Write, SharedCapture::new());
        assert!(directive.filter(&Value::from("x"), &HashMap::new()).is_err());
    }

    #[test]
    fn non_boolean_flag_is_an_error() {
        let directive = OutputDirective::new(WriteMode::Write, SharedCapture::new());
        let result = directive.filter(
            &Value::from("x"),
            &args(&[("path", Value::from("a")), ("preserve", Value::from("yes"))]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn error_directive_records_message() {
        let capture = SharedCapture::new();
        let directive = ErrorDirective::new(capture.clone());
        assert!(directive.filter(&Value::from("boom"), &HashMap::new()).is_err());
        assert_eq!(capture.take().unwrap().error.as_deref(), Some("boom"));
    }
}
