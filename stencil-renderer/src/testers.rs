//! Built-in tests: `{% if name is identifier %}`.
//!
//! Every test looks at the value's string form and is false for an empty
//! string.

use tera::{Tera, Value};

use stencil_core::identifier::is_identifier;

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn all_chars(value: Option<&Value>, pred: fn(char) -> bool) -> bool {
    let s = text_of(value);
    !s.is_empty() && s.chars().all(pred)
}

/// At least one cased character, and every cased character passes `pred`.
fn cased(value: Option<&Value>, pred: fn(char) -> bool) -> bool {
    let s = text_of(value);
    let mut any = false;
    for c in s.chars().filter(|c| c.is_lowercase() || c.is_uppercase()) {
        if !pred(c) {
            return false;
        }
        any = true;
    }
    any
}

pub fn decimal(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(all_chars(value, |c| c.is_ascii_digit()))
}

pub fn digit(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(all_chars(value, |c| c.is_numeric()))
}

pub fn alpha(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(all_chars(value, char::is_alphabetic))
}

pub fn alnum(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(all_chars(value, char::is_alphanumeric))
}

pub fn identifier(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(is_identifier(&text_of(value)))
}

pub fn space(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(all_chars(value, char::is_whitespace))
}

pub fn lower(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(cased(value, char::is_lowercase))
}

pub fn upper(value: Option<&Value>, _args: &[Value]) -> tera::Result<bool> {
    Ok(cased(value, char::is_uppercase))
}

/// Register every built-in test on `tera`.
pub fn register(tera: &mut Tera) {
    tera.register_tester("decimal", decimal);
    tera.register_tester("digit", digit);
    tera.register_tester("alpha", alpha);
    tera.register_tester("alnum", alnum);
    tera.register_tester("identifier", identifier);
    tera.register_tester("space", space);
    tera.register_tester("lower", lower);
    tera.register_tester("upper", upper);
}
