//! Built-in filters registered on every engine, on top of Tera's own.
//!
//! | Group      | Filters                                                       |
//! |------------|---------------------------------------------------------------|
//! | case       | `camel`, `pascal`, `snake`, `kebab`                           |
//! | padding    | `ljust`, `rjust`, `center`                                    |
//! | paragraph  | `strip_line_jumps`, `remove_blank_lines`, `reindent`, `autoindent`, `align` |
//! | collection | `keys`, `values`, `count`, `flatten`                          |
//! | misc       | `type`, `sha224`, `sha256`, `sha384`, `sha512`                |

use std::collections::HashMap;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use tera::{Tera, Value};

type Args = HashMap<String, Value>;

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bool_arg(args: &Args, name: &str, default: bool) -> tera::Result<bool> {
    match args.get(name) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(tera::Error::msg(format!("`{name}` must be a boolean, got {other}"))),
    }
}

fn int_arg(args: &Args, name: &str, default: i64) -> tera::Result<i64> {
    match args.get(name) {
        None => Ok(default),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| tera::Error::msg(format!("`{name}` must be an integer, got {v}"))),
    }
}

fn usize_arg(args: &Args, name: &str, default: usize) -> tera::Result<usize> {
    let n = int_arg(args, name, default as i64)?;
    usize::try_from(n).map_err(|_| tera::Error::msg(format!("`{name}` must not be negative")))
}

fn char_arg(args: &Args, name: &str, default: char) -> tera::Result<char> {
    match args.get(name) {
        None => Ok(default),
        Some(Value::String(s)) if s.chars().count() == 1 => Ok(s.chars().next().unwrap_or(default)),
        Some(other) => Err(tera::Error::msg(format!(
            "`{name}` must be a single character, got {other}"
        ))),
    }
}

fn str_list_arg(args: &Args, name: &str, default: &[&str]) -> tera::Result<Vec<String>> {
    match args.get(name) {
        None => Ok(default.iter().map(|s| (*s).to_string()).collect()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => Ok(items.iter().map(text_of).collect()),
        Some(other) => Err(tera::Error::msg(format!(
            "`{name}` must be a string or a list of strings, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Case
// ---------------------------------------------------------------------------

fn strip_separators(s: &str, args: &Args) -> tera::Result<String> {
    let underscore = bool_arg(args, "remove_underscore", true)?;
    let hyphen = bool_arg(args, "remove_hyphen", true)?;
    let dot = bool_arg(args, "remove_dot", false)?;
    Ok(s.chars()
        .filter(|c| !((underscore && *c == '_') || (hyphen && *c == '-') || (dot && *c == '.')))
        .collect())
}

/// Map the first character matching `pred` through `map`.
fn map_first(s: &str, pred: fn(&char) -> bool, map: fn(char) -> char) -> String {
    let mut done = false;
    s.chars()
        .map(|c| {
            if !done && pred(&c) {
                done = true;
                map(c)
            } else {
                c
            }
        })
        .collect()
}

pub fn camel(value: &Value, args: &Args) -> tera::Result<Value> {
    let s = strip_separators(&text_of(value), args)?;
    Ok(Value::String(map_first(&s, char::is_ascii_uppercase, |c| c.to_ascii_lowercase())))
}

pub fn pascal(value: &Value, args: &Args) -> tera::Result<Value> {
    let s = strip_separators(&text_of(value), args)?;
    Ok(Value::String(map_first(&s, char::is_ascii_lowercase, |c| c.to_ascii_uppercase())))
}

fn split_words(s: &str, sep: char, args: &Args) -> tera::Result<String> {
    let preserve_caps = bool_arg(args, "preserve_caps", true)?;
    let group_caps = bool_arg(args, "group_caps", true)?;
    let numbers = bool_arg(args, "consider_numbers", true)?;

    let starts_word = |c: char| c.is_ascii_uppercase() || (numbers && c.is_ascii_digit());
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if let Some(p) = prev {
            let boundary = (starts_word(c) && !(group_caps && starts_word(p)))
                || (numbers && p.is_ascii_digit() && c.is_ascii_lowercase());
            if boundary {
                out.push(sep);
            }
        }
        out.push(c);
        prev = Some(c);
    }
    Ok(if preserve_caps { out } else { out.to_lowercase() })
}

pub fn snake(value: &Value, args: &Args) -> tera::Result<Value> {
    split_words(&text_of(value), '_', args).map(Value::String)
}

pub fn kebab(value: &Value, args: &Args) -> tera::Result<Value> {
    split_words(&text_of(value), '-', args).map(Value::String)
}

// ---------------------------------------------------------------------------
// Padding
// ---------------------------------------------------------------------------

fn pad(value: &Value, args: &Args, left_share: fn(usize, usize) -> usize) -> tera::Result<Value> {
    let s = text_of(value);
    let width = usize_arg(args, "width", 0)?;
    let fill = char_arg(args, "fill", ' ')?;
    let len = s.chars().count();
    if len >= width {
        return Ok(Value::String(s));
    }
    let margin = width - len;
    let left = left_share(margin, width);
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat(fill).take(left));
    out.push_str(&s);
    out.extend(std::iter::repeat(fill).take(margin - left));
    Ok(Value::String(out))
}

pub fn ljust(value: &Value, args: &Args) -> tera::Result<Value> {
    pad(value, args, |_, _| 0)
}

pub fn rjust(value: &Value, args: &Args) -> tera::Result<Value> {
    pad(value, args, |margin, _| margin)
}

/// An odd margin puts the extra fill on the left only when `width` is odd.
pub fn center(value: &Value, args: &Args) -> tera::Result<Value> {
    pad(value, args, |margin, width| margin / 2 + (margin & width & 1))
}

// ---------------------------------------------------------------------------
// Paragraph
// ---------------------------------------------------------------------------

pub fn strip_line_jumps(value: &Value, _args: &Args) -> tera::Result<Value> {
    Ok(Value::String(text_of(value).trim_matches('\n').to_string()))
}

/// Collapse every run of blank (or whitespace-only) lines into one line jump.
pub fn remove_blank_lines(value: &Value, _args: &Args) -> tera::Result<Value> {
    let text = text_of(value);
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(pos) = rest.find('\n') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];
        // Swallow whitespace-only lines that end with a line jump.
        loop {
            let blank_len = rest.len() - rest.trim_start().len();
            match rest[..blank_len].rfind('\n') {
                Some(nl) => rest = &rest[nl + 1..],
                None => break,
            }
        }
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

struct IndentStyle {
    spaces: usize,
    tabs: bool,
    first: bool,
    blank: bool,
}

impl IndentStyle {
    fn from_args(args: &Args) -> tera::Result<Self> {
        Ok(Self {
            spaces: usize_arg(args, "spaces", 2)?,
            tabs: bool_arg(args, "tabs", false)?,
            first: bool_arg(args, "first", false)?,
            blank: bool_arg(args, "blank", false)?,
        })
    }

    fn indent(&self, depth: i64) -> String {
        let depth = depth.max(0) as usize;
        if self.tabs {
            "\t".repeat(depth)
        } else {
            " ".repeat(depth * self.spaces)
        }
    }

    fn apply(&self, line: &str, depth: i64) -> String {
        let stripped = line.trim_start();
        if stripped.is_empty() || self.blank {
            stripped.to_string()
        } else {
            format!("{}{stripped}", self.indent(depth))
        }
    }
}

/// Replace the indentation of every line with `depth` levels.
pub fn reindent(value: &Value, args: &Args) -> tera::Result<Value> {
    let style = IndentStyle::from_args(args)?;
    let depth = int_arg(args, "depth", 1)?;
    let text = text_of(value);
    let lines: Vec<String> = text
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 && !style.first {
                line.to_string()
            } else {
                style.apply(line, depth)
            }
        })
        .collect();
    Ok(Value::String(lines.join("\n")))
}

/// Re-indent lines by block depth, counting `starts` and `ends` delimiters.
/// The first line's own indentation sets the base depth.
pub fn autoindent(value: &Value, args: &Args) -> tera::Result<Value> {
    let style = IndentStyle::from_args(args)?;
    let starts = str_list_arg(args, "starts", &["{"])?;
    let ends = str_list_arg(args, "ends", &["}"])?;
    let count = |line: &str, delims: &[String]| -> i64 {
        delims
            .iter()
            .filter(|d| !d.is_empty())
            .map(|d| line.matches(d.as_str()).count() as i64)
            .sum()
    };

    let text = text_of(value);
    let mut lines = Vec::new();
    let mut next_depth = 0i64;
    for (i, line) in text.split('\n').enumerate() {
        let mut depth = next_depth;
        if i == 0 {
            depth = if style.tabs {
                (line.len() - line.trim_start_matches('\t').len()) as i64
            } else {
                let width = line.len() - line.trim_start_matches(' ').len();
                width.div_ceil(style.spaces.max(1)) as i64
            };
            next_depth = depth + count(line, &starts);
            if !style.first {
                lines.push(line.to_string());
                continue;
            }
        }
        depth -= count(line, &ends);
        next_depth = depth + count(line, &starts);
        lines.push(style.apply(line, depth));
    }
    Ok(Value::String(lines.join("\n")))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Justify {
    Left,
    Right,
}

/// Align columns across lines: `§` ends a left-justified column, `§§` a
/// right-justified one. Lines without markers do not affect column widths.
pub fn align(value: &Value, args: &Args) -> tera::Result<Value> {
    let margin = usize_arg(args, "margin", 1)?;
    let text = text_of(value);

    let mut rows: Vec<Vec<(String, Justify)>> = Vec::new();
    let mut widths: Vec<usize> = Vec::new();
    for line in text.split('\n') {
        let marked = line.contains('§');
        let right_parts: Vec<&str> = line.split("§§").collect();
        let mut row = Vec::new();
        for (ri, right_part) in right_parts.iter().enumerate() {
            let left_parts: Vec<&str> = right_part.split('§').collect();
            for (li, part) in left_parts.iter().enumerate() {
                let cell = if row.is_empty() { part.trim_end() } else { part.trim() };
                let justify = if li == left_parts.len() - 1 && ri != right_parts.len() - 1 {
                    Justify::Right
                } else {
                    Justify::Left
                };
                if marked {
                    let width = cell.chars().count();
                    match widths.get_mut(row.len()) {
                        Some(w) => *w = (*w).max(width),
                        None => widths.push(width),
                    }
                }
                row.push((cell.to_string(), justify));
            }
        }
        rows.push(row);
    }

    if widths.is_empty() {
        return Ok(Value::String(text));
    }

    let gap = " ".repeat(margin);
    let lines: Vec<String> = rows
        .into_iter()
        .map(|row| {
            let last = row.len() - 1;
            let mut line = String::new();
            for (i, (cell, justify)) in row.into_iter().enumerate() {
                if i == last {
                    line.push_str(&cell);
                    break;
                }
                let width = widths.get(i).copied().unwrap_or(0);
                let fill = " ".repeat(width.saturating_sub(cell.chars().count()));
                match justify {
                    Justify::Left => {
                        line.push_str(&cell);
                        line.push_str(&fill);
                    }
                    Justify::Right => {
                        line.push_str(&fill);
                        line.push_str(&cell);
                    }
                }
                line.push_str(&gap);
            }
            line
        })
        .collect();
    Ok(Value::String(lines.join("\n")))
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

pub fn keys(value: &Value, _args: &Args) -> tera::Result<Value> {
    match value {
        Value::Object(map) => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
        other => Err(tera::Error::msg(format!("`keys` expects a mapping, got {other}"))),
    }
}

pub fn values(value: &Value, _args: &Args) -> tera::Result<Value> {
    match value {
        Value::Object(map) => Ok(Value::Array(map.values().cloned().collect())),
        other => Err(tera::Error::msg(format!("`values` expects a mapping, got {other}"))),
    }
}

/// Occurrences of `value` in a list, or of a substring in a string.
pub fn count(value: &Value, args: &Args) -> tera::Result<Value> {
    let needle = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("`count` requires a `value` argument"))?;
    let n = match (value, needle) {
        (Value::Array(items), _) => items.iter().filter(|item| *item == needle).count(),
        (Value::String(s), Value::String(sub)) if !sub.is_empty() => s.matches(sub.as_str()).count(),
        (other, _) => {
            return Err(tera::Error::msg(format!("`count` expects a list or a string, got {other}")))
        }
    };
    Ok(Value::from(n))
}

fn flatten_into(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_into(item, out)),
        Value::Object(map) => map.values().for_each(|item| flatten_into(item, out)),
        scalar => out.push(scalar.clone()),
    }
}

pub fn flatten(value: &Value, _args: &Args) -> tera::Result<Value> {
    let mut out = Vec::new();
    flatten_into(value, &mut out);
    Ok(Value::Array(out))
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

pub fn type_name(value: &Value, _args: &Args) -> tera::Result<Value> {
    Ok(Value::from(stencil_core::Value::from(value.clone()).type_name()))
}

/// Compact JSON with sorted keys, so equal values hash equally.
fn canonical_json(value: &Value) -> tera::Result<String> {
    let sorted = serde_json::Value::from(stencil_core::Value::from(value.clone()));
    serde_json::to_string(&sorted).map_err(|e| tera::Error::chain("cannot hash value", e))
}

fn digest<D: Digest>(value: &Value) -> tera::Result<Value> {
    let json = canonical_json(value)?;
    Ok(Value::String(hex::encode(D::digest(json.as_bytes()))))
}

pub fn sha224(value: &Value, _args: &Args) -> tera::Result<Value> {
    digest::<Sha224>(value)
}

pub fn sha256(value: &Value, _args: &Args) -> tera::Result<Value> {
    digest::<Sha256>(value)
}

pub fn sha384(value: &Value, _args: &Args) -> tera::Result<Value> {
    digest::<Sha384>(value)
}

pub fn sha512(value: &Value, _args: &Args) -> tera::Result<Value> {
    digest::<Sha512>(value)
}

/// Register every built-in filter on `tera`.
pub fn register(tera: &mut Tera) {
    tera.register_filter("camel", camel);
    tera.register_filter("pascal", pascal);
    tera.register_filter("snake", snake);
    tera.register_filter("kebab", kebab);
    tera.register_filter("ljust", ljust);
    tera.register_filter("rjust", rjust);
    tera.register_filter("center", center);
    tera.register_filter("strip_line_jumps", strip_line_jumps);
    tera.register_filter("remove_blank_lines", remove_blank_lines);
    tera.register_filter("reindent", reindent);
    tera.register_filter("autoindent", autoindent);
    tera.register_filter("align", align);
    tera.register_filter("keys", keys);
    tera.register_filter("values", values);
    tera.register_filter("count", count);
    tera.register_filter("flatten", flatten);
    tera.register_filter("type", type_name);
    tera.register_filter("sha224", sha224);
    tera.register_filter("sha256", sha256);
    tera.register_filter("sha384", sha384);
    tera.register_filter("sha512", sha512);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
