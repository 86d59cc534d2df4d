//! Value coercion for formats that only store strings.
//!
//! [`coerce`] reads a raw string as a literal: `None`/`null`, booleans,
//! integers, floats, quoted strings, `[..]` lists, `(..)` tuples, `{k: v}`
//! mappings and `{a, b}` sets. Tuples and sets become sequences. Anything that
//! does not parse as a complete literal is returned as the unchanged string.

use crate::value::{Mapping, Value};

/// Coerce `raw` into the most specific [`Value`] it spells.
pub fn coerce(raw: &str) -> Value {
    LiteralParser::new(raw)
        .parse_document()
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn parse_document(&mut self) -> Option<Value> {
        self.skip_ws();
        let value = self.parse_value()?;
        self.skip_ws();
        self.rest().is_empty().then_some(value)
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '[' => {
                self.bump();
                self.parse_items(']').map(|(items, _)| Value::Sequence(items))
            }
            '(' => {
                self.bump();
                let (mut items, saw_comma) = self.parse_items(')')?;
                // `(x)` is a parenthesised value, `(x,)` is a tuple.
                if items.len() == 1 && !saw_comma {
                    items.pop()
                } else {
                    Some(Value::Sequence(items))
                }
            }
            '{' => {
                self.bump();
                self.parse_braced()
            }
            '\'' | '"' => self.parse_string().map(Value::String),
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.parse_number(),
            c if c.is_alphabetic() || c == '_' => self.parse_word(),
            _ => None,
        }
    }

    /// Comma-separated values up to `close`. Returns the items and whether a
    /// comma was seen.
    fn parse_items(&mut self, close: char) -> Option<(Vec<Value>, bool)> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        self.skip_ws();
        if self.eat(close) {
            return Some((items, saw_comma));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            if self.eat(',') {
                saw_comma = true;
                self.skip_ws();
                if self.eat(close) {
                    return Some((items, saw_comma));
                }
            } else if self.eat(close) {
                return Some((items, saw_comma));
            } else {
                return None;
            }
        }
    }

    /// `{}` → empty mapping, `{k: v, ..}` → mapping, `{a, ..}` → sequence.
    fn parse_braced(&mut self) -> Option<Value> {
        self.skip_ws();
        if self.eat('}') {
            return Some(Value::Mapping(Mapping::new()));
        }
        let first = self.parse_value()?;
        self.skip_ws();
        if self.eat(':') {
            let mut map = Mapping::new();
            let value = self.parse_value()?;
            map.insert(first.to_key()?, value);
            loop {
                self.skip_ws();
                if self.eat('}') {
                    return Some(Value::Mapping(map));
                }
                if !self.eat(',') {
                    return None;
                }
                self.skip_ws();
                if self.eat('}') {
                    return Some(Value::Mapping(map));
                }
                let key = self.parse_value()?.to_key()?;
                self.skip_ws();
                if !self.eat(':') {
                    return None;
                }
                let value = self.parse_value()?;
                map.insert(key, value);
            }
        }

        // Set literal: elements must be hashable, duplicates collapse.
        first.to_key()?;
        let mut items = vec![first];
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Some(Value::Sequence(items));
            }
            if !self.eat(',') {
                return None;
            }
            self.skip_ws();
            if self.eat('}') {
                return Some(Value::Sequence(items));
            }
            let item = self.parse_value()?;
            item.to_key()?;
            if !items.contains(&item) {
                items.push(item);
            }
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\n' => return None,
                '\\' => {
                    let escaped = self.bump()?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' => out.push(escaped),
                        '\n' => {}
                        'x' => out.push(self.parse_hex_escape(2)?),
                        'u' => out.push(self.parse_hex_escape(4)?),
                        'U' => out.push(self.parse_hex_escape(8)?),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn parse_hex_escape(&mut self, len: usize) -> Option<char> {
        let digits = self.rest().get(..len)?;
        let code = u32::from_str_radix(digits, 16).ok()?;
        self.pos += len;
        char::from_u32(code)
    }

    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.bump();
                true
            }
            Some('+') => {
                self.bump();
                false
            }
            _ => false,
        };
        self.skip_ws();

        let rest = self.rest();
        let radix = match rest.get(..2).map(str::to_ascii_lowercase).as_deref() {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let digits = self.src[digits_start..self.pos].replace('_', "");
            let magnitude = i64::from_str_radix(&digits, radix).ok()?;
            return Some(Value::Int(if negative { -magnitude } else { magnitude }));
        }

        let body_start = self.pos;
        let mut is_float = false;
        self.eat_digits();
        if self.eat('.') {
            is_float = true;
            self.eat_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            self.eat_digits();
        }
        let body = self.src[body_start..self.pos].replace('_', "");
        if body.is_empty() || body.starts_with('e') || body.starts_with('E') {
            self.pos = start;
            return None;
        }

        if is_float {
            let magnitude: f64 = body.parse().ok()?;
            Some(Value::Float(if negative { -magnitude } else { magnitude }))
        } else {
            // Decimal literals with leading zeros (`007`) are not integers.
            if body.len() > 1 && body.starts_with('0') && body.chars().any(|c| c != '0') {
                return None;
            }
            let magnitude: i64 = body.parse().ok()?;
            Some(Value::Int(if negative { -magnitude } else { magnitude }))
        }
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn parse_word(&mut self) -> Option<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "None" | "null" => Some(Value::Null),
            "True" | "true" => Some(Value::Bool(true)),
            "False" | "false" => Some(Value::Bool(false)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
