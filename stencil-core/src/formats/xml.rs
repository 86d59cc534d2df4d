//! XML → mapping conversion.
//!
//! - element → key, children → nested mapping
//! - repeated sibling elements → sequence, in document order
//! - attribute `name` → key `@name` (plain `name` with `convert_attributes`)
//! - text of an element that also has children or attributes → `#text`
//! - leaf text and attribute values are coerced; empty elements are `Null`
//! - a root element named `_` is unwrapped

use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::coerce::coerce;
use crate::error::FormatError;
use crate::value::{Mapping, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlOptions {
    /// Store attributes without the `@` prefix.
    pub convert_attributes: bool,
    /// Drop `ns:` prefixes from element and attribute names.
    pub remove_namespaces: bool,
}

struct Frame {
    name: String,
    children: Mapping,
    repeated: HashSet<String>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self { name, children: Mapping::new(), repeated: HashSet::new(), text: String::new() }
    }

    fn add_child(&mut self, key: String, value: Value) {
        if self.repeated.contains(&key) {
            if let Some(Value::Sequence(items)) = self.children.get_mut(&key) {
                items.push(value);
            }
        } else if let Some(previous) = self.children.remove(&key) {
            self.children.insert(key.clone(), Value::Sequence(vec![previous, value]));
            self.repeated.insert(key);
        } else {
            self.children.insert(key, value);
        }
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.children.is_empty() {
            return if text.is_empty() { Value::Null } else { coerce(text) };
        }
        let mut children = self.children;
        if !text.is_empty() {
            children.insert("#text".to_string(), coerce(text));
        }
        Value::Mapping(children)
    }
}

fn local_name(name: &str, options: &XmlOptions) -> String {
    if options.remove_namespaces {
        name.rsplit(':').next().unwrap_or(name).to_string()
    } else {
        name.to_string()
    }
}

fn open(start: &BytesStart<'_>, options: &XmlOptions) -> Result<Frame, FormatError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut frame = Frame::new(local_name(&name, options));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FormatError::Xml(e.to_string()))?;
        let key = local_name(&String::from_utf8_lossy(attr.key.as_ref()), options);
        let key = if options.convert_attributes { key } else { format!("@{key}") };
        let value = attr.unescape_value()?;
        frame.add_child(key, coerce(&value));
    }
    Ok(frame)
}

/// Convert an XML document into a variable mapping.
pub fn parse(text: &str, options: &XmlOptions) -> Result<Mapping, FormatError> {
    let mut reader = Reader::from_str(text);
    let mut stack = vec![Frame::new(String::new())];

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(open(&start, options)?),
            Event::Empty(start) => {
                let frame = open(&start, options)?;
                if let Some(parent) = stack.last_mut() {
                    parent.add_child(frame.name.clone(), frame.into_value());
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(FormatError::Xml("unexpected closing tag".to_string()));
                }
                if let Some(frame) = stack.pop() {
                    let name = frame.name.clone();
                    if let Some(parent) = stack.last_mut() {
                        parent.add_child(name, frame.into_value());
                    }
                }
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&data);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(FormatError::Xml("unexpected end of document".to_string()));
    }
    let mut root = stack.pop().map(|frame| frame.children).unwrap_or_default();
    match root.remove("_") {
        Some(Value::Mapping(inner)) => Ok(inner),
        Some(Value::Null) => Ok(Mapping::new()),
        Some(other) => {
            root.insert("_".to_string(), other);
            Ok(root)
        }
        None => Ok(root),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
