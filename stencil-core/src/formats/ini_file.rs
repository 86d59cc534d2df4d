//! INI / CFG files.
//!
//! Each section becomes a nested mapping. Properties outside any section and
//! properties of the `[_]` section land in the root.

use ini::Ini;

use crate::coerce::coerce;
use crate::error::FormatError;
use crate::value::{Mapping, Value};

pub fn parse(text: &str) -> Result<Mapping, FormatError> {
    let ini = Ini::load_from_str(text)?;
    let mut root = Mapping::new();

    for (section, props) in ini.iter() {
        let target = match section {
            None | Some("_") => &mut root,
            Some(name) => {
                let entry = root
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Mapping(Mapping::new()));
                if !matches!(entry, Value::Mapping(_)) {
                    *entry = Value::Mapping(Mapping::new());
                }
                match entry {
                    Value::Mapping(map) => map,
                    _ => continue,
                }
            }
        };
        for (key, value) in props.iter() {
            target.insert(key.to_string(), coerce(value));
        }
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_become_nested_mappings() {
        let map = parse("[server]\nhost = localhost\nport = 8080\n").unwrap();
        let server = map["server"].as_mapping().unwrap();
        assert_eq!(server["host"], Value::from("localhost"));
        assert_eq!(server["port"], Value::Int(8080));
    }

    #[test]
    fn underscore_section_and_global_properties_flatten_to_root() {
        let map = parse("top = 1\n[_]\nflat = True\n[other]\nx = 2\n").unwrap();
        assert_eq!(map["top"], Value::Int(1));
        assert_eq!(map["flat"], Value::Bool(true));
        assert_eq!(map["other"].as_mapping().unwrap()["x"], Value::Int(2));
        assert!(!map.contains_key("_"));
    }

    #[test]
    fn repeated_sections_are_merged() {
        let map = parse("[a]\nx = 1\n[a]\ny = 2\n").unwrap();
        let a = map["a"].as_mapping().unwrap();
        assert_eq!(a.len(), 2);
    }
}
