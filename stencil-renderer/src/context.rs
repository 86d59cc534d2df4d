//! Job context: the merged variables plus the job's own paths.

use std::path::Path;

use stencil_core::identifier::is_identifier;
use stencil_core::{Mapping, Value};

use crate::error::RenderError;

/// Key holding the job's source path.
pub const SOURCE_PATH_KEY: &str = "__source_path__";
/// Key holding the job's primary output path.
pub const OUTPUT_PATH_KEY: &str = "__output_path__";

/// Variables visible to one render job.
///
/// Built from the run-wide merge result; the job-local path keys win over
/// any variable of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct JobContext {
    vars: Mapping,
}

impl JobContext {
    pub fn new(merged: &Mapping, source: &Path, output: &Path) -> Self {
        let mut vars = merged.clone();
        vars.insert(SOURCE_PATH_KEY.into(), Value::from(source.display().to_string()));
        vars.insert(OUTPUT_PATH_KEY.into(), Value::from(output.display().to_string()));
        Self { vars }
    }

    pub fn vars(&self) -> &Mapping {
        &self.vars
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(&self.vars)?)
    }

    /// Define `dotted` (e.g. `a.b.c`) as an empty string, creating missing
    /// intermediate mappings.
    ///
    /// Returns `false` when the name cannot be defined: a segment is not an
    /// identifier, a parent is not a mapping, or the leaf already exists.
    pub fn define_empty(&mut self, dotted: &str) -> bool {
        let segments: Vec<&str> = dotted.split('.').collect();
        if segments.iter().any(|s| !is_identifier(s)) {
            return false;
        }
        let Some((leaf, parents)) = segments.split_last() else {
            return false;
        };

        let mut current = &mut self.vars;
        for segment in parents {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            match entry {
                Value::Mapping(map) => current = map,
                _ => return false,
            }
        }
        if current.contains_key(*leaf) {
            return false;
        }
        current.insert((*leaf).to_string(), Value::from(""));
        true
    }

    /// Pretty JSON of the whole context, as prefixed by `--debug-vars`.
    pub fn debug_dump(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(&self.vars)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(vars: Mapping) -> JobContext {
        JobContext::new(&vars, Path::new("src/a.txt.j2"), Path::new("out/a.txt"))
    }

    #[test]
    fn job_paths_override_variables() {
        let mut vars = Mapping::new();
        vars.insert(SOURCE_PATH_KEY.into(), Value::from("shadowed"));
        let ctx = context(vars);
        assert_eq!(ctx.vars()[SOURCE_PATH_KEY], Value::from("src/a.txt.j2"));
        assert_eq!(ctx.vars()[OUTPUT_PATH_KEY], Value::from("out/a.txt"));
    }

    #[test]
    fn define_empty_creates_parents() {
        let mut ctx = context(Mapping::new());
        assert!(ctx.define_empty("a.b.c"));
        let a = ctx.vars()["a"].as_mapping().unwrap();
        let b = a["b"].as_mapping().unwrap();
        assert_eq!(b["c"], Value::from(""));
        // Second attempt is refused so callers cannot loop.
        assert!(!ctx.define_empty("a.b.c"));
    }

    #[test]
    fn define_empty_refuses_scalar_parent_and_bad_names() {
        let mut vars = Mapping::new();
        vars.insert("n".into(), Value::Int(1));
        let mut ctx = context(vars);
        assert!(!ctx.define_empty("n.x"));
        assert!(!ctx.define_empty("list[0]"));
        assert!(!ctx.define_empty(""));
    }

    #[test]
    fn debug_dump_is_pretty_json() {
        let ctx = context(Mapping::new());
        let dump = ctx.debug_dump().unwrap();
        assert!(dump.starts_with("{\n"));
        assert!(dump.contains(OUTPUT_PATH_KEY));
    }
}
