//! Variable merge engine.
//!
//! Sources are folded in increasing priority:
//!
//! 1. built-in context
//! 2. environment (when requested)
//! 3. variable files, in the order given
//! 4. command-line defines, in the order given
//!
//! Mapping/mapping conflicts merge recursively; anything else is replaced by
//! the higher-priority value. Sequences are never concatenated.

use std::path::PathBuf;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::DefineError;
use crate::formats::{self, Format, FormatOptions, VarFile};
use crate::hooks::Capabilities;
use crate::identifier::sanitize_mapping;
use crate::value::{Mapping, Value};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where a layer of variables came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSource {
    Context,
    Environment,
    File { path: PathBuf, format: Format, order: usize },
    CommandLine { order: usize },
}

impl VariableSource {
    /// Sort key: tier first, then position within the tier.
    pub fn priority(&self) -> (u8, usize) {
        match self {
            VariableSource::Context => (0, 0),
            VariableSource::Environment => (1, 0),
            VariableSource::File { order, .. } => (2, *order),
            VariableSource::CommandLine { order } => (3, *order),
        }
    }
}

/// Everything the merge engine reads.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    pub context: Mapping,
    pub environment: Option<Mapping>,
    pub files: Vec<VarFile>,
    pub defines: Vec<String>,
    pub options: FormatOptions,
}

/// The merged root mapping. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    vars: Mapping,
}

impl MergeResult {
    pub fn vars(&self) -> &Mapping {
        &self.vars
    }

    pub fn into_inner(self) -> Mapping {
        self.vars
    }
}

impl From<Mapping> for MergeResult {
    fn from(vars: Mapping) -> Self {
        Self { vars }
    }
}

// ---------------------------------------------------------------------------
// Merge primitives
// ---------------------------------------------------------------------------

/// Merge `incoming` into `base`. `incoming` wins every non-mapping conflict.
pub fn deep_merge(base: &mut Mapping, incoming: Mapping) {
    for (key, value) in incoming {
        match value {
            Value::Mapping(inner) => {
                if let Some(Value::Mapping(existing)) = base.get_mut(&key) {
                    deep_merge(existing, inner);
                } else {
                    base.insert(key, Value::Mapping(inner));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Turn `a.b.c=value` into `{a: {b: {c: value}}}` with a coerced value.
pub fn parse_define(define: &str) -> Result<Mapping, DefineError> {
    let (path, raw) = define
        .split_once('=')
        .ok_or_else(|| DefineError::MissingEquals(define.to_string()))?;
    let segments: Vec<&str> = path.trim().split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DefineError::EmptyKey(define.to_string()));
    }

    let mut value = crate::coerce::coerce(raw);
    for segment in segments.iter().skip(1).rev() {
        let mut level = Mapping::new();
        level.insert((*segment).to_string(), value);
        value = Value::Mapping(level);
    }
    let mut root = Mapping::new();
    root.insert(segments[0].to_string(), value);
    Ok(root)
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Load every source, run the hooks and fold everything into one mapping.
///
/// A file that fails to load is reported and skipped. A failing hook is
/// reported and its input is kept unchanged.
pub fn merge(
    request: MergeRequest,
    capabilities: &Capabilities,
    diagnostics: &mut Diagnostics,
) -> MergeResult {
    let policy = request.options.identifiers;
    let mut layers: Vec<(VariableSource, Mapping)> = Vec::new();

    layers.push((
        VariableSource::Context,
        sanitize_mapping(request.context, policy, diagnostics),
    ));

    if let Some(env) = request.environment {
        layers.push((VariableSource::Environment, sanitize_mapping(env, policy, diagnostics)));
    }

    for (order, file) in request.files.iter().enumerate() {
        let vars = match formats::load_file(file, &request.options, diagnostics) {
            Ok(vars) => vars,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error(DiagnosticKind::Parse, e.to_string()).with_path(&file.path),
                );
                continue;
            }
        };
        let vars = match capabilities.file_adapter() {
            Some(adapter) => {
                let mut adapted = vars.clone();
                match adapter.adapt(&mut adapted) {
                    Ok(()) => {
                        let mut local = Diagnostics::new();
                        let clean = sanitize_mapping(adapted, policy, &mut local);
                        diagnostics.absorb(local, &file.path);
                        clean
                    }
                    Err(e) => {
                        diagnostics.push(
                            Diagnostic::error(DiagnosticKind::Hook, format!("file adapter failed: {e}"))
                                .with_path(&file.path),
                        );
                        vars
                    }
                }
            }
            None => vars,
        };
        layers.push((
            VariableSource::File { path: file.path.clone(), format: file.format, order },
            vars,
        ));
    }

    for (order, define) in request.defines.iter().enumerate() {
        match parse_define(define) {
            Ok(vars) => layers.push((
                VariableSource::CommandLine { order },
                sanitize_mapping(vars, policy, diagnostics),
            )),
            Err(e) => diagnostics.error(DiagnosticKind::Usage, e.to_string()),
        }
    }

    layers.sort_by_key(|(source, _)| source.priority());

    let mut merged = Mapping::new();
    for (source, vars) in layers {
        tracing::debug!(?source, keys = vars.len(), "merging variables");
        deep_merge(&mut merged, vars);
    }

    if let Some(adapter) = capabilities.global_adapter() {
        let mut adapted = merged.clone();
        match adapter.adapt(&mut adapted) {
            Ok(()) => merged = sanitize_mapping(adapted, policy, diagnostics),
            Err(e) => diagnostics.error(DiagnosticKind::Hook, format!("global adapter failed: {e}")),
        }
    }

    MergeResult { vars: merged }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
