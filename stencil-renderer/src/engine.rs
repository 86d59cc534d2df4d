//! Tera rendering engine: [`TemplateEngine`].
//!
//! The engine owns a base [`Tera`] holding every include-directory template,
//! the built-in filters and tests, the directives and the user hooks. Each job
//! renders on a clone of that base with the job's own template added, so a
//! broken template never poisons the jobs after it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::Tera;

use stencil_core::{Capabilities, Diagnostic, DiagnosticKind, Diagnostics, FilterHook, Mapping, TestHook};

use crate::capture::SharedCapture;
use crate::conditions::undefined_in_conditions;
use crate::context::JobContext;
use crate::error::{error_chain, io_err, RenderError};
use crate::job::{RenderJob, RenderOutput};
use crate::{directives, filters, testers};

/// Upper bound on relaxed-undefined retries for a single job.
const MAX_RELAXED_PASSES: usize = 64;

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Every readable text file under `dir`, named by its path relative to `dir`.
fn load_include_dir(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.is_dir() {
        tracing::warn!("include directory {} does not exist, skipping", dir.display());
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    files.sort();

    let mut templates = Vec::new();
    for path in files {
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::debug!("skipping non-text include {}", path.display());
                continue;
            }
            Err(e) => return Err(io_err(&path, e)),
        };
        templates.push((normalize_template_name(rel), contents));
    }
    Ok(templates)
}

/// Earlier include directories win when two provide the same name.
fn build_tera(include_dirs: &[PathBuf]) -> Result<Tera, RenderError> {
    let mut templates: BTreeMap<String, String> = BTreeMap::new();
    for dir in include_dirs {
        for (name, content) in load_include_dir(dir)? {
            templates.entry(name).or_insert(content);
        }
    }
    tracing::debug!("loaded {} include template(s)", templates.len());

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(templates).map_err(classify_parse_error)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

fn classify_parse_error(err: tera::Error) -> RenderError {
    match &err.kind {
        tera::ErrorKind::MissingParent { parent, .. } => {
            RenderError::MissingTemplate { name: parent.clone() }
        }
        _ => RenderError::Syntax { message: error_chain(&err) },
    }
}

/// The name Tera reports as missing from the context, if that is the failure.
fn undefined_name(err: &tera::Error) -> Option<String> {
    const START: &str = "Variable `";
    const END: &str = "` not found in context";
    let chain = error_chain(err);
    let start = chain.find(START)? + START.len();
    let rest = &chain[start..];
    let end = rest.find(END)?;
    Some(rest[..end].to_string())
}

fn missing_template(err: &tera::Error) -> Option<String> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(tera_err) = e.downcast_ref::<tera::Error>() {
            if let tera::ErrorKind::TemplateNotFound(name) = &tera_err.kind {
                return Some(name.clone());
            }
        }
        current = e.source();
    }
    None
}

fn classify_render_error(err: tera::Error) -> RenderError {
    if let Some(name) = missing_template(&err) {
        RenderError::MissingTemplate { name }
    } else if let Some(name) = undefined_name(&err) {
        RenderError::Undefined { name }
    } else {
        RenderError::from(err)
    }
}

// ---------------------------------------------------------------------------
// User hook bridges
// ---------------------------------------------------------------------------

struct HookFilter {
    name: String,
    hook: Arc<dyn FilterHook>,
}

impl tera::Filter for HookFilter {
    fn filter(
        &self,
        value: &tera::Value,
        args: &HashMap<String, tera::Value>,
    ) -> tera::Result<tera::Value> {
        let args: Mapping = args
            .iter()
            .map(|(k, v)| (k.clone(), stencil_core::Value::from(v.clone())))
            .collect();
        let out = self
            .hook
            .apply(&stencil_core::Value::from(value.clone()), &args)
            .map_err(|e| tera::Error::chain(format!("filter '{}' failed", self.name), e))?;
        Ok(tera::Value::from(out))
    }
}

struct HookTest {
    name: String,
    hook: Arc<dyn TestHook>,
}

impl tera::Test for HookTest {
    fn test(&self, value: Option<&tera::Value>, args: &[tera::Value]) -> tera::Result<bool> {
        let value = value
            .cloned()
            .map(stencil_core::Value::from)
            .unwrap_or(stencil_core::Value::Null);
        let args: Vec<stencil_core::Value> =
            args.iter().cloned().map(stencil_core::Value::from).collect();
        self.hook
            .test(&value, &args)
            .map_err(|e| tera::Error::chain(format!("test '{}' failed", self.name), e))
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Engine settings fixed for a whole run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub include_dirs: Vec<PathBuf>,
    /// Fail on undefined variables; when off they render as empty strings.
    pub strict_undefined: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { include_dirs: Vec::new(), strict_undefined: true }
    }
}

/// Tera-based engine shared by every job of a run.
pub struct TemplateEngine {
    tera: Tera,
    capture: SharedCapture,
    strict_undefined: bool,
}

impl TemplateEngine {
    /// Load the include directories and register built-ins, directives and
    /// the user hooks from `capabilities` (which may shadow built-ins).
    pub fn new(options: &EngineOptions, capabilities: &Capabilities) -> Result<Self, RenderError> {
        let mut tera = build_tera(&options.include_dirs)?;
        let capture = SharedCapture::new();

        filters::register(&mut tera);
        testers::register(&mut tera);
        directives::register(&mut tera, &capture);
        for (name, hook) in capabilities.filters() {
            tracing::debug!("registering user filter '{name}'");
            tera.register_filter(name, HookFilter { name: name.to_string(), hook: hook.clone() });
        }
        for (name, hook) in capabilities.tests() {
            tracing::debug!("registering user test '{name}'");
            tera.register_tester(name, HookTest { name: name.to_string(), hook: hook.clone() });
        }

        Ok(TemplateEngine { tera, capture, strict_undefined: options.strict_undefined })
    }

    /// Render `job` against `vars`.
    ///
    /// Warnings raised by the template are pushed to `diagnostics` tagged with
    /// the source path, whether or not the job succeeds.
    pub fn render(
        &self,
        job: &RenderJob,
        vars: &Mapping,
        diagnostics: &mut Diagnostics,
    ) -> Result<RenderOutput, RenderError> {
        let name = job.template_name();
        let mut tera = self.tera.clone();
        tera.add_raw_template(&name, &job.template_text)
            .map_err(classify_parse_error)?;

        let mut context = JobContext::new(vars, &job.source_path, &job.output_path);
        if self.strict_undefined {
            let template = tera.get_template(&name)?;
            if let Some(missing) = undefined_in_conditions(&template.ast, context.vars()) {
                return Err(RenderError::Undefined { name: missing });
            }
        }

        for _ in 0..MAX_RELAXED_PASSES {
            self.capture.reset()?;
            let result = tera.render(&name, &context.to_tera_context()?);
            let capture = self.capture.take()?;

            let err = match result {
                Ok(text) => {
                    self.report_warnings(capture.warnings.iter(), job, diagnostics);
                    let primary = (!capture.suppresses_parent()).then_some(text);
                    tracing::debug!(
                        "rendered {} ({} secondary write(s))",
                        job.source_path.display(),
                        capture.requests.len()
                    );
                    return Ok(RenderOutput { primary, requests: capture.requests });
                }
                Err(err) => err,
            };

            if !self.strict_undefined {
                if let Some(missing) = undefined_name(&err) {
                    if capture.error.is_none() && context.define_empty(&missing) {
                        tracing::debug!("treating undefined '{missing}' as empty");
                        continue;
                    }
                }
            }

            self.report_warnings(capture.warnings.iter(), job, diagnostics);
            return Err(match capture.error {
                Some(message) => RenderError::Directive { message },
                None => classify_render_error(err),
            });
        }
        Err(RenderError::Engine {
            message: format!("more than {MAX_RELAXED_PASSES} undefined variables"),
        })
    }

    fn report_warnings<'a>(
        &self,
        warnings: impl Iterator<Item = &'a String>,
        job: &RenderJob,
        diagnostics: &mut Diagnostics,
    ) {
        for warning in warnings {
            diagnostics.push(
                Diagnostic::warning(DiagnosticKind::Render, warning.clone())
                    .with_path(&job.source_path),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
