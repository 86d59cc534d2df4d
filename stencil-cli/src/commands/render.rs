//! `stencil render`: render sources into outputs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use stencil_core::config::DEFAULT_RENDER_SUFFIX;
use stencil_core::{
    Diagnostic, DiagnosticKind, Diagnostics, NonTemplatePolicy, Options, OverwritePolicy,
    WorkingDirPolicy,
};
use stencil_output::{JobStatus, RunReport, Targets};
use stencil_renderer::{EngineOptions, TemplateEngine};

use super::{invocation_dir, VarArgs};
use crate::report;

/// Arguments for `stencil render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template files or directories, rendered in the order given.
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Output directory; source directories are mirrored under it.
    #[arg(short = 'O', long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Output file for a single source.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory searched by include, import and extends.
    #[arg(short = 'I', long = "incdir", value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    #[command(flatten)]
    pub vars: VarArgs,

    /// Extra filter backed by a command.
    #[arg(long = "filter", value_name = "NAME=CMD")]
    pub filters: Vec<String>,

    /// Extra test backed by a command.
    #[arg(long = "test", value_name = "NAME=CMD")]
    pub tests: Vec<String>,

    /// Warn before overwriting an existing file.
    #[arg(long)]
    pub warn_overwrite: bool,

    /// Never overwrite an existing file.
    #[arg(long)]
    pub no_overwrite: bool,

    /// Remove the output directory before rendering.
    #[arg(long)]
    pub overwrite_outdir: bool,

    /// Render undefined variables as empty instead of failing.
    #[arg(long)]
    pub no_strict_undefined: bool,

    /// Strip trailing whitespace from every output.
    #[arg(long)]
    pub trim_whitespace: bool,

    /// Resolve relative write targets against the source directory.
    #[arg(long)]
    pub chdir_src: bool,

    /// Resolve relative write targets against the current directory.
    #[arg(long)]
    pub no_chdir: bool,

    /// Render files without the `.j2` extension, inserting SUFFIX in their name.
    #[arg(long, value_name = "SUFFIX", num_args = 0..=1, require_equals = true, default_missing_value = DEFAULT_RENDER_SUFFIX)]
    pub render_non_template: Option<String>,

    /// Copy files without the `.j2` extension unchanged.
    #[arg(long)]
    pub copy_non_template: bool,

    /// Prefix every output with the variables it was rendered with.
    #[arg(long)]
    pub debug_vars: bool,

    /// Stop at the first failed source.
    #[arg(long)]
    pub fail_fast: bool,

    /// Emit a machine-readable JSON report.
    #[arg(long)]
    pub json: bool,
}

impl RenderArgs {
    pub fn run(self) -> Result<ExitCode> {
        if self.output.is_some() && self.sources.len() > 1 {
            bail!("--output takes exactly one source, got {}", self.sources.len());
        }

        let cwd = invocation_dir()?;
        let mut diagnostics = Diagnostics::new();
        let mut options = self.vars.options(&mut diagnostics)?;
        self.apply_flags(&mut options, &mut diagnostics);
        options.include_dirs = options
            .include_dirs
            .iter()
            .chain(&self.include_dirs)
            .map(|dir| cwd.join(dir))
            .collect();

        let capabilities = self.vars.capabilities(&self.filters, &self.tests)?;
        let output_dir = self.outdir.as_ref().map(|dir| cwd.join(dir));
        let vars =
            self.vars.merged_vars(&options, &capabilities, output_dir.as_deref(), &mut diagnostics);

        let engine_options = EngineOptions {
            include_dirs: options.include_dirs.clone(),
            strict_undefined: options.strict_undefined,
        };
        let engine = TemplateEngine::new(&engine_options, &capabilities)
            .context("failed to load templates from include directories")?;

        let targets = Targets { sources: self.sources, outdir: self.outdir, output: self.output };
        let mut run_report = stencil_output::run(engine, vars, options, cwd, &targets);
        diagnostics.extend(std::mem::take(&mut run_report.diagnostics));
        run_report.diagnostics = diagnostics;

        if self.json {
            print_json(&run_report)?;
        } else {
            report::print_jobs(&run_report);
            report::print_diagnostics(&run_report.diagnostics);
        }

        Ok(if run_report.has_errors() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
    }

    /// Layer the rendering flags over `options`, settling conflicting pairs.
    fn apply_flags(&self, options: &mut Options, diagnostics: &mut Diagnostics) {
        let mut usage = |message: &str| {
            diagnostics.push(Diagnostic::warning(DiagnosticKind::Usage, message));
        };

        if self.no_overwrite {
            if self.warn_overwrite {
                usage("--warn-overwrite and --no-overwrite both given; existing files are kept");
            }
            if self.overwrite_outdir {
                usage("--overwrite-outdir given; --no-overwrite ignored");
            } else {
                options.overwrite = OverwritePolicy::Deny;
            }
        } else if self.warn_overwrite {
            options.overwrite = OverwritePolicy::Warn;
        }

        if self.overwrite_outdir {
            if self.outdir.is_some() {
                options.overwrite_outdir = true;
            } else {
                usage("--overwrite-outdir ignored without --outdir");
            }
        }

        match (self.chdir_src, self.no_chdir) {
            (true, true) => {
                usage("--chdir-src and --no-chdir both given; using the source directory");
                options.working_dir = WorkingDirPolicy::Source;
            }
            (true, false) => options.working_dir = WorkingDirPolicy::Source,
            (false, true) => options.working_dir = WorkingDirPolicy::Invocation,
            (false, false) => {}
        }

        match (&self.render_non_template, self.copy_non_template) {
            (Some(suffix), copy) => {
                if copy {
                    usage("--render-non-template and --copy-non-template both given; rendering");
                }
                options.non_template = NonTemplatePolicy::Render { suffix: suffix.clone() };
            }
            (None, true) => options.non_template = NonTemplatePolicy::Copy,
            (None, false) => {}
        }

        if self.no_strict_undefined {
            options.strict_undefined = false;
        }
        options.trim_whitespace |= self.trim_whitespace;
        options.debug_vars |= self.debug_vars;
        options.fail_fast |= self.fail_fast;
    }
}

// ---------------------------------------------------------------------------
// JSON output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RenderReportJson<'a> {
    jobs: Vec<JobJson>,
    written: &'a [PathBuf],
    skipped: &'a [PathBuf],
    diagnostics: Vec<&'a Diagnostic>,
}

#[derive(Serialize)]
struct JobJson {
    source: String,
    output: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_json(run_report: &RunReport) -> Result<()> {
    let jobs = run_report
        .jobs
        .iter()
        .map(|job| {
            let (status, error) = match &job.status {
                JobStatus::Rendered => ("rendered", None),
                JobStatus::Copied => ("copied", None),
                JobStatus::Skipped => ("skipped", None),
                JobStatus::Failed(message) => ("failed", Some(message.clone())),
            };
            JobJson {
                source: job.source.display().to_string(),
                output: job.output.display().to_string(),
                status,
                error,
            }
        })
        .collect();

    let payload = RenderReportJson {
        jobs,
        written: &run_report.flush.written,
        skipped: &run_report.flush.skipped,
        diagnostics: run_report.diagnostics.iter().collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize render report")?
    );
    Ok(())
}
