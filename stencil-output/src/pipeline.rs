//! Shared pipeline entrypoint: plan jobs from sources, render them one at a
//! time in discovery order, and flush each job before the next one renders.

use std::path::{Path, PathBuf};

use stencil_core::{
    Diagnostic, DiagnosticKind, Diagnostics, Mapping, NonTemplatePolicy, Options, WorkingDirPolicy,
};
use stencil_renderer::{JobContext, JobState, RenderJob, TemplateEngine};

use crate::discover::discover_sources;
use crate::error::OutputError;
use crate::paths::{is_template, output_path_for, OutputNaming};
use crate::writer::{FlushReport, OutputWriter};

/// Number of line jumps between the debug variable dump and the output.
const DEBUG_VARS_SEPARATOR: usize = 10;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// What the run was asked to render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    /// Files and directories, processed in the given order.
    pub sources: Vec<PathBuf>,
    /// Root under which outputs mirror their sources.
    pub outdir: Option<PathBuf>,
    /// Explicit output path for a single source file.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Render,
    Copy,
    Skip,
}

/// A source paired with its primary output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub action: JobAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Rendered,
    Copied,
    Skipped,
    Failed(String),
}

/// What happened to one planned job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub status: JobStatus,
}

impl JobOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, JobStatus::Failed(_))
    }
}

/// Summary of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub jobs: Vec<JobOutcome>,
    pub flush: FlushReport,
    pub diagnostics: Diagnostics,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|job| pred(&job.status)).count()
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One invocation: the engine, the merged variables and the output writer
/// (with its ledger) live exactly as long as this value.
pub struct Run {
    engine: TemplateEngine,
    vars: Mapping,
    options: Options,
    invocation_dir: PathBuf,
    writer: OutputWriter,
    diagnostics: Diagnostics,
}

impl Run {
    pub fn new(engine: TemplateEngine, vars: Mapping, options: Options, invocation_dir: PathBuf) -> Self {
        let writer = OutputWriter::new(options.overwrite, options.trim_whitespace);
        Self { engine, vars, options, invocation_dir, writer, diagnostics: Diagnostics::new() }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        crate::paths::normalize(&self.invocation_dir.join(path))
    }

    fn naming_for(&self, source: &Path) -> (JobAction, OutputNaming<'_>) {
        if is_template(source) {
            return (JobAction::Render, OutputNaming::Template);
        }
        match &self.options.non_template {
            NonTemplatePolicy::Skip => (JobAction::Skip, OutputNaming::Verbatim),
            NonTemplatePolicy::Render { suffix } => (JobAction::Render, OutputNaming::Suffixed(suffix)),
            NonTemplatePolicy::Copy => (JobAction::Copy, OutputNaming::Verbatim),
        }
    }

    fn usage_error(&mut self, err: OutputError, path: &Path) {
        self.diagnostics
            .push(Diagnostic::error(DiagnosticKind::Usage, err.to_string()).with_path(path));
    }

    /// Pair every source with its output path. Sources that cannot be planned
    /// are reported as usage errors and left out.
    pub fn plan(&mut self, targets: &Targets) -> Vec<PlannedJob> {
        let outdir = targets.outdir.as_deref().map(|d| self.absolute(d));
        let mut jobs = Vec::new();

        for raw in &targets.sources {
            let source = self.absolute(raw);
            if source.is_dir() {
                let Some(outdir) = outdir.as_deref() else {
                    self.usage_error(OutputError::OutdirRequired { path: source.clone() }, &source);
                    continue;
                };
                let files = match discover_sources(&source) {
                    Ok(files) => files,
                    Err(err) => {
                        self.usage_error(err, &source);
                        continue;
                    }
                };
                for file in files {
                    let (action, naming) = self.naming_for(&file);
                    let output = output_path_for(&source, &file, Some(outdir), naming);
                    jobs.push(PlannedJob { source: file, output, action });
                }
            } else if source.is_file() {
                let (action, naming) = self.naming_for(&source);
                let output = match &targets.output {
                    Some(output) => self.absolute(output),
                    None => {
                        let root = source.parent().unwrap_or(Path::new("/")).to_path_buf();
                        let out_root = outdir.clone().unwrap_or_else(|| self.invocation_dir.clone());
                        output_path_for(&root, &source, Some(&out_root), naming)
                    }
                };
                jobs.push(PlannedJob { source, output, action });
            } else {
                self.usage_error(OutputError::UnresolvedSource { path: source.clone() }, &source);
            }
        }
        tracing::debug!("planned {} job(s)", jobs.len());
        jobs
    }

    /// Directory that relative directive targets of `job` resolve against.
    fn base_dir(&self, job: &PlannedJob) -> PathBuf {
        match self.options.working_dir {
            WorkingDirPolicy::Output => job.output.parent().map(Path::to_path_buf),
            WorkingDirPolicy::Source => job.source.parent().map(Path::to_path_buf),
            WorkingDirPolicy::Invocation => None,
        }
        .unwrap_or_else(|| self.invocation_dir.clone())
    }

    /// Render and flush one job; `flush` collects its writes.
    pub fn run_job(&mut self, job: &PlannedJob, flush: &mut FlushReport) -> JobOutcome {
        let status = match job.action {
            JobAction::Skip => {
                tracing::debug!("skipping non-template {}", job.source.display());
                JobStatus::Skipped
            }
            JobAction::Copy => match self.writer.copy(&job.source, &job.output, &mut self.diagnostics) {
                Ok(outcome) => {
                    flush.record(Ok(outcome));
                    JobStatus::Copied
                }
                Err(err) => self.fail(job, DiagnosticKind::Write, err.to_string()),
            },
            JobAction::Render => self.render_and_flush(job, flush),
        };
        JobOutcome { source: job.source.clone(), output: job.output.clone(), status }
    }

    fn fail(&mut self, job: &PlannedJob, kind: DiagnosticKind, message: String) -> JobStatus {
        self.diagnostics
            .push(Diagnostic::error(kind, message.clone()).with_path(&job.source));
        JobStatus::Failed(message)
    }

    fn render_and_flush(&mut self, job: &PlannedJob, flush: &mut FlushReport) -> JobStatus {
        let render_job = match RenderJob::load(&job.source, &job.output) {
            Ok(render_job) => render_job,
            Err(err) => return self.fail(job, DiagnosticKind::Render, err.to_string()),
        };
        let state = JobState::Pending.start();
        tracing::debug!("{} {}", state.label(), job.source.display());
        let state = state.finish(self.engine.render(&render_job, &self.vars, &mut self.diagnostics));
        tracing::debug!("{} {}", state.label(), job.source.display());
        let mut output = match state.into_result() {
            Ok(output) => output,
            Err(err) => return self.fail(job, DiagnosticKind::Render, err.to_string()),
        };

        if self.options.debug_vars {
            if let Some(primary) = output.primary.as_mut() {
                let dump = JobContext::new(&self.vars, &job.source, &job.output).debug_dump();
                match dump {
                    Ok(dump) => {
                        *primary = format!("{dump}{}{primary}", "\n".repeat(DEBUG_VARS_SEPARATOR))
                    }
                    Err(err) => return self.fail(job, DiagnosticKind::Render, err.to_string()),
                }
            }
        }

        let base = self.base_dir(job);
        let report = self.writer.flush(&output, &job.output, &base, &mut self.diagnostics);
        let failed = report.errors.len();
        flush.merge(report);
        if failed > 0 {
            // Each failed write already carries its own diagnostic.
            JobStatus::Failed(format!("{failed} write(s) failed"))
        } else {
            JobStatus::Rendered
        }
    }

    fn clear_outdir(&mut self, targets: &Targets) {
        if !self.options.overwrite_outdir {
            return;
        }
        let Some(outdir) = targets.outdir.as_deref().map(|d| self.absolute(d)) else {
            return;
        };
        if !outdir.exists() {
            return;
        }
        tracing::info!("removing output directory {}", outdir.display());
        if let Err(e) = std::fs::remove_dir_all(&outdir) {
            let err = crate::error::io_err(&outdir, e);
            self.diagnostics
                .push(Diagnostic::error(DiagnosticKind::Write, err.to_string()).with_path(&outdir));
        }
    }

    /// Run every job of `targets` and consume the run.
    pub fn execute(mut self, targets: &Targets) -> RunReport {
        self.clear_outdir(targets);
        let jobs = self.plan(targets);

        let mut report = RunReport::default();
        for job in &jobs {
            let outcome = self.run_job(job, &mut report.flush);
            let failed = outcome.is_failed();
            report.jobs.push(outcome);
            if failed && self.options.fail_fast {
                tracing::warn!("stopping after first failure ({} job(s) not run)", jobs.len() - report.jobs.len());
                break;
            }
        }
        report.diagnostics = self.diagnostics;
        report
    }
}

/// Build a [`Run`] and execute it.
pub fn run(
    engine: TemplateEngine,
    vars: Mapping,
    options: Options,
    invocation_dir: PathBuf,
    targets: &Targets,
) -> RunReport {
    Run::new(engine, vars, options, invocation_dir).execute(targets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::{Capabilities, Value};
    use stencil_renderer::EngineOptions;
    use tempfile::TempDir;

    fn new_run(dir: &Path, options: Options) -> Run {
        let engine_options = EngineOptions {
            include_dirs: options.include_dirs.clone(),
            strict_undefined: options.strict_undefined,
        };
        let engine = TemplateEngine::new(&engine_options, &Capabilities::new()).unwrap();
        let mut vars = Mapping::new();
        vars.insert("name".into(), Value::from("world"));
        Run::new(engine, vars, options, dir.to_path_buf())
    }

    #[test]
    fn plan_mirrors_directories_and_names_outputs() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("sub/a.h.j2"), "").unwrap();
        std::fs::write(src.join("plain.bin"), "").unwrap();

        let options = Options {
            non_template: NonTemplatePolicy::Render { suffix: "_r".into() },
            ..Default::default()
        };
        let mut run = new_run(tmp.path(), options);
        let jobs = run.plan(&Targets {
            sources: vec![PathBuf::from("src")],
            outdir: Some(PathBuf::from("out")),
            output: None,
        });

        let out = tmp.path().join("out");
        assert_eq!(
            jobs,
            vec![
                PlannedJob { source: src.join("plain.bin"), output: out.join("plain_r.bin"), action: JobAction::Render },
                PlannedJob { source: src.join("sub/a.h.j2"), output: out.join("sub/a.h"), action: JobAction::Render },
            ]
        );
    }

    #[test]
    fn plan_reports_unusable_sources() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("dir")).unwrap();
        let mut run = new_run(tmp.path(), Options::default());
        let jobs = run.plan(&Targets {
            sources: vec![PathBuf::from("missing.j2"), PathBuf::from("dir")],
            ..Default::default()
        });
        assert!(jobs.is_empty());
        assert_eq!(run.diagnostics.errors().count(), 2);
    }

    #[test]
    fn single_file_defaults_to_invocation_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("t")).unwrap();
        std::fs::write(tmp.path().join("t/hello.txt.j2"), "hello {{ name }}").unwrap();

        let report = new_run(tmp.path(), Options::default()).execute(&Targets {
            sources: vec![PathBuf::from("t/hello.txt.j2")],
            ..Default::default()
        });
        assert!(!report.has_errors());
        assert_eq!(std::fs::read_to_string(tmp.path().join("hello.txt")).unwrap(), "hello world");
    }

    #[test]
    fn explicit_output_path() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.j2"), "x").unwrap();
        let report = new_run(tmp.path(), Options::default()).execute(&Targets {
            sources: vec![PathBuf::from("a.j2")],
            output: Some(PathBuf::from("deep/named.out")),
            ..Default::default()
        });
        assert_eq!(report.jobs[0].status, JobStatus::Rendered);
        assert_eq!(std::fs::read_to_string(tmp.path().join("deep/named.out")).unwrap(), "x");
    }

    #[test]
    fn working_dir_policy_sets_directive_base() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(
            tmp.path().join("src/a.j2"),
            "{% filter write(path=\"side.txt\") %}s{% endfilter %}",
        )
        .unwrap();

        for (policy, expected) in [
            (WorkingDirPolicy::Output, "out/side.txt"),
            (WorkingDirPolicy::Source, "src/side.txt"),
            (WorkingDirPolicy::Invocation, "side.txt"),
        ] {
            let options = Options { working_dir: policy, ..Default::default() };
            let report = new_run(tmp.path(), options).execute(&Targets {
                sources: vec![PathBuf::from("src/a.j2")],
                outdir: Some(PathBuf::from("out")),
                ..Default::default()
            });
            assert!(!report.has_errors());
            assert!(tmp.path().join(expected).is_file(), "{policy:?} -> {expected}");
        }
    }

    #[test]
    fn debug_vars_prefix_primary_output() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.j2"), "body").unwrap();
        let options = Options { debug_vars: true, ..Default::default() };
        new_run(tmp.path(), options).execute(&Targets {
            sources: vec![PathBuf::from("a.j2")],
            ..Default::default()
        });
        let text = std::fs::read_to_string(tmp.path().join("a")).unwrap();
        assert!(text.starts_with("{\n"));
        assert!(text.contains("\"name\": \"world\""));
        assert!(text.ends_with("}\n\n\n\n\n\n\n\n\n\nbody"));
    }

    #[test]
    fn fail_fast_stops_after_first_failure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.j2"), "{{ undefined_thing }}").unwrap();
        std::fs::write(src.join("b.j2"), "fine").unwrap();

        let targets = Targets {
            sources: vec![src.clone()],
            outdir: Some(tmp.path().join("out")),
            ..Default::default()
        };
        let report = new_run(tmp.path(), Options { fail_fast: true, ..Default::default() }).execute(&targets);
        assert_eq!(report.jobs.len(), 1);
        assert!(report.has_errors());

        let report = new_run(tmp.path(), Options::default()).execute(&targets);
        assert_eq!(report.jobs.len(), 2);
        assert_eq!(report.count(|s| *s == JobStatus::Rendered), 1);
        assert!(tmp.path().join("out/b").is_file());
    }

    #[test]
    fn overwrite_outdir_clears_stale_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("out")).unwrap();
        std::fs::write(tmp.path().join("out/stale.txt"), "old").unwrap();
        std::fs::write(tmp.path().join("a.j2"), "x").unwrap();

        let options = Options { overwrite_outdir: true, ..Default::default() };
        new_run(tmp.path(), options).execute(&Targets {
            sources: vec![PathBuf::from("a.j2")],
            outdir: Some(PathBuf::from("out")),
            ..Default::default()
        });
        assert!(!tmp.path().join("out/stale.txt").exists());
        assert!(tmp.path().join("out/a").is_file());
    }
}
