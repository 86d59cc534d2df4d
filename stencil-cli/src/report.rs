//! Human-facing run summary.

use colored::Colorize;

use stencil_core::{Diagnostics, Severity};
use stencil_output::{JobStatus, RunReport};

pub fn print_jobs(report: &RunReport) {
    for job in &report.jobs {
        let source = job.source.display();
        match &job.status {
            JobStatus::Rendered => {
                println!("  {}  {source} -> {}", "✎".green(), job.output.display())
            }
            JobStatus::Copied => println!("  {}  {source} -> {}", "⧉".green(), job.output.display()),
            JobStatus::Skipped => println!("  {}  {source} (not a template)", "·".dimmed()),
            JobStatus::Failed(_) => println!("  {}  {source}", "✗".red()),
        }
    }

    let rendered = report.count(|s| matches!(s, JobStatus::Rendered | JobStatus::Copied));
    let failed = report.count(|s| matches!(s, JobStatus::Failed(_)));
    let summary = format!(
        "{rendered} of {} source(s) processed, {} file(s) written, {} kept",
        report.jobs.len(),
        report.flush.written.len(),
        report.flush.skipped.len(),
    );
    if failed == 0 {
        println!("{} {summary}", "✓".green().bold());
    } else {
        println!("{} {summary}, {failed} failed", "✗".red().bold());
    }
}

/// Every warning and error of the run, on stderr.
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    for diagnostic in diagnostics.iter() {
        let label = match diagnostic.severity {
            Severity::Warning => format!("warning[{}]", diagnostic.kind).yellow().bold(),
            Severity::Error => format!("error[{}]", diagnostic.kind).red().bold(),
        };
        eprintln!("{label}: {diagnostic}");
    }

    let errors = diagnostics.errors().count();
    let warnings = diagnostics.warnings().count();
    eprintln!("{errors} error(s), {warnings} warning(s)");
}
