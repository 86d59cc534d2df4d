//! `stencil vars`: print the merged variables without rendering anything.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use stencil_core::{Diagnostics, Value};

use super::{invocation_dir, VarArgs};
use crate::report;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum VarsFormat {
    #[default]
    Yaml,
    Json,
}

/// Arguments for `stencil vars`.
#[derive(Args, Debug)]
pub struct VarsArgs {
    #[command(flatten)]
    pub vars: VarArgs,

    /// Output directory reported as `__output_directory__`.
    #[arg(short = 'O', long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = VarsFormat::Yaml)]
    pub format: VarsFormat,
}

impl VarsArgs {
    pub fn run(self) -> Result<ExitCode> {
        let cwd = invocation_dir()?;
        let mut diagnostics = Diagnostics::new();
        let options = self.vars.options(&mut diagnostics)?;
        let capabilities = self.vars.capabilities(&[], &[])?;
        let output_dir = self.outdir.as_ref().map(|dir| cwd.join(dir));
        let vars = Value::Mapping(self.vars.merged_vars(
            &options,
            &capabilities,
            output_dir.as_deref(),
            &mut diagnostics,
        ));

        let text = match self.format {
            VarsFormat::Yaml => serde_yaml::to_string(&vars).context("failed to serialize variables")?,
            VarsFormat::Json => {
                serde_json::to_string_pretty(&vars).context("failed to serialize variables")?
            }
        };
        println!("{}", text.trim_end());

        report::print_diagnostics(&diagnostics);
        Ok(if diagnostics.has_errors() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
    }
}
