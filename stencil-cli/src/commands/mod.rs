pub mod render;
pub mod vars;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use stencil_core::config::resolve_options;
use stencil_core::context::{builtin_context, environment_variables};
use stencil_core::{
    merge, Capabilities, CommandHook, Diagnostic, DiagnosticKind, Diagnostics, IdentifierPolicy,
    Mapping, MergeRequest, Options, VarFile,
};

// ---------------------------------------------------------------------------
// Shared variable arguments
// ---------------------------------------------------------------------------

/// Variable sources and decoding options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct VarArgs {
    /// Variable file; the format comes from the extension or a `:format` suffix.
    #[arg(short = 'V', long = "varfile", value_name = "FILE")]
    pub varfiles: Vec<String>,

    /// Define a variable, dotted keys allowed (`-D server.port=8080`).
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    pub defines: Vec<String>,

    /// Load environment variables, optionally only those starting with PREFIX.
    #[arg(long, value_name = "PREFIX", num_args = 0..=1, require_equals = true, default_missing_value = "")]
    pub envvar: Option<String>,

    /// Command run on each variable file after it is loaded.
    #[arg(long, value_name = "CMD")]
    pub file_vars_adapter: Option<String>,

    /// Command run once on the merged variables.
    #[arg(long, value_name = "CMD")]
    pub global_vars_adapter: Option<String>,

    /// Keep keys that are not valid identifiers.
    #[arg(long)]
    pub no_check_identifier: bool,

    /// Replace invalid identifier characters with `_`.
    #[arg(long)]
    pub fix_identifiers: bool,

    #[arg(long, value_name = "CHAR")]
    pub csv_delimiter: Option<char>,

    #[arg(long, value_name = "CHAR")]
    pub csv_escape_char: Option<char>,

    /// Keep whitespace around CSV headers and values.
    #[arg(long)]
    pub csv_dont_strip: bool,

    /// Store XML attributes without the `@` prefix.
    #[arg(long)]
    pub xml_convert_attributes: bool,

    #[arg(long)]
    pub xml_remove_namespaces: bool,

    /// Config file to use instead of the default lookup.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl VarArgs {
    /// Options from the config file with the variable-related flags on top.
    pub fn options(&self, diagnostics: &mut Diagnostics) -> Result<Options> {
        let (mut options, used) =
            resolve_options(self.config.as_deref()).context("failed to load configuration")?;
        if let Some(path) = used {
            tracing::debug!("using config {}", path.display());
        }

        match (self.no_check_identifier, self.fix_identifiers) {
            (true, true) => {
                diagnostics.warn(
                    DiagnosticKind::Usage,
                    "--no-check-identifier and --fix-identifiers both given; fixing identifiers",
                );
                options.identifiers = IdentifierPolicy::Fix;
            }
            (true, false) => options.identifiers = IdentifierPolicy::Permissive,
            (false, true) => options.identifiers = IdentifierPolicy::Fix,
            (false, false) => {}
        }

        if self.csv_delimiter.is_some() {
            options.csv.delimiter = self.csv_delimiter;
        }
        if self.csv_escape_char.is_some() {
            options.csv.escape_char = self.csv_escape_char;
        }
        if self.csv_dont_strip {
            options.csv.strip = false;
        }
        options.xml.convert_attributes |= self.xml_convert_attributes;
        options.xml.remove_namespaces |= self.xml_remove_namespaces;
        Ok(options)
    }

    /// Register the adapters plus any named filters and tests.
    pub fn capabilities(&self, filters: &[String], tests: &[String]) -> Result<Capabilities> {
        let mut caps = Capabilities::new();
        if let Some(cmd) = &self.file_vars_adapter {
            caps.set_file_adapter(CommandHook::parse(cmd).context("invalid --file-vars-adapter")?);
        }
        if let Some(cmd) = &self.global_vars_adapter {
            caps.set_global_adapter(
                CommandHook::parse(cmd).context("invalid --global-vars-adapter")?,
            );
        }
        for spec in filters {
            let (name, hook) = CommandHook::parse_named(spec).context("invalid --filter")?;
            caps.add_filter(name, hook);
        }
        for spec in tests {
            let (name, hook) = CommandHook::parse_named(spec).context("invalid --test")?;
            caps.add_test(name, hook);
        }
        Ok(caps)
    }

    /// Merge every variable source into the root mapping.
    pub fn merged_vars(
        &self,
        options: &Options,
        capabilities: &Capabilities,
        output_dir: Option<&Path>,
        diagnostics: &mut Diagnostics,
    ) -> Mapping {
        let mut files = Vec::with_capacity(self.varfiles.len());
        for spec in &self.varfiles {
            match spec.parse::<VarFile>() {
                Ok(file) => files.push(file),
                Err(e) => diagnostics
                    .push(Diagnostic::error(DiagnosticKind::Parse, e.to_string()).with_path(spec)),
            }
        }

        let environment = self.envvar.as_deref().map(|prefix| {
            let prefix = (!prefix.is_empty()).then_some(prefix);
            environment_variables(std::env::vars(), prefix)
        });

        let request = MergeRequest {
            context: builtin_context(output_dir),
            environment,
            files,
            defines: self.defines.clone(),
            options: options.format_options(),
        };
        merge(request, capabilities, diagnostics).into_inner()
    }
}

/// Directory the command was started from.
pub fn invocation_dir() -> Result<PathBuf> {
    std::env::current_dir().context("could not determine the current directory")
}
