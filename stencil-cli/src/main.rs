//! Stencil: batch template preprocessor.
//!
//! # Usage
//!
//! ```text
//! stencil render <SOURCE>... [-O <dir> | -o <file>] [-V <file>]... [-D key=value]...
//! stencil vars [-V <file>]... [-D key=value]... [--format yaml|json]
//! ```

mod commands;
mod report;

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{render::RenderArgs, vars::VarsArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stencil",
    version,
    about = "Render Jinja-style templates with layered variables",
    long_about = None,
)]
struct Cli {
    /// More logging (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render template files and directories.
    Render(RenderArgs),

    /// Print the merged variables.
    Vars(VarsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Render(args) => args.run(),
        Commands::Vars(args) => args.run(),
    }
}
