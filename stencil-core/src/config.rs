//! Rendering options and the user configuration file.
//!
//! # Lookup order
//!
//! ```text
//! --config PATH                      (explicit; must exist)
//! <config_dir>/stencil/stencil.json  (e.g. ~/.config/stencil/stencil.json)
//! ~/.stencil.json
//! ```
//!
//! The file holds a JSON object with any subset of the [`Options`] fields;
//! missing fields keep their defaults. Command-line flags are applied on top
//! by the CLI.
//!
//! Like the other path helpers, lookups come in two forms: `fn_at(home, ..)`
//! with explicit directories (used by tests) and `fn()` which asks `dirs`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::formats::{CsvOptions, FormatOptions, XmlOptions};
use crate::identifier::IdentifierPolicy;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What to do when a write targets a file that already existed before the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Overwrite silently.
    #[default]
    Default,
    /// Overwrite with a warning.
    Warn,
    /// Keep the existing file and report the write as skipped.
    Deny,
}

impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "warn" => Ok(Self::Warn),
            "deny" => Ok(Self::Deny),
            other => Err(format!("unknown overwrite policy '{other}'; expected: default, warn, deny")),
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverwritePolicy::Default => write!(f, "default"),
            OverwritePolicy::Warn => write!(f, "warn"),
            OverwritePolicy::Deny => write!(f, "deny"),
        }
    }
}

/// Base directory for relative secondary targets and relative includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingDirPolicy {
    /// Directory of the parent output file.
    #[default]
    Output,
    /// Directory of the source template.
    Source,
    /// Directory the command was invoked from.
    Invocation,
}

/// How sources without the `.j2` extension are treated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonTemplatePolicy {
    /// Ignore them.
    #[default]
    Skip,
    /// Render them anyway, inserting `suffix` into the output name.
    Render { suffix: String },
    /// Copy them to the output directory unchanged.
    Copy,
}

/// Suffix inserted into force-rendered non-template outputs.
pub const DEFAULT_RENDER_SUFFIX: &str = "_stencil";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Fail on undefined variables instead of rendering them empty.
    pub strict_undefined: bool,
    /// Prefix each primary output with the job context.
    pub debug_vars: bool,
    pub identifiers: IdentifierPolicy,
    pub working_dir: WorkingDirPolicy,
    /// Strip trailing whitespace from every written content.
    pub trim_whitespace: bool,
    pub csv: CsvOptions,
    pub xml: XmlOptions,
    pub non_template: NonTemplatePolicy,
    pub overwrite: OverwritePolicy,
    /// Remove the output directory before rendering.
    pub overwrite_outdir: bool,
    /// Stop at the first failed job.
    pub fail_fast: bool,
    /// Directories searched by `include`, `import` and `extends`.
    pub include_dirs: Vec<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict_undefined: true,
            debug_vars: false,
            identifiers: IdentifierPolicy::default(),
            working_dir: WorkingDirPolicy::default(),
            trim_whitespace: false,
            csv: CsvOptions::default(),
            xml: XmlOptions::default(),
            non_template: NonTemplatePolicy::default(),
            overwrite: OverwritePolicy::default(),
            overwrite_outdir: false,
            fail_fast: false,
            include_dirs: Vec::new(),
        }
    }
}

impl Options {
    /// The subset of options the format adapters read.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            identifiers: self.identifiers,
            csv: self.csv.clone(),
            xml: self.xml.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Candidate config files, most specific first.
pub fn config_candidates_at(home: &Path, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = config_dir {
        candidates.push(dir.join("stencil").join("stencil.json"));
    }
    candidates.push(home.join(".stencil.json"));
    candidates
}

/// First existing config file under `home` / `config_dir`.
pub fn find_config_at(home: &Path, config_dir: Option<&Path>) -> Option<PathBuf> {
    config_candidates_at(home, config_dir).into_iter().find(|p| p.is_file())
}

/// [`find_config_at`] using the platform directories.
pub fn find_config() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    find_config_at(&home, dirs::config_dir().as_deref())
}

/// Parse a config file into [`Options`].
pub fn load_config(path: &Path) -> Result<Options, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let options = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(options)
}

/// Options from `explicit`, else from the first config file found, else the
/// defaults. Returns the file that was used, if any.
pub fn resolve_options(explicit: Option<&Path>) -> Result<(Options, Option<PathBuf>), ConfigError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };
    match path {
        Some(path) => Ok((load_config(&path)?, Some(path))),
        None => Ok((Options::default(), None)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[test]
    fn defaults_are_strict_and_skip_non_templates() {
        let options = Options::default();
        assert!(options.strict_undefined);
        assert_eq!(options.identifiers, IdentifierPolicy::Strict);
        assert_eq!(options.non_template, NonTemplatePolicy::Skip);
        assert_eq!(options.overwrite, OverwritePolicy::Default);
        assert!(options.csv.strip);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("stencil.json");
        file.write_str(r#"{"overwrite": "warn", "csv": {"delimiter": ";"}}"#).unwrap();

        let options = load_config(file.path()).unwrap();
        assert_eq!(options.overwrite, OverwritePolicy::Warn);
        assert_eq!(options.csv.delimiter, Some(';'));
        assert!(options.csv.strip);
        assert!(options.strict_undefined);
    }

    #[test]
    fn non_template_render_policy_from_json() {
        let options: Options =
            serde_json::from_str(r#"{"non_template": {"render": {"suffix": "_x"}}}"#).unwrap();
        assert_eq!(options.non_template, NonTemplatePolicy::Render { suffix: "_x".into() });
    }

    #[test]
    fn invalid_config_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("stencil.json");
        file.write_str("{ not json").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn explicit_missing_config_is_io_error() {
        let result = resolve_options(Some(Path::new("/nope/stencil.json")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn config_dir_wins_over_home_dotfile() {
        let home = TempDir::new().unwrap();
        let config_dir = home.child(".config");
        home.child(".stencil.json").write_str("{}").unwrap();
        assert_eq!(
            find_config_at(home.path(), Some(config_dir.path())),
            Some(home.path().join(".stencil.json"))
        );

        config_dir.child("stencil/stencil.json").write_str("{}").unwrap();
        assert_eq!(
            find_config_at(home.path(), Some(config_dir.path())),
            Some(config_dir.path().join("stencil").join("stencil.json"))
        );
    }

    #[test]
    fn no_config_anywhere() {
        let home = TempDir::new().unwrap();
        assert_eq!(find_config_at(home.path(), None), None);
    }
}
