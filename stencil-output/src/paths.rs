//! Pure path mapping: source → primary output, and secondary target
//! resolution.

use std::path::{Component, Path, PathBuf};

/// Extension that marks a source as a template.
pub const TEMPLATE_EXTENSION: &str = "j2";

/// How a source's file name becomes its output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputNaming<'a> {
    /// Strip the `.j2` extension.
    Template,
    /// Insert a suffix before the first extension dot (force-rendered
    /// non-templates).
    Suffixed(&'a str),
    /// Keep the name (copied non-templates).
    Verbatim,
}

pub fn is_template(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION)
}

/// Output file name for `name`.
///
/// ```
/// use stencil_output::paths::{output_file_name, OutputNaming};
/// assert_eq!(output_file_name("foo.c.j2", OutputNaming::Template), "foo.c");
/// assert_eq!(output_file_name("a.tar.gz", OutputNaming::Suffixed("_x")), "a_x.tar.gz");
/// assert_eq!(output_file_name(".bashrc", OutputNaming::Suffixed("_x")), ".bashrc_x");
/// ```
pub fn output_file_name(name: &str, naming: OutputNaming<'_>) -> String {
    match naming {
        OutputNaming::Template => match name.strip_suffix(".j2") {
            Some(stem) if !stem.is_empty() => stem.to_string(),
            _ => name.to_string(),
        },
        OutputNaming::Suffixed(suffix) => match name.char_indices().skip(1).find(|(_, c)| *c == '.') {
            Some((dot, _)) => format!("{}{suffix}{}", &name[..dot], &name[dot..]),
            None => format!("{name}{suffix}"),
        },
        OutputNaming::Verbatim => name.to_string(),
    }
}

/// Primary output path for `source`.
///
/// The source's path relative to `source_root` is mirrored under
/// `output_root`; without an output root the output lands next to the
/// source. A source outside `source_root` keeps only its file name.
pub fn output_path_for(
    source_root: &Path,
    source: &Path,
    output_root: Option<&Path>,
    naming: OutputNaming<'_>,
) -> PathBuf {
    let rel = source
        .strip_prefix(source_root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| source.file_name().map(PathBuf::from).unwrap_or_default());
    let name = rel
        .file_name()
        .map(|n| output_file_name(&n.to_string_lossy(), naming))
        .unwrap_or_default();
    let rel_dir = rel.parent().unwrap_or(Path::new(""));

    let base = match output_root {
        Some(root) => root.join(rel_dir),
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    base.join(name)
}

/// Expand `$NAME` and `${NAME}` from the environment. Unknown variables are
/// left as written.
pub fn expand_env_vars(input: &str) -> String {
    expand_env_vars_with(input, |name| std::env::var(name).ok())
}

fn expand_env_vars_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve a directive target: expand `~` and environment variables, then
/// anchor relative paths at `base`.
pub fn resolve_target(target: &Path, base: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand_env_vars(&target.to_string_lossy()));
    let expanded = expand_home(&expanded);
    if expanded.is_absolute() {
        normalize(&expanded)
    } else {
        normalize(&base.join(expanded))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
