//! User extension points: variable adapters, filters and tests.
//!
//! Hooks are looked up by name in a [`Capabilities`] registry. Library users
//! register Rust closures; the CLI registers [`CommandHook`]s, which run an
//! external program that reads JSON on stdin and answers JSON on stdout:
//!
//! | Hook          | stdin                              | stdout          |
//! |---------------|------------------------------------|-----------------|
//! | vars adapter  | the variable mapping               | a mapping       |
//! | filter        | `{"value": .., "args": {..}}`      | any value       |
//! | test          | `{"value": .., "args": [..]}`      | `true`/`false`  |

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::error::{ConfigError, HookError};
use crate::value::{Mapping, Value};

// ---------------------------------------------------------------------------
// Hook traits
// ---------------------------------------------------------------------------

/// Rewrites a variable mapping in place.
pub trait VarsAdapter: Send + Sync {
    fn adapt(&self, vars: &mut Mapping) -> Result<(), HookError>;
}

/// A template filter: `{{ value | name(arg=..) }}`.
pub trait FilterHook: Send + Sync {
    fn apply(&self, value: &Value, args: &Mapping) -> Result<Value, HookError>;
}

/// A template test: `{% if value is name(..) %}`.
pub trait TestHook: Send + Sync {
    fn test(&self, value: &Value, args: &[Value]) -> Result<bool, HookError>;
}

impl<F> VarsAdapter for F
where
    F: Fn(&mut Mapping) -> Result<(), HookError> + Send + Sync,
{
    fn adapt(&self, vars: &mut Mapping) -> Result<(), HookError> {
        self(vars)
    }
}

impl<F> FilterHook for F
where
    F: Fn(&Value, &Mapping) -> Result<Value, HookError> + Send + Sync,
{
    fn apply(&self, value: &Value, args: &Mapping) -> Result<Value, HookError> {
        self(value, args)
    }
}

impl<F> TestHook for F
where
    F: Fn(&Value, &[Value]) -> Result<bool, HookError> + Send + Sync,
{
    fn test(&self, value: &Value, args: &[Value]) -> Result<bool, HookError> {
        self(value, args)
    }
}

// ---------------------------------------------------------------------------
// CommandHook
// ---------------------------------------------------------------------------

/// An external program used as a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHook {
    program: String,
    args: Vec<String>,
}

impl CommandHook {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// Split a command line on whitespace: program followed by its arguments.
    pub fn parse(command: &str) -> Result<Self, ConfigError> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().ok_or_else(|| ConfigError::HookSpec(command.to_string()))?;
        Ok(Self { program, args: words.collect() })
    }

    /// Parse a `NAME=COMMAND` pair as given to `--filter` and `--test`.
    pub fn parse_named(spec: &str) -> Result<(String, Self), ConfigError> {
        let (name, command) = spec
            .split_once('=')
            .ok_or_else(|| ConfigError::HookSpec(spec.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::HookSpec(spec.to_string()));
        }
        Ok((name.to_string(), Self::parse(command)?))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the command with `input` as JSON on stdin and decode its stdout.
    pub fn call(&self, input: &serde_json::Value) -> Result<serde_json::Value, HookError> {
        let spawn_err =
            |source: std::io::Error| HookError::Spawn { program: self.program.clone(), source };
        let payload = serde_json::to_vec(input)
            .map_err(|source| HookError::Output { program: self.program.clone(), source })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // Feed stdin from its own thread while stdout is drained, or a hook
        // that streams its answer blocks on a full pipe.
        let feeder = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(&payload))
        });

        let output = child.wait_with_output().map_err(spawn_err)?;
        if let Some(feeder) = feeder {
            match feeder.join() {
                Ok(Ok(())) => {}
                // A hook may exit without reading its input.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(spawn_err(e)),
                Err(_) => return Err(spawn_err(std::io::Error::other("stdin writer panicked"))),
            }
        }
        if !output.status.success() {
            return Err(HookError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::debug!("hook '{}' answered {} bytes", self.program, output.stdout.len());
        serde_json::from_slice(&output.stdout)
            .map_err(|source| HookError::Output { program: self.program.clone(), source })
    }
}

impl VarsAdapter for CommandHook {
    fn adapt(&self, vars: &mut Mapping) -> Result<(), HookError> {
        let input = serde_json::Value::from(Value::Mapping(vars.clone()));
        match Value::from(self.call(&input)?) {
            Value::Mapping(map) => {
                *vars = map;
                Ok(())
            }
            other => Err(HookError::NotAMapping { found: other.type_name() }),
        }
    }
}

impl FilterHook for CommandHook {
    fn apply(&self, value: &Value, args: &Mapping) -> Result<Value, HookError> {
        let input = serde_json::json!({
            "value": serde_json::Value::from(value.clone()),
            "args": serde_json::Value::from(Value::Mapping(args.clone())),
        });
        Ok(Value::from(self.call(&input)?))
    }
}

impl TestHook for CommandHook {
    fn test(&self, value: &Value, args: &[Value]) -> Result<bool, HookError> {
        let input = serde_json::json!({
            "value": serde_json::Value::from(value.clone()),
            "args": serde_json::Value::from(Value::Sequence(args.to_vec())),
        });
        match self.call(&input)? {
            serde_json::Value::Bool(b) => Ok(b),
            other => Err(HookError::Message(format!(
                "test hook '{}' returned {other}, expected true or false",
                self.program
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Named registry of every user hook available to a run.
#[derive(Clone, Default)]
pub struct Capabilities {
    filters: BTreeMap<String, Arc<dyn FilterHook>>,
    tests: BTreeMap<String, Arc<dyn TestHook>>,
    file_adapter: Option<Arc<dyn VarsAdapter>>,
    global_adapter: Option<Arc<dyn VarsAdapter>>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter. A later registration under the same name wins.
    pub fn add_filter(&mut self, name: impl Into<String>, hook: impl FilterHook + 'static) {
        self.filters.insert(name.into(), Arc::new(hook));
    }

    pub fn add_test(&mut self, name: impl Into<String>, hook: impl TestHook + 'static) {
        self.tests.insert(name.into(), Arc::new(hook));
    }

    /// Adapter run on each variable file right after it is loaded.
    pub fn set_file_adapter(&mut self, hook: impl VarsAdapter + 'static) {
        self.file_adapter = Some(Arc::new(hook));
    }

    /// Adapter run once on the fully merged variables.
    pub fn set_global_adapter(&mut self, hook: impl VarsAdapter + 'static) {
        self.global_adapter = Some(Arc::new(hook));
    }

    pub fn filters(&self) -> impl Iterator<Item = (&str, &Arc<dyn FilterHook>)> {
        self.filters.iter().map(|(name, hook)| (name.as_str(), hook))
    }

    pub fn tests(&self) -> impl Iterator<Item = (&str, &Arc<dyn TestHook>)> {
        self.tests.iter().map(|(name, hook)| (name.as_str(), hook))
    }

    pub fn file_adapter(&self) -> Option<&dyn VarsAdapter> {
        self.file_adapter.as_deref()
    }

    pub fn global_adapter(&self) -> Option<&dyn VarsAdapter> {
        self.global_adapter.as_deref()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("tests", &self.tests.keys().collect::<Vec<_>>())
            .field("file_adapter", &self.file_adapter.is_some())
            .field("global_adapter", &self.global_adapter.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
