//! stencil core library: variable values, loading and merging.
//!
//! - [`value`] / [`coerce`]: the typed value model and string coercion
//! - [`identifier`]: key validation and repair
//! - [`formats`]: variable file decoders
//! - [`merge`]: precedence-ordered deep merge of every variable source
//! - [`context`]: built-in and environment variables
//! - [`hooks`]: user adapters, filters and tests
//! - [`config`]: rendering options and the config file
//! - [`diagnostics`]: the run-wide warning/error list

pub mod coerce;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod formats;
pub mod hooks;
pub mod identifier;
pub mod merge;
pub mod value;

pub use coerce::coerce;
pub use config::{NonTemplatePolicy, Options, OverwritePolicy, WorkingDirPolicy};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{ConfigError, DefineError, FormatError, HookError};
pub use formats::{Format, FormatOptions, VarFile};
pub use hooks::{Capabilities, CommandHook, FilterHook, TestHook, VarsAdapter};
pub use identifier::IdentifierPolicy;
pub use merge::{merge, MergeRequest, MergeResult, VariableSource};
pub use value::{Mapping, Value};
