//! # stencil-output
//!
//! Job planning, output path mapping and the run-scoped writer.
//!
//! Call [`run`] to render every source of a [`Targets`] set and flush each
//! job's outputs before the next job renders. A `write` always replaces its
//! target and an `append` extends it. The [`OutputWriter`] keeps a
//! [`WriteLedger`] of the paths this run produced, so the overwrite policy
//! only guards files that existed before the run.

pub mod discover;
pub mod error;
pub mod ledger;
pub mod paths;
pub mod pipeline;
pub mod writer;

pub use error::OutputError;
pub use ledger::{LedgerEntry, WriteLedger, WriteOp};
pub use pipeline::{run, JobAction, JobOutcome, JobStatus, PlannedJob, Run, RunReport, Targets};
pub use writer::{FlushReport, OutputWriter, WriteOutcome};
