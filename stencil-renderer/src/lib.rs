//! # stencil-renderer
//!
//! Tera-based engine that renders one template job at a time against the
//! merged variables, collecting the secondary writes its directives request.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stencil_core::{Capabilities, Diagnostics, Mapping};
//! use stencil_renderer::{EngineOptions, RenderJob, TemplateEngine};
//!
//! fn render_one(vars: &Mapping) {
//!     let engine = match TemplateEngine::new(&EngineOptions::default(), &Capabilities::new()) {
//!         Ok(engine) => engine,
//!         Err(_) => return,
//!     };
//!     let job = RenderJob::new("greeting.txt.j2", "out/greeting.txt", "Hello {{ name }}");
//!     let mut diagnostics = Diagnostics::new();
//!     if let Ok(output) = engine.render(&job, vars, &mut diagnostics) {
//!         println!("{:?} + {} secondary write(s)", output.primary, output.requests.len());
//!     }
//! }
//! ```

pub mod capture;
mod conditions;
pub mod context;
pub mod directives;
pub mod engine;
pub mod error;
pub mod filters;
pub mod job;
pub mod testers;

pub use capture::{WriteMode, WriteRequest};
pub use context::JobContext;
pub use engine::{EngineOptions, TemplateEngine};
pub use error::RenderError;
pub use job::{JobState, RenderJob, RenderOutput};
