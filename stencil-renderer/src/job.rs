//! Render jobs and their lifecycle.

use std::path::{Path, PathBuf};

use crate::capture::WriteRequest;
use crate::error::RenderError;

/// One template to render: where it came from, where its output goes, and its
/// text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub template_text: String,
}

impl RenderJob {
    pub fn new(
        source_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        template_text: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: output_path.into(),
            template_text: template_text.into(),
        }
    }

    /// Read the template text from `source_path`.
    pub fn load(source_path: &Path, output_path: &Path) -> Result<Self, RenderError> {
        let text = std::fs::read_to_string(source_path)
            .map_err(|e| crate::error::io_err(source_path, e))?;
        Ok(Self::new(source_path, output_path, text))
    }

    /// Name the job's template is registered under.
    pub fn template_name(&self) -> String {
        self.source_path.to_string_lossy().replace('\\', "/")
    }
}

/// The result of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// Primary output text, or `None` when the first directive suppressed it.
    pub primary: Option<String>,
    /// Secondary writes, in document order.
    pub requests: Vec<WriteRequest>,
}

/// `Pending → Rendering → Rendered | Failed`.
#[derive(Debug)]
pub enum JobState {
    Pending,
    Rendering,
    Rendered(RenderOutput),
    Failed(RenderError),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Rendered(_) | JobState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Rendering => "rendering",
            JobState::Rendered(_) => "rendered",
            JobState::Failed(_) => "failed",
        }
    }

    /// `Pending → Rendering`. Any other state is returned unchanged.
    pub fn start(self) -> Self {
        match self {
            JobState::Pending => JobState::Rendering,
            other => other,
        }
    }

    /// Settle a `Rendering` job on the render result. Only a started job can
    /// finish; any other state is returned unchanged.
    pub fn finish(self, result: Result<RenderOutput, RenderError>) -> Self {
        match self {
            JobState::Rendering => result.into(),
            other => other,
        }
    }

    /// The render result of a finished job.
    pub fn into_result(self) -> Result<RenderOutput, RenderError> {
        match self {
            JobState::Rendered(output) => Ok(output),
            JobState::Failed(err) => Err(err),
            pending => Err(RenderError::Engine {
                message: format!("job is still {}", pending.label()),
            }),
        }
    }
}

impl From<Result<RenderOutput, RenderError>> for JobState {
    fn from(result: Result<RenderOutput, RenderError>) -> Self {
        match result {
            Ok(output) => JobState::Rendered(output),
            Err(err) => JobState::Failed(err),
        }
    }
}
