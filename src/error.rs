use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("outline generation failed: {0}")]
    OutlineGeneration(String),

    #[error("scene code generation failed: {0}")]
    CodeGeneration(String),

    #[error("scene code fix failed: {0}")]
    CodeFix(String),

    #[error("render timed out after {secs}s")]
    RenderTimeout { secs: u64 },

    #[error("render process failed ({status}): {stderr}")]
    RenderProcess { status: String, stderr: String },

    #[error("no Scene subclass declaration found in scene source")]
    EntryPointExtraction,

    #[error("output artifact missing: {}", .0.display())]
    OutputArtifactMissing(PathBuf),

    #[error("video assembly failed: {0}")]
    Assembly(String),
}

impl PipelineError {
    pub fn outline(msg: impl Into<String>) -> Self {
        Self::OutlineGeneration(msg.into())
    }

    pub fn code_generation(msg: impl Into<String>) -> Self {
        Self::CodeGeneration(msg.into())
    }

    pub fn code_fix(msg: impl Into<String>) -> Self {
        Self::CodeFix(msg.into())
    }

    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    /// Chapter-scoped errors end in a skipped chapter; the rest end the run.
    pub fn is_chapter_scoped(&self) -> bool {
        !matches!(self, Self::OutlineGeneration(_) | Self::Assembly(_))
    }

    /// Text handed to the fixer. Process failures pass stderr through untouched.
    pub fn detail(&self) -> String {
        match self {
            Self::RenderProcess { stderr, .. } if !stderr.trim().is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}
