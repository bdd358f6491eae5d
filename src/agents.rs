//! Thin language-model wrappers for the three requests the pipeline makes.
//!
//! Each agent has a fixed system prompt and a typed response schema that is
//! checked before anything downstream sees it.

use crate::api::LanguageModel;
use crate::error::{PipelineError, PipelineResult};
use crate::logi;
use crate::outline::{ChapterDescription, SceneSource, VideoOutline};
use async_trait::async_trait;
use std::sync::Arc;

const OUTLINE_SYSTEM_PROMPT: &str = "\
You are a video script writer. Write a title and up to 3 chapters with detailed visual instructions for Manim.
Include LaTeX, animation guidance, transitions, and layout hints. Do not include code.
Return STRICT JSON with this shape ONLY:
{\"title\":\"...\",\"chapters\":[{\"title\":\"...\",\"explanation\":\"...\"}]}";

const SCENE_SYSTEM_PROMPT: &str = "\
You are a Manim code generator. Create runnable Manim code for one chapter.
Include imports, one scene, valid Python comments only, and follow the explanation closely.
Return STRICT JSON with this shape ONLY: {\"code\":\"...\"}";

const FIXER_SYSTEM_PROMPT: &str = "\
You are a Manim code debugger. Fix code based on the provided error.
Ensure imports, correct scene, valid Python comments, and runnable output.
Return the complete corrected file as STRICT JSON with this shape ONLY: {\"code\":\"...\"}";

#[async_trait]
pub trait OutlineGenerator: Send + Sync {
    async fn generate(&self, concept: &str) -> PipelineResult<VideoOutline>;
}

#[async_trait]
pub trait SceneCodeGenerator: Send + Sync {
    async fn generate(&self, chapter: &ChapterDescription) -> PipelineResult<SceneSource>;
}

#[async_trait]
pub trait SceneCodeFixer: Send + Sync {
    async fn fix(&self, error_detail: &str, source: &SceneSource) -> PipelineResult<SceneSource>;
}

pub struct OutlineAgent {
    llm: Arc<dyn LanguageModel>,
}

impl OutlineAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl OutlineGenerator for OutlineAgent {
    async fn generate(&self, concept: &str) -> PipelineResult<VideoOutline> {
        let concept = concept.trim();
        if concept.is_empty() {
            return Err(PipelineError::outline("concept is empty"));
        }

        logi(format!("Generating outline for: {}", concept));
        let text = self
            .llm
            .complete_json(OUTLINE_SYSTEM_PROMPT, concept)
            .await
            .map_err(|e| PipelineError::outline(format!("{:#}", e)))?;
        VideoOutline::from_json(&text).map_err(|e| PipelineError::outline(format!("{:#}", e)))
    }
}

pub struct SceneCodeAgent {
    llm: Arc<dyn LanguageModel>,
}

impl SceneCodeAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

fn scene_prompt(chapter: &ChapterDescription) -> String {
    format!("title: {}. Explanation: {}", chapter.title, chapter.explanation)
}

fn fix_prompt(error_detail: &str, source: &SceneSource) -> String {
    format!("Error: {}\nCurrent Code:\n{}", error_detail, source.as_str())
}

#[async_trait]
impl SceneCodeGenerator for SceneCodeAgent {
    async fn generate(&self, chapter: &ChapterDescription) -> PipelineResult<SceneSource> {
        logi(format!("Generating Manim code for: {}", chapter.title));
        let text = self
            .llm
            .complete_json(SCENE_SYSTEM_PROMPT, &scene_prompt(chapter))
            .await
            .map_err(|e| PipelineError::code_generation(format!("{:#}", e)))?;
        SceneSource::from_json(&text).map_err(|e| PipelineError::code_generation(format!("{:#}", e)))
    }
}

pub struct CodeFixerAgent {
    llm: Arc<dyn LanguageModel>,
}

impl CodeFixerAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SceneCodeFixer for CodeFixerAgent {
    async fn fix(&self, error_detail: &str, source: &SceneSource) -> PipelineResult<SceneSource> {
        logi("Fixing Manim code after error...");
        let text = self
            .llm
            .complete_json(FIXER_SYSTEM_PROMPT, &fix_prompt(error_detail, source))
            .await
            .map_err(|e| PipelineError::code_fix(format!("{:#}", e)))?;
        SceneSource::from_json(&text).map_err(|e| PipelineError::code_fix(format!("{:#}", e)))
    }
}
