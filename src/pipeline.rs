use crate::agents::{
    CodeFixerAgent, OutlineAgent, OutlineGenerator, SceneCodeAgent, SceneCodeFixer,
    SceneCodeGenerator,
};
use crate::api::LanguageModel;
use crate::api::gemini::GeminiClient;
use crate::assemble::{AssemblyOutcome, FfmpegAssembler, VideoAssembler};
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestrator::{ChapterResult, RetryOrchestrator};
use crate::render::{ChapterRenderer, ManimRenderer};
use crate::{loge, logi, logok, logw};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a caller needs to show after one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub title: String,
    pub chapters: Vec<ChapterResult>,
    /// `None` means no chapter rendered, so no video was produced.
    pub final_video: Option<PathBuf>,
}

impl RunReport {
    pub fn produced(&self) -> bool {
        self.final_video.is_some()
    }

    /// Clip paths of rendered chapters, in outline order.
    pub fn rendered_clips(&self) -> Vec<PathBuf> {
        self.chapters
            .iter()
            .filter_map(|c| c.clip().cloned())
            .collect()
    }

    pub fn skipped(&self) -> Vec<(&str, &PipelineError)> {
        self.chapters
            .iter()
            .filter_map(|c| c.skip_reason().map(|r| (c.title.as_str(), r)))
            .collect()
    }
}

pub struct VideoPipeline {
    outline: Arc<dyn OutlineGenerator>,
    orchestrator: RetryOrchestrator,
    assembler: Arc<dyn VideoAssembler>,
}

impl VideoPipeline {
    pub fn new(
        outline: Arc<dyn OutlineGenerator>,
        generator: Arc<dyn SceneCodeGenerator>,
        fixer: Arc<dyn SceneCodeFixer>,
        renderer: Arc<dyn ChapterRenderer>,
        assembler: Arc<dyn VideoAssembler>,
    ) -> Self {
        Self {
            outline,
            orchestrator: RetryOrchestrator::new(generator, fixer, renderer),
            assembler,
        }
    }

    /// Gemini agents, manim renderer and ffmpeg assembler wired from `cfg`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let llm: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(cfg)?);
        Ok(Self::new(
            Arc::new(OutlineAgent::new(Arc::clone(&llm))),
            Arc::new(SceneCodeAgent::new(Arc::clone(&llm))),
            Arc::new(CodeFixerAgent::new(llm)),
            Arc::new(ManimRenderer::new(cfg)),
            Arc::new(FfmpegAssembler::new(cfg)),
        ))
    }

    pub async fn generate_video(&self, concept: &str) -> PipelineResult<RunReport> {
        if concept.trim().is_empty() {
            return Err(PipelineError::outline("concept is empty"));
        }

        let outline = self.outline.generate(concept).await.inspect_err(|e| {
            loge(format!("{}", e));
        })?;
        logok(format!(
            "Outline \"{}\" with {} chapter(s)",
            outline.title,
            outline.chapters.len()
        ));

        let chapters = self.orchestrator.run_all(&outline.chapters).await;
        let mut report = RunReport {
            title: outline.title,
            chapters,
            final_video: None,
        };

        let clips = report.rendered_clips();
        if clips.is_empty() {
            logw("No video chapters were successfully generated.");
            return Ok(report);
        }

        logi(format!("{} of {} chapter(s) rendered", clips.len(), report.chapters.len()));
        match self.assembler.assemble(&clips).await {
            Ok(AssemblyOutcome::Assembled(path)) => {
                logok(format!("Video generation complete: {}", path.display()));
                report.final_video = Some(path);
                Ok(report)
            }
            Ok(AssemblyOutcome::NoClips) => {
                logw("No clips to combine.");
                Ok(report)
            }
            Err(err) => {
                loge(format!("Video combining error: {}", err));
                Err(err)
            }
        }
    }
}
