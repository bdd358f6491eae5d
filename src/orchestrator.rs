//! Per-chapter generate → render → fix → render state machine.
//!
//! The transition decision after a failed render is [`RetryPolicy::after_failure`],
//! a pure function; [`RetryOrchestrator`] performs the I/O for each state.

use crate::agents::{SceneCodeFixer, SceneCodeGenerator};
use crate::error::PipelineError;
use crate::outline::{ChapterDescription, SceneSource};
use crate::render::{ChapterRenderer, RenderOutcome};
use crate::{logi, logok, logw};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_render_attempts: u32,
    pub max_fix_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_render_attempts: 2,
            max_fix_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Fix,
    Rerender,
    Skip,
}

impl RetryPolicy {
    /// Decides what follows render attempt number `attempt` (1-based) failing.
    /// A fix is only offered after the first failure.
    pub fn after_failure(&self, attempt: u32, fixes_used: u32) -> NextStep {
        if attempt >= self.max_render_attempts {
            NextStep::Skip
        } else if attempt == 1 && fixes_used < self.max_fix_attempts {
            NextStep::Fix
        } else {
            NextStep::Rerender
        }
    }
}

#[derive(Debug)]
enum ChapterState {
    Generated(SceneSource),
    Rendering {
        source: SceneSource,
        attempt: u32,
    },
    RenderFailed {
        source: SceneSource,
        attempt: u32,
        error: PipelineError,
    },
    Fixing {
        source: SceneSource,
        attempt: u32,
        error: PipelineError,
    },
    Succeeded(PathBuf),
    Skipped(PipelineError),
}

#[derive(Debug, Clone)]
pub enum ChapterOutcome {
    Rendered(PathBuf),
    Skipped(PipelineError),
}

#[derive(Debug, Clone)]
pub struct ChapterResult {
    /// Zero-based position in the outline.
    pub index: usize,
    pub title: String,
    pub outcome: ChapterOutcome,
    pub render_attempts: u32,
    pub fix_attempts: u32,
}

impl ChapterResult {
    pub fn clip(&self) -> Option<&PathBuf> {
        match &self.outcome {
            ChapterOutcome::Rendered(path) => Some(path),
            ChapterOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&PipelineError> {
        match &self.outcome {
            ChapterOutcome::Rendered(_) => None,
            ChapterOutcome::Skipped(reason) => Some(reason),
        }
    }
}

pub struct RetryOrchestrator {
    generator: Arc<dyn SceneCodeGenerator>,
    fixer: Arc<dyn SceneCodeFixer>,
    renderer: Arc<dyn ChapterRenderer>,
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(
        generator: Arc<dyn SceneCodeGenerator>,
        fixer: Arc<dyn SceneCodeFixer>,
        renderer: Arc<dyn ChapterRenderer>,
    ) -> Self {
        Self {
            generator,
            fixer,
            renderer,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs every chapter in order. A skipped chapter never stops the others.
    pub async fn run_all(&self, chapters: &[ChapterDescription]) -> Vec<ChapterResult> {
        let mut results = Vec::with_capacity(chapters.len());
        for (index, chapter) in chapters.iter().enumerate() {
            results.push(self.run_chapter(index, chapter).await);
        }
        results
    }

    pub async fn run_chapter(&self, index: usize, chapter: &ChapterDescription) -> ChapterResult {
        let number = index + 1;
        let mut render_attempts = 0u32;
        let mut fix_attempts = 0u32;

        let mut state = match self.generator.generate(chapter).await {
            Ok(source) => ChapterState::Generated(source),
            Err(err) => {
                // Generation failure uses up the first attempt with nothing to fix.
                render_attempts = 1;
                ChapterState::Skipped(err)
            }
        };

        let outcome = loop {
            state = match state {
                ChapterState::Generated(source) => ChapterState::Rendering { source, attempt: 1 },
                ChapterState::Rendering { source, attempt } => {
                    render_attempts = attempt;
                    match self.renderer.render(&source).await {
                        RenderOutcome::Success(path) => ChapterState::Succeeded(path),
                        RenderOutcome::Failure(error) => {
                            logw(format!("Chapter {} attempt {} failed: {}", number, attempt, error));
                            ChapterState::RenderFailed { source, attempt, error }
                        }
                    }
                }
                ChapterState::RenderFailed { source, attempt, error } => {
                    match self.policy.after_failure(attempt, fix_attempts) {
                        NextStep::Fix => ChapterState::Fixing { source, attempt, error },
                        NextStep::Rerender => ChapterState::Rendering {
                            source,
                            attempt: attempt + 1,
                        },
                        NextStep::Skip => ChapterState::Skipped(error),
                    }
                }
                ChapterState::Fixing { source, attempt, error } => {
                    fix_attempts += 1;
                    match self.fixer.fix(&error.detail(), &source).await {
                        Ok(fixed) => ChapterState::Rendering {
                            source: fixed,
                            attempt: attempt + 1,
                        },
                        Err(err) => ChapterState::Skipped(err),
                    }
                }
                ChapterState::Succeeded(path) => break ChapterOutcome::Rendered(path),
                ChapterState::Skipped(reason) => break ChapterOutcome::Skipped(reason),
            };
        };

        match &outcome {
            ChapterOutcome::Rendered(path) => {
                logok(format!("Chapter {} rendered: {}", number, path.display()));
            }
            ChapterOutcome::Skipped(reason) => {
                logw(format!("Skipping chapter {}: {} ({})", number, chapter.title, reason));
            }
        }
        logi(format!(
            "Chapter {} finished after {} render attempt(s), {} fix(es)",
            number, render_attempts, fix_attempts
        ));

        ChapterResult {
            index,
            title: chapter.title.clone(),
            outcome,
            render_attempts,
            fix_attempts,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PipelineResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Emits the chapter title as source, or fails for titles listed in `fail_titles`.
    pub(crate) struct TitleGenerator {
        pub fail_titles: Vec<String>,
    }

    #[async_trait]
    impl SceneCodeGenerator for TitleGenerator {
        async fn generate(&self, chapter: &ChapterDescription) -> PipelineResult<SceneSource> {
            if self.fail_titles.contains(&chapter.title) {
                return Err(PipelineError::code_generation("backend down"));
            }
            Ok(SceneSource::new(chapter.title.clone()))
        }
    }

    /// Appends "-fixed" to the source and counts calls.
    #[derive(Default)]
    pub(crate) struct CountingFixer {
        pub calls: AtomicU32,
        pub fail: bool,
        pub seen_errors: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SceneCodeFixer for CountingFixer {
        async fn fix(&self, error_detail: &str, source: &SceneSource) -> PipelineResult<SceneSource> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_errors.lock().unwrap().push(error_detail.to_string());
            if self.fail {
                return Err(PipelineError::code_fix("fixer unavailable"));
            }
            Ok(SceneSource::new(format!("{}-fixed", source.as_str())))
        }
    }

    /// Plays back a queue of outcomes; once empty, fails every call.
    #[derive(Default)]
    pub(crate) struct ScriptedRenderer {
        pub outcomes: Mutex<VecDeque<RenderOutcome>>,
        pub calls: AtomicU32,
        pub sources: Mutex<Vec<String>>,
    }

    impl ScriptedRenderer {
        pub fn with(outcomes: Vec<RenderOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ChapterRenderer for ScriptedRenderer {
        async fn render(&self, source: &SceneSource) -> RenderOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sources.lock().unwrap().push(source.as_str().to_string());
            self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
                RenderOutcome::Failure(PipelineError::RenderProcess {
                    status: "exit status: 1".to_string(),
                    stderr: "Traceback: always failing".to_string(),
                })
            })
        }
    }

    /// Succeeds with `<source>.mp4` unless the source starts with a listed prefix.
    pub(crate) struct PrefixFailRenderer {
        pub failing_prefixes: Vec<String>,
    }

    #[async_trait]
    impl ChapterRenderer for PrefixFailRenderer {
        async fn render(&self, source: &SceneSource) -> RenderOutcome {
            if self
                .failing_prefixes
                .iter()
                .any(|p| source.as_str().starts_with(p.as_str()))
            {
                return RenderOutcome::Failure(PipelineError::RenderTimeout { secs: 60 });
            }
            RenderOutcome::Success(PathBuf::from(format!("{}.mp4", source.as_str())))
        }
    }

    fn chapter(title: &str) -> ChapterDescription {
        ChapterDescription {
            title: title.to_string(),
            explanation: format!("explain {}", title),
        }
    }

    fn orchestrator(
        generator: TitleGenerator,
        fixer: Arc<CountingFixer>,
        renderer: Arc<dyn ChapterRenderer>,
    ) -> RetryOrchestrator {
        RetryOrchestrator::new(Arc::new(generator), fixer, renderer)
    }

    #[test]
    fn policy_offers_one_fix_then_skips() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.after_failure(1, 0), NextStep::Fix);
        assert_eq!(policy.after_failure(2, 1), NextStep::Skip);
        assert_eq!(policy.after_failure(2, 0), NextStep::Skip);
    }

    #[test]
    fn policy_rerenders_when_fixes_are_used_up() {
        let policy = RetryPolicy {
            max_render_attempts: 3,
            max_fix_attempts: 1,
        };
        assert_eq!(policy.after_failure(1, 0), NextStep::Fix);
        assert_eq!(policy.after_failure(2, 1), NextStep::Rerender);
        assert_eq!(policy.after_failure(3, 1), NextStep::Skip);

        let no_fix = RetryPolicy {
            max_render_attempts: 2,
            max_fix_attempts: 0,
        };
        assert_eq!(no_fix.after_failure(1, 0), NextStep::Rerender);
    }

    #[tokio::test]
    async fn always_failing_renderer_makes_two_attempts_and_one_fix() {
        let fixer = Arc::new(CountingFixer::default());
        let renderer = Arc::new(ScriptedRenderer::default());
        let orch = orchestrator(
            TitleGenerator { fail_titles: vec![] },
            fixer.clone(),
            renderer.clone(),
        );

        let result = orch.run_chapter(0, &chapter("A")).await;
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fixer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.render_attempts, 2);
        assert_eq!(result.fix_attempts, 1);
        assert!(matches!(
            result.skip_reason(),
            Some(PipelineError::RenderProcess { .. })
        ));
        assert_eq!(
            fixer.seen_errors.lock().unwrap().as_slice(),
            ["Traceback: always failing".to_string()]
        );
        assert_eq!(
            renderer.sources.lock().unwrap().as_slice(),
            ["A".to_string(), "A-fixed".to_string()]
        );
    }

    #[tokio::test]
    async fn fail_once_then_succeed_uses_exactly_one_fix() {
        let fixer = Arc::new(CountingFixer::default());
        let renderer = Arc::new(ScriptedRenderer::with(vec![
            RenderOutcome::Failure(PipelineError::EntryPointExtraction),
            RenderOutcome::Success(PathBuf::from("media/A.mp4")),
        ]));
        let orch = orchestrator(
            TitleGenerator { fail_titles: vec![] },
            fixer.clone(),
            renderer.clone(),
        );

        let result = orch.run_chapter(0, &chapter("A")).await;
        assert_eq!(result.clip(), Some(&PathBuf::from("media/A.mp4")));
        assert_eq!(fixer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_render_success_needs_no_fix() {
        let fixer = Arc::new(CountingFixer::default());
        let renderer = Arc::new(ScriptedRenderer::with(vec![RenderOutcome::Success(
            PathBuf::from("A.mp4"),
        )]));
        let orch = orchestrator(TitleGenerator { fail_titles: vec![] }, fixer.clone(), renderer);

        let result = orch.run_chapter(0, &chapter("A")).await;
        assert!(result.clip().is_some());
        assert_eq!(result.render_attempts, 1);
        assert_eq!(fixer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wider_policy_rerenders_fixed_source_without_second_fix() {
        let fixer = Arc::new(CountingFixer::default());
        let renderer = Arc::new(ScriptedRenderer::default());
        let orch = orchestrator(
            TitleGenerator { fail_titles: vec![] },
            fixer.clone(),
            renderer.clone(),
        )
        .with_policy(RetryPolicy {
            max_render_attempts: 3,
            max_fix_attempts: 1,
        });

        let result = orch.run_chapter(0, &chapter("A")).await;
        assert_eq!(result.render_attempts, 3);
        assert_eq!(fixer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            renderer.sources.lock().unwrap().as_slice(),
            ["A".to_string(), "A-fixed".to_string(), "A-fixed".to_string()]
        );
    }

    #[tokio::test]
    async fn fixer_failure_skips_without_second_render() {
        let fixer = Arc::new(CountingFixer {
            fail: true,
            ..Default::default()
        });
        let renderer = Arc::new(ScriptedRenderer::default());
        let orch = orchestrator(
            TitleGenerator { fail_titles: vec![] },
            fixer.clone(),
            renderer.clone(),
        );

        let result = orch.run_chapter(0, &chapter("A")).await;
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.skip_reason(), Some(PipelineError::CodeFix(_))));
    }

    #[tokio::test]
    async fn generation_failure_skips_without_render_or_fix() {
        let fixer = Arc::new(CountingFixer::default());
        let renderer = Arc::new(ScriptedRenderer::default());
        let orch = orchestrator(
            TitleGenerator {
                fail_titles: vec!["A".to_string()],
            },
            fixer.clone(),
            renderer.clone(),
        );

        let result = orch.run_chapter(0, &chapter("A")).await;
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.render_attempts, 1);
        assert!(matches!(
            result.skip_reason(),
            Some(PipelineError::CodeGeneration(_))
        ));
    }

    #[tokio::test]
    async fn results_keep_outline_order_when_middle_chapter_fails() {
        let fixer = Arc::new(CountingFixer::default());
        let renderer = Arc::new(PrefixFailRenderer {
            failing_prefixes: vec!["B".to_string()],
        });
        let orch = orchestrator(TitleGenerator { fail_titles: vec![] }, fixer, renderer);

        let results = orch
            .run_all(&[chapter("A"), chapter("B"), chapter("C")])
            .await;
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
        assert_eq!(results[0].clip(), Some(&PathBuf::from("A.mp4")));
        assert!(results[1].clip().is_none());
        assert_eq!(results[2].clip(), Some(&PathBuf::from("C.mp4")));
        assert_eq!(results[1].index, 1);
    }
}
