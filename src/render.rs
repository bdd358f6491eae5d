use crate::config::{Config, RenderQuality};
use crate::entry_point::extract_scene_name;
use crate::error::PipelineError;
use crate::outline::SceneSource;
use crate::{logi, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;

const STDERR_TAIL_CHARS: usize = 4000;

/// Result of a single render attempt.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Success(PathBuf),
    Failure(PipelineError),
}

#[async_trait]
pub trait ChapterRenderer: Send + Sync {
    async fn render(&self, source: &SceneSource) -> RenderOutcome;
}

pub struct ManimRenderer {
    command: Vec<String>,
    quality: RenderQuality,
    media_dir: PathBuf,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl ManimRenderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            command: cfg.manim_command.clone(),
            quality: cfg.render_quality,
            media_dir: cfg.media_dir.clone(),
            scratch_dir: cfg.scratch_dir(),
            timeout: cfg.render_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<media>/videos/<module>/<quality>/<Scene>.mp4`, where the module is the
    /// scene file's stem.
    pub fn artifact_path(&self, module_name: &str, scene_name: &str) -> PathBuf {
        self.media_dir
            .join("videos")
            .join(module_name)
            .join(self.quality.dir_name())
            .join(format!("{}.mp4", scene_name))
    }

    fn write_scene_file(&self, source: &SceneSource) -> Result<NamedTempFile> {
        std::fs::create_dir_all(&self.scratch_dir).with_context(|| {
            format!("Failed to create scratch dir {}", self.scratch_dir.display())
        })?;
        let mut file = tempfile::Builder::new()
            .prefix("scene_")
            .suffix(".py")
            .tempfile_in(&self.scratch_dir)
            .context("Failed to create temporary scene file")?;
        file.write_all(source.as_str().as_bytes())
            .context("Failed to write scene source")?;
        file.flush().context("Failed to flush scene source")?;
        Ok(file)
    }

    fn build_command(&self, program: &str, prefix: &[String], scene_file: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(prefix)
            .arg(scene_file)
            .arg(self.quality.flag())
            .arg("--disable_caching")
            .arg("--media_dir")
            .arg(&self.media_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn render_scoped(&self, source: &SceneSource) -> RenderOutcome {
        let scene_file = match self.write_scene_file(source) {
            Ok(file) => file,
            Err(err) => {
                return RenderOutcome::Failure(PipelineError::RenderProcess {
                    status: "not started".to_string(),
                    stderr: format!("{:#}", err),
                });
            }
        };

        let Some((program, prefix)) = self.command.split_first() else {
            return RenderOutcome::Failure(PipelineError::RenderProcess {
                status: "not started".to_string(),
                stderr: "no renderer command configured".to_string(),
            });
        };
        let child = match self.build_command(program, prefix, scene_file.path()).spawn() {
            Ok(child) => child,
            Err(err) => {
                return RenderOutcome::Failure(PipelineError::RenderProcess {
                    status: "not started".to_string(),
                    stderr: format!("failed to launch {}: {}", program, err),
                });
            }
        };

        // On timeout the child is dropped here, and kill_on_drop terminates it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return RenderOutcome::Failure(PipelineError::RenderProcess {
                    status: "wait failed".to_string(),
                    stderr: err.to_string(),
                });
            }
            Err(_) => {
                logw(format!("Render process timed out after {}s", self.timeout.as_secs()));
                return RenderOutcome::Failure(PipelineError::RenderTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return RenderOutcome::Failure(PipelineError::RenderProcess {
                status: output.status.to_string(),
                stderr: tail_chars(&stderr, STDERR_TAIL_CHARS),
            });
        }

        let scene_name = match extract_scene_name(source.as_str()) {
            Ok(name) => name,
            Err(err) => return RenderOutcome::Failure(err),
        };
        let module_name = scene_file
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let video = self.artifact_path(&module_name, &scene_name);

        if !tokio::fs::try_exists(&video).await.unwrap_or(false) {
            return RenderOutcome::Failure(PipelineError::OutputArtifactMissing(video));
        }
        RenderOutcome::Success(video)
    }
}

#[async_trait]
impl ChapterRenderer for ManimRenderer {
    async fn render(&self, source: &SceneSource) -> RenderOutcome {
        logi(format!("Rendering scene ({} bytes)", source.as_str().len()));
        // The temporary scene file lives inside render_scoped and is removed on every return.
        let outcome = self.render_scoped(source).await;
        if let RenderOutcome::Failure(err) = &outcome {
            logw(format!("Render failed: {}", err));
        }
        outcome
    }
}

/// Keeps the end of long stderr, where tracebacks put the actual error.
fn tail_chars(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}
