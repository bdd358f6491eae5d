use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyOutcome {
    Assembled(PathBuf),
    NoClips,
}

#[async_trait]
pub trait VideoAssembler: Send + Sync {
    /// Concatenates `clips` in the given order.
    async fn assemble(&self, clips: &[PathBuf]) -> PipelineResult<AssemblyOutcome>;
}

pub struct FfmpegAssembler {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    output: PathBuf,
}

impl FfmpegAssembler {
    pub fn new(cfg: &Config) -> Self {
        Self {
            ffmpeg: cfg.ffmpeg_bin.clone(),
            ffprobe: cfg.ffprobe_bin.clone(),
            output: cfg.output_path.clone(),
        }
    }

    async fn assemble_existing(&self, clips: &[PathBuf]) -> Result<()> {
        for clip in clips {
            let dur = ffprobe_duration_seconds(&self.ffprobe, clip)
                .await
                .with_context(|| format!("Failed to open clip {}", clip.display()))?;
            logi(format!("Clip {} ({:.2}s)", clip.display(), dur));
        }

        // The list file is removed when `list` drops, whatever ffmpeg did.
        let list = write_concat_list(clips)?;

        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create dir {}", parent.display()))?;
            }
        }

        let args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list.path().display().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            self.output.display().to_string(),
        ];
        run_cmd(&self.ffmpeg, &args).await?;

        if !tokio::fs::try_exists(&self.output).await.unwrap_or(false) {
            anyhow::bail!("ffmpeg finished but {} was not written", self.output.display());
        }
        Ok(())
    }
}

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    async fn assemble(&self, clips: &[PathBuf]) -> PipelineResult<AssemblyOutcome> {
        let mut existing = Vec::with_capacity(clips.len());
        for clip in clips {
            if tokio::fs::try_exists(clip).await.unwrap_or(false) {
                existing.push(clip.clone());
            } else {
                logw(format!("Clip vanished before assembly: {}", clip.display()));
            }
        }

        if existing.is_empty() {
            logw("No clips to combine.");
            return Ok(AssemblyOutcome::NoClips);
        }

        logi(format!(
            "Concatenating {} clip(s) -> {}",
            existing.len(),
            self.output.display()
        ));
        self.assemble_existing(&existing)
            .await
            .map_err(|e| PipelineError::assembly(format!("{:#}", e)))?;
        logok(format!("Concat OK: {}", self.output.display()));
        Ok(AssemblyOutcome::Assembled(self.output.clone()))
    }
}

async fn run_cmd(program: &Path, args: &[String]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Command execution failed: {}", program.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "{} failed ({}): {}",
            program.display(),
            output.status,
            stderr.trim()
        );
    }
    Ok(())
}

pub async fn ffprobe_duration_seconds(ffprobe: &Path, path: &Path) -> Result<f64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.0 {
        return Err(anyhow::anyhow!("Invalid duration"));
    }
    Ok(duration)
}

/// One `file '<path>'` line per clip, single quotes escaped for the concat demuxer.
fn concat_list_text(clips: &[PathBuf]) -> String {
    let mut out = String::new();
    for clip in clips {
        let absolute = std::path::absolute(clip).unwrap_or_else(|_| clip.clone());
        let escaped = absolute.display().to_string().replace('\'', "'\\''");
        out.push_str(&format!("file '{}'\n", escaped));
    }
    out
}

fn write_concat_list(clips: &[PathBuf]) -> Result<NamedTempFile> {
    let mut list = tempfile::Builder::new()
        .prefix("concat_")
        .suffix(".txt")
        .tempfile()
        .context("Failed to create concat list")?;
    list.write_all(concat_list_text(clips).as_bytes())
        .context("Failed to write concat list")?;
    list.flush().context("Failed to flush concat list")?;
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler(dir: &Path, ffmpeg: &str, ffprobe: &str) -> FfmpegAssembler {
        let cfg_json = serde_json::json!({
            "gemini_api_key": "k",
            "ffmpeg_bin": ffmpeg,
            "ffprobe_bin": ffprobe,
            "output_path": dir.join("out").join("final.mp4"),
        });
        FfmpegAssembler::new(&Config::from_json(&cfg_json.to_string(), None).unwrap())
    }

    #[tokio::test]
    async fn empty_input_is_no_clips() {
        let dir = tempfile::tempdir().unwrap();
        let asm = assembler(dir.path(), "/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert_eq!(asm.assemble(&[]).await.unwrap(), AssemblyOutcome::NoClips);
    }

    #[tokio::test]
    async fn vanished_clips_are_filtered_to_no_clips() {
        let dir = tempfile::tempdir().unwrap();
        let asm = assembler(dir.path(), "/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let clips = vec![dir.path().join("gone_a.mp4"), dir.path().join("gone_b.mp4")];
        assert_eq!(asm.assemble(&clips).await.unwrap(), AssemblyOutcome::NoClips);
    }

    #[tokio::test]
    async fn unopenable_clip_is_an_assembly_error() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("a.mp4");
        std::fs::write(&clip, b"not really a video").unwrap();
        let asm = assembler(dir.path(), "/nonexistent/ffmpeg", "/nonexistent/ffprobe");

        let err = asm.assemble(&[clip]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Assembly(_)));
        assert!(!err.is_chapter_scoped());
    }

    #[test]
    fn concat_list_keeps_order_and_escapes_quotes() {
        let clips = vec![PathBuf::from("/v/a.mp4"), PathBuf::from("/v/it's.mp4")];
        let text = concat_list_text(&clips);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["file '/v/a.mp4'", "file '/v/it'\\''s.mp4'"]);
    }

    #[test]
    fn concat_list_file_is_removed_on_drop() {
        let list = write_concat_list(&[PathBuf::from("/v/a.mp4")]).unwrap();
        let path = list.path().to_path_buf();
        assert!(path.exists());
        drop(list);
        assert!(!path.exists());
    }
}
