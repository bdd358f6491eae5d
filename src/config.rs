use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl RenderQuality {
    pub fn flag(self) -> &'static str {
        match self {
            Self::Low => "-ql",
            Self::Medium => "-qm",
            Self::High => "-qh",
        }
    }

    /// Directory name the renderer uses for this quality tier.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Low => "480p15",
            Self::Medium => "720p30",
            Self::High => "1080p60",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_model")]
    pub gemini_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_manim_command")]
    pub manim_command: Vec<String>,
    #[serde(default)]
    pub render_quality: RenderQuality,
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: PathBuf,
    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: PathBuf,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_manim_command() -> Vec<String> {
    vec!["manim".to_string()]
}

fn default_render_timeout_secs() -> u64 {
    60
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_ffmpeg_bin() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_bin() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("final_video.mp4")
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let env_key = std::env::var(API_KEY_ENV).ok();
        Self::from_json(&content, env_key)
    }

    /// Parses and validates; `env_key` fills in a missing `gemini_api_key`.
    pub fn from_json(content: &str, env_key: Option<String>) -> Result<Self> {
        let mut config: Config = serde_json::from_str(content).context("config.json is not valid")?;

        if config.gemini_api_key.trim().is_empty() {
            if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
                config.gemini_api_key = key;
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gemini_api_key.trim().is_empty() {
            anyhow::bail!("config.json: gemini_api_key missing (or set {})", API_KEY_ENV);
        }
        if self.manim_command.is_empty() || self.manim_command[0].trim().is_empty() {
            anyhow::bail!("config.json: manim_command must name a program");
        }
        if self.render_timeout_secs == 0 {
            anyhow::bail!("config.json: render_timeout_secs must be > 0");
        }
        if self.llm_timeout_secs == 0 {
            anyhow::bail!("config.json: llm_timeout_secs must be > 0");
        }
        Ok(())
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
