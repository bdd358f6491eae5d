use crate::config::Config;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

fn required_dirs(cfg: &Config) -> Vec<PathBuf> {
    let mut dirs = vec![cfg.media_dir.clone()];
    if let Some(scratch) = &cfg.scratch_dir {
        dirs.push(scratch.clone());
    }
    if let Some(parent) = cfg.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            dirs.push(parent.to_path_buf());
        }
    }
    dirs
}

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in required_dirs(cfg) {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            tracing::info!("Created directory: {}", dir.display());
        }
    }
    Ok(())
}

/// True when `program args...` runs and exits successfully.
pub async fn check_tool<S: AsRef<std::ffi::OsStr>>(program: S, args: &[&str]) -> bool {
    match tokio::process::Command::new(program).args(args).output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

pub async fn check_manim(cfg: &Config) -> bool {
    let Some((program, prefix)) = cfg.manim_command.split_first() else {
        return false;
    };
    let mut args: Vec<&str> = prefix.iter().map(String::as_str).collect();
    args.push("--version");
    check_tool(program, &args).await
}

pub async fn check_ffmpeg(cfg: &Config) -> bool {
    check_tool(&cfg.ffmpeg_bin, &["-version"]).await
}
