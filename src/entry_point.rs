use crate::error::{PipelineError, PipelineResult};
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;

fn scene_class_re() -> Result<&'static Regex> {
    static SCENE_CLASS_RE: OnceCell<Regex> = OnceCell::new();
    SCENE_CLASS_RE.get_or_try_init(|| {
        Regex::new(r"class\s+(\w+)\s*\(\s*\w*Scene\s*\):")
            .context("failed to compile scene class regex")
    })
}

/// Name of the first class deriving from a `*Scene` base, which is the file
/// name the renderer gives the clip.
pub fn extract_scene_name(source: &str) -> PipelineResult<String> {
    let re = scene_class_re().map_err(|_| PipelineError::EntryPointExtraction)?;
    re.captures(source)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(PipelineError::EntryPointExtraction)
}
