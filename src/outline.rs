use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const MAX_CHAPTERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDescription {
    pub title: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOutline {
    pub title: String,
    pub chapters: Vec<ChapterDescription>,
}

impl VideoOutline {
    pub fn from_json(text: &str) -> Result<Self> {
        let outline: VideoOutline =
            serde_json::from_str(text).with_context(|| "Failed to parse video outline JSON")?;
        outline.validate()?;
        Ok(outline)
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            anyhow::bail!("outline title is empty");
        }
        if self.chapters.is_empty() {
            anyhow::bail!("outline has no chapters");
        }
        if self.chapters.len() > MAX_CHAPTERS {
            anyhow::bail!(
                "outline has {} chapters (at most {} allowed)",
                self.chapters.len(),
                MAX_CHAPTERS
            );
        }
        for (idx, chapter) in self.chapters.iter().enumerate() {
            if chapter.title.trim().is_empty() {
                anyhow::bail!("chapter {} has an empty title", idx + 1);
            }
        }
        Ok(())
    }
}

/// Scene code for one chapter. Replaced wholesale by a fix, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSource(String);

impl SceneSource {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct SceneCodeRoot {
    code: String,
}

impl SceneSource {
    pub fn from_json(text: &str) -> Result<Self> {
        let root: SceneCodeRoot =
            serde_json::from_str(text).with_context(|| "Failed to parse scene code JSON")?;
        if root.code.trim().is_empty() {
            anyhow::bail!("scene code is empty");
        }
        Ok(Self(root.code))
    }
}
