use anyhow::Result;
use async_trait::async_trait;

pub mod gemini;

/// Request/response boundary to a language model that answers in JSON.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String>;
}
