use crate::api::LanguageModel;
use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
const BODY_SNIPPET_CHARS: usize = 800;

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: cfg.gemini_api_key.clone(),
            model: cfg.gemini_model.clone(),
            base_url: GEMINI_BASE.to_string(),
            timeout: cfg.llm_timeout(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn body_snippet(raw: &str) -> String {
    raw.chars().take(BODY_SNIPPET_CHARS).collect()
}

/// Pulls the concatenated candidate text out of a generateContent response.
fn gemini_extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("Gemini error message: {}", msg));
        }
        if let Some(status) = err.get("status").and_then(|v| v.as_str()) {
            logw(format!("Gemini error status: {}", status));
        }
        return None;
    }

    let candidates = root.get("candidates")?.as_array()?;
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array());
        if let Some(parts) = parts {
            let text: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect();
            if !text.trim().is_empty() {
                return Some(text);
            }
        }
        if let Some(reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            logw(format!("Gemini candidate finished without text: {}", reason));
        }
    }

    None
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String> {
        let body = json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]},
            ],
            "generationConfig": {"responseMimeType": "application/json"},
        });

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("Gemini HTTP {}", status.as_u16()));
            if !raw.is_empty() {
                logw(format!("Gemini raw body: {}", body_snippet(&raw)));
            }
            anyhow::bail!("Gemini HTTP {}", status.as_u16());
        }

        match gemini_extract_output_text(&raw) {
            Some(text) => Ok(text),
            None => {
                logw("Gemini response parse failed.");
                if !raw.is_empty() {
                    logw(format!("Gemini raw body: {}", body_snippet(&raw)));
                }
                anyhow::bail!("Gemini response contained no text")
            }
        }
    }
}
