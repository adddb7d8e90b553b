// crates/server/src/llm.rs
//! LLM-backed implementation of the `RowProcessor` collaborator.
//!
//! One chat completion per row against an OpenAI-compatible endpoint: rewrite
//! the wholesale product name into a clean retail listing name, curate
//! long-tail search keywords, and suggest a category code. The model is asked
//! for strict JSON so the response parses into a `RowOutput` directly.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use rowforge_core::{RowError, RowOutput, RowProcessor, RowRecord};

use crate::config::LlmConfig;

const SYSTEM_PROMPT: &str = "You are a merchandiser for an online marketplace. \
Given a wholesale product name: \
(1) rewrite it as a clean, search-friendly retail product name — strip brand \
and manufacturer names, drop unit markers for single items, normalize counts \
of two or more to 'N개', remove stray punctuation; \
(2) pick 5-8 competitive long-tail search keywords, excluding trademarked \
brands and overly broad single-noun terms; \
(3) suggest a marketplace category code. \
Respond with strict JSON only: \
{\"refined_name\": string, \"keywords\": [string], \"category\": string}";

/// Shape the model is instructed to return.
#[derive(Debug, Deserialize)]
struct LlmRow {
    refined_name: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    category: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct LlmRowProcessor {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmRowProcessor {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl RowProcessor for LlmRowProcessor {
    async fn process_row(&self, row: &RowRecord) -> Result<RowOutput, RowError> {
        if self.config.api_key.is_empty() {
            return Err(RowError::Provider("LLM API key not configured".to_string()));
        }

        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("원본 상품명: \"{}\"", row.original_name)},
            ],
            "temperature": 0.3,
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RowError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RowError::Provider(format!(
                "provider returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RowError::Provider(format!("malformed provider response: {e}")))?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(RowError::EmptyResponse)?;

        let row_json = strip_code_fences(content);
        let llm_row: LlmRow = serde_json::from_str(row_json)
            .map_err(|e| RowError::Provider(format!("model did not return JSON: {e}")))?;

        Ok(RowOutput {
            refined_name: llm_row.refined_name.trim().to_string(),
            keywords: llm_row
                .keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
                .join(","),
            category: llm_row.category.trim().to_string(),
        })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

/// Models often wrap JSON in markdown fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let content = content.trim();
    let Some(inner) = content.strip_prefix("```") else {
        return content;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim_start().strip_suffix("```").unwrap_or(inner).trim()
}
