// crates/server/src/config.rs
//! Server configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default port for the server.
const DEFAULT_PORT: u16 = 47310;

/// Default per-row stall budget. A worker that makes no progress on a single
/// row for this long is treated as chunk-fatal and fails the job.
const DEFAULT_ROW_TIMEOUT_SECS: u64 = 120;

/// Connection settings for the OpenAI-compatible LLM endpoint used by the
/// row processor.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Runtime configuration for the rowforge server.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Directory the sheet source resolves file references against.
    pub upload_dir: PathBuf,
    pub row_timeout: Duration,
    pub llm: LlmConfig,
}

impl Config {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// - `ROWFORGE_PORT` / `PORT` — listen port
    /// - `ROWFORGE_UPLOAD_DIR` — upload directory (default `uploads`)
    /// - `ROWFORGE_ROW_TIMEOUT_SECS` — per-row stall budget
    /// - `ROWFORGE_LLM_BASE_URL`, `ROWFORGE_LLM_API_KEY`, `ROWFORGE_LLM_MODEL`
    pub fn from_env() -> Self {
        let port = std::env::var("ROWFORGE_PORT")
            .ok()
            .or_else(|| std::env::var("PORT").ok())
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let upload_dir = std::env::var("ROWFORGE_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let row_timeout = std::env::var("ROWFORGE_ROW_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_ROW_TIMEOUT_SECS));

        let llm = LlmConfig {
            base_url: std::env::var("ROWFORGE_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("ROWFORGE_LLM_API_KEY").unwrap_or_default(),
            model: std::env::var("ROWFORGE_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        Self {
            port,
            upload_dir,
            row_timeout,
            llm,
        }
    }
}
