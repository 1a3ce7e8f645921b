use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use extract::PipelineSettings;
use llm::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    /// Never read from or written to config files; comes from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent_llm_calls: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub page_attempts: usize,
    pub max_backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub work_dir: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: llm::gemini::DEFAULT_BASE_URL.to_string(),
            model: llm::gemini::DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_llm_calls: 4,
            request_timeout_secs: 120,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            page_attempts: 3,
            max_backoff_secs: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Load a JSON config file; missing sections keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency.max_concurrent_llm_calls == 0 {
            anyhow::bail!("concurrency.max_concurrent_llm_calls must be at least 1");
        }
        if self.concurrency.request_timeout_secs == 0 {
            anyhow::bail!("concurrency.request_timeout_secs must be at least 1");
        }
        if self.retry.max_retries == 0 || self.retry.page_attempts == 0 {
            anyhow::bail!("retry.max_retries and retry.page_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.max_backoff_secs,
            self.concurrency.request_timeout_secs,
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_concurrency: self.concurrency.max_concurrent_llm_calls,
            page_attempts: self.retry.page_attempts,
        }
    }

    pub fn fields_path(&self) -> PathBuf {
        self.output.work_dir.join("fields.json")
    }

    pub fn enrichment_path(&self) -> PathBuf {
        self.output.work_dir.join("enrichment.json")
    }

    pub fn answers_path(&self) -> PathBuf {
        self.output.work_dir.join("answers.json")
    }
}
