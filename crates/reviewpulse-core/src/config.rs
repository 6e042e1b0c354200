//! Shared pipeline configuration.
//!
//! Every struct deserialises with `#[serde(default)]`, so a JSON config file
//! only needs the keys it overrides.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Default upstream: the GraphQL review listing the pipeline was built against.
pub const DEFAULT_BASE_URL: &str = "https://web-scraping.dev/api/graphql";

pub const DEFAULT_USER_AGENT: &str = concat!(
    "reviewpulse/",
    env!("CARGO_PKG_VERSION"),
    " (review sentiment research; +https://github.com/reviewpulse/reviewpulse)"
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub start_page: u32,
    /// Records requested per page, for sources that take a page size.
    pub page_size: u32,
    /// Minimum pause between consecutive requests.
    pub min_delay_ms: u64,
    pub max_retries: u32,
    /// Linear backoff step: attempt `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    /// Safety valve on the fetch-until-empty loop.
    pub max_pages: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            start_page: 1,
            page_size: 50,
            min_delay_ms: 500,
            max_retries: 3,
            backoff_ms: 1000,
            timeout_secs: 15,
            max_pages: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Keep only reviews dated in this calendar year.
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub batch_size: usize,
    /// Character budget applied to each body before it reaches the model.
    pub max_chars: usize,
    /// Token budget applied by the model's tokenizer.
    pub max_tokens: usize,
}

impl ClassifyConfig {
    pub const MAX_BATCH_SIZE: usize = 256;

    /// Batch size clamped to `1..=MAX_BATCH_SIZE`.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, Self::MAX_BATCH_SIZE)
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            max_chars: 512,
            max_tokens: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Classifications below this confidence are flagged for manual review.
    pub low_confidence_threshold: f32,
    pub top_k_words: usize,
    pub histogram_bins: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.70,
            top_k_words: 100,
            histogram_bins: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub normalize: NormalizeConfig,
    pub classify: ClassifyConfig,
    pub summary: SummaryConfig,
}

impl PipelineConfig {
    /// Parse a JSON config document and check value ranges.
    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(s).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let t = self.summary.low_confidence_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(CoreError::Config(format!(
                "low_confidence_threshold must be in [0, 1], got {t}"
            )));
        }
        if self.classify.max_chars == 0 {
            return Err(CoreError::Config("max_chars must be positive".into()));
        }
        if self.fetch.max_pages == 0 {
            return Err(CoreError::Config("max_pages must be positive".into()));
        }
        Ok(())
    }
}
