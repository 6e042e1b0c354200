//! Pipeline facade: fetch → normalise → classify → summarise.
//!
//! These three calls are everything a presentation layer needs; the
//! subcommands in `main.rs` are thin wrappers around them.

use std::path::{Path, PathBuf};

use reviewpulse_ai::{
    Classifier, ClassifyError, LexiconModel, ModelHandle, OnnxSentimentModel, SentimentModel,
};
use reviewpulse_core::{
    ClassifiedReview, ClassifyConfig, CoreError, DropCounts, MonthSummary, Normalizer,
    PipelineConfig, Review, SummaryConfig,
};
use reviewpulse_sync::{CancellationToken, FetchError, Fetcher, PageSource, StopReason};
use tracing::{info, warn};

/// Which sentiment model backs the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    /// DistilBERT SST-2 via ONNX Runtime.
    Onnx,
    /// Built-in word lexicon; needs no model files.
    Lexicon,
}

/// A handle that loads the chosen model on first use.
pub fn model_handle(kind: ModelKind, model_dir: PathBuf, max_tokens: usize) -> ModelHandle {
    match kind {
        ModelKind::Onnx => ModelHandle::lazy(move || {
            let model: Box<dyn SentimentModel> =
                Box::new(OnnxSentimentModel::load(&model_dir, max_tokens)?);
            Ok(model)
        }),
        ModelKind::Lexicon => ModelHandle::ready(LexiconModel::new()),
    }
}

/// Default model directory, relative to the working directory.
pub fn default_model_dir() -> PathBuf {
    Path::new("models").join("distilbert-sst2")
}

/// Normalised reviews plus what happened along the way.
#[derive(Debug)]
pub struct FetchReport {
    pub reviews: Vec<Review>,
    pub drops: DropCounts,
    pub raw_count: usize,
    pub pages: u32,
    pub stop: StopReason,
    /// Set when fetching ended on a failure; `reviews` is still usable.
    pub warning: Option<FetchError>,
}

/// Fetch every page from `source` and normalise the records.
pub async fn fetch_all<S: PageSource>(
    source: S,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> FetchReport {
    let fetcher = Fetcher::new(source, &config.fetch);
    let outcome = fetcher.fetch_all_with(cancel).await;
    if let Some(err) = &outcome.warning {
        warn!(
            error = %err,
            pages = outcome.pages_fetched,
            "fetch stopped early; continuing with partial data"
        );
    }

    let raw_count = outcome.records.len();
    let normalized = Normalizer::new(&config.normalize).normalize_all(outcome.records);
    info!(
        raw = raw_count,
        kept = normalized.reviews.len(),
        dropped = normalized.drops.total(),
        "normalised reviews"
    );

    FetchReport {
        reviews: normalized.reviews,
        drops: normalized.drops,
        raw_count,
        pages: outcome.pages_fetched,
        stop: outcome.stop,
        warning: outcome.warning,
    }
}

/// A classifier over the chosen model, loaded now. Fails if the model cannot load.
pub fn load_classifier(
    kind: ModelKind,
    model_dir: PathBuf,
    config: &ClassifyConfig,
) -> Result<Classifier, ClassifyError> {
    Classifier::new(&model_handle(kind, model_dir, config.max_tokens), config)
}

pub fn classify_all(
    classifier: &Classifier,
    reviews: Vec<Review>,
) -> Result<Vec<ClassifiedReview>, ClassifyError> {
    classifier.classify(reviews)
}

pub fn summarize(
    reviews: &[ClassifiedReview],
    month: u32,
    config: &SummaryConfig,
) -> Result<MonthSummary, CoreError> {
    reviewpulse_core::summarize_with(reviews, month, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reviewpulse_core::{Label, NormalizeConfig, RawRecord};
    use reviewpulse_sync::Page;

    /// Three pages of fixed records, then nothing.
    struct ThreePages;

    #[async_trait]
    impl PageSource for ThreePages {
        async fn fetch_page(&self, page: u32) -> Result<Page, FetchError> {
            let rows: &[(&str, &str)] = match page {
                1 => &[
                    ("Amazing product, highly recommend!", "2023-01-05T10:00:00"),
                    ("Terrible, arrived broken.", "Jan 9, 2023"),
                ],
                2 => &[("", "2023-01-10"), ("Great value", "not a date")],
                3 => &[("Lovely gift", "2022-12-24")],
                _ => &[],
            };
            Ok(Page {
                records: rows
                    .iter()
                    .map(|(body, date)| RawRecord {
                        body: body.to_string(),
                        date: Some(date.to_string()),
                        page,
                        ..Default::default()
                    })
                    .collect(),
                has_more: !rows.is_empty(),
            })
        }
    }

    fn config(year: Option<i32>) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.fetch.min_delay_ms = 0;
        config.fetch.backoff_ms = 0;
        config.normalize = NormalizeConfig { year };
        config
    }

    #[tokio::test]
    async fn fetch_normalises_and_counts_drops() {
        let report = fetch_all(ThreePages, &config(None), &CancellationToken::new()).await;
        assert_eq!(report.pages, 3);
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.raw_count, 5);
        assert_eq!(report.reviews.len(), 3);
        assert_eq!(report.drops.empty_body, 1);
        assert_eq!(report.drops.unparseable_date, 1);
    }

    #[tokio::test]
    async fn year_filter_drops_other_years() {
        let report = fetch_all(ThreePages, &config(Some(2023)), &CancellationToken::new()).await;
        assert_eq!(report.reviews.len(), 2);
        assert_eq!(report.drops.out_of_range, 1);
        assert!(report.reviews.iter().all(|r| r.year() == 2023));
    }

    #[tokio::test]
    async fn end_to_end_with_lexicon_model() {
        let cfg = config(Some(2023));
        let report = fetch_all(ThreePages, &cfg, &CancellationToken::new()).await;

        let classifier =
            load_classifier(ModelKind::Lexicon, default_model_dir(), &cfg.classify).unwrap();
        let classified = classify_all(&classifier, report.reviews).unwrap();
        assert_eq!(classified.len(), 2);
        assert_eq!(classified[0].label(), Label::Positive);
        assert_eq!(classified[1].label(), Label::Negative);

        let summary = summarize(&classified, 1, &cfg.summary).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.positive, 1);
        assert_eq!(summary.negative, 1);
        let mean = (classified[0].confidence() + classified[1].confidence()) / 2.0;
        assert!((summary.mean_confidence - mean).abs() < 1e-6);

        assert_eq!(summary, summarize(&classified, 1, &cfg.summary).unwrap());
    }

    #[test]
    fn missing_onnx_model_is_unavailable() {
        let result = load_classifier(
            ModelKind::Onnx,
            PathBuf::from("/nonexistent/model"),
            &ClassifyConfig::default(),
        );
        assert!(matches!(result, Err(ClassifyError::ModelUnavailable(_))));
    }

    #[test]
    fn onnx_handle_defers_loading() {
        let handle = model_handle(ModelKind::Onnx, PathBuf::from("/nonexistent/model"), 512);
        assert!(matches!(handle.get(), Err(ClassifyError::ModelUnavailable(_))));
    }
}
