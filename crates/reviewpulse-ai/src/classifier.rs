//! Batched sentiment classification of normalised reviews.
//!
//! Bodies are truncated to a character budget, grouped into fixed-size
//! batches, and passed to the shared [`SentimentModel`]. Output has the same
//! length and order as the input.

use reviewpulse_core::{ClassifiedReview, ClassifyConfig, Review};
use tracing::{debug, info};

use crate::model::{ModelHandle, Prediction, SharedModel};
use crate::ClassifyError;

/// Sentiment classifier over a shared model.
pub struct Classifier {
    model: SharedModel,
    batch_size: usize,
    max_chars: usize,
}

impl Classifier {
    /// Build a classifier, loading the model now if it has not been loaded.
    ///
    /// This is the model-availability precondition: it fails fast with
    /// [`ClassifyError::ModelUnavailable`] and is not retried.
    pub fn new(handle: &ModelHandle, config: &ClassifyConfig) -> Result<Self, ClassifyError> {
        let model = handle.get()?;
        Ok(Self {
            model,
            batch_size: config.effective_batch_size(),
            max_chars: config.max_chars.max(1),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Classify a single review.
    pub fn classify_one(&self, review: Review) -> Result<ClassifiedReview, ClassifyError> {
        let mut out = self.classify(vec![review])?;
        out.pop().ok_or(ClassifyError::OutputMismatch {
            expected: 1,
            got: 0,
        })
    }

    /// Classify a sequence of reviews, preserving length and order.
    pub fn classify(&self, reviews: Vec<Review>) -> Result<Vec<ClassifiedReview>, ClassifyError> {
        if reviews.is_empty() {
            return Ok(vec![]);
        }

        let texts: Vec<&str> = reviews
            .iter()
            .map(|r| truncate_chars(r.body(), self.max_chars))
            .collect();

        let mut predictions: Vec<Prediction> = Vec::with_capacity(texts.len());
        {
            let mut model = self
                .model
                .lock()
                .map_err(|e| ClassifyError::Inference(format!("model mutex poisoned: {e}")))?;

            for (i, chunk) in texts.chunks(self.batch_size).enumerate() {
                let batch = model.predict_batch(chunk)?;
                if batch.len() != chunk.len() {
                    return Err(ClassifyError::OutputMismatch {
                        expected: chunk.len(),
                        got: batch.len(),
                    });
                }
                predictions.extend(batch);
                debug!(
                    batch = i,
                    done = predictions.len(),
                    total = texts.len(),
                    "classified batch"
                );
            }
        }

        let classified: Vec<ClassifiedReview> = reviews
            .into_iter()
            .zip(predictions)
            .map(|(review, p)| ClassifiedReview::new(review, p.label, p.confidence))
            .collect();

        info!(count = classified.len(), "classified reviews");
        Ok(classified)
    }
}

/// Cut `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
