//! The model contract and the process-wide handle that owns the loaded model.

use std::sync::{Arc, Mutex, OnceLock};

use reviewpulse_core::Label;
use tracing::info;

use crate::ClassifyError;

/// One model output: the winning label and its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f32,
}

/// A black-box sentiment model: `text -> (label, confidence)`, batched.
///
/// Implementations must return exactly one prediction per input text, in
/// input order, and a given text's prediction must not depend on which other
/// texts share its batch.
pub trait SentimentModel: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn predict_batch(&mut self, texts: &[&str]) -> Result<Vec<Prediction>, ClassifyError>;
}

/// A loaded model shared between classifiers.
pub type SharedModel = Arc<Mutex<Box<dyn SentimentModel>>>;

type Loader = Box<dyn FnOnce() -> Result<Box<dyn SentimentModel>, ClassifyError> + Send>;

/// Lazily-initialised, process-owned model.
///
/// The loader runs at most once, on the first [`get`](Self::get). A failed
/// load is remembered: every later `get` reports the same
/// [`ClassifyError::ModelUnavailable`] without retrying.
pub struct ModelHandle {
    cell: OnceLock<Result<SharedModel, String>>,
    loader: Mutex<Option<Loader>>,
}

impl ModelHandle {
    /// Defer loading until first use.
    pub fn lazy<F>(loader: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn SentimentModel>, ClassifyError> + Send + 'static,
    {
        Self {
            cell: OnceLock::new(),
            loader: Mutex::new(Some(Box::new(loader))),
        }
    }

    /// Wrap an already-constructed model.
    pub fn ready(model: impl SentimentModel + 'static) -> Self {
        let boxed: Box<dyn SentimentModel> = Box::new(model);
        let cell = OnceLock::new();
        let _ = cell.set(Ok(Arc::new(Mutex::new(boxed))));
        Self {
            cell,
            loader: Mutex::new(None),
        }
    }

    /// The loaded model, loading it now if this is the first call.
    pub fn get(&self) -> Result<SharedModel, ClassifyError> {
        let slot = self.cell.get_or_init(|| {
            let loader = self.loader.lock().ok().and_then(|mut l| l.take());
            let Some(load) = loader else {
                return Err("model loader already consumed".to_string());
            };
            match load() {
                Ok(model) => {
                    info!(model = model.name(), "sentiment model ready");
                    Ok(Arc::new(Mutex::new(model)))
                }
                Err(ClassifyError::ModelUnavailable(msg)) => Err(msg),
                Err(e) => Err(e.to_string()),
            }
        });
        slot.clone().map_err(ClassifyError::ModelUnavailable)
    }

    /// Whether a load has been attempted and succeeded.
    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }
}
