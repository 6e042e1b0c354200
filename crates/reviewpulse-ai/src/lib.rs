//! AI inference layer: batched sentiment classification over a pluggable model.

mod classifier;
mod error;
mod lexicon;
mod model;
#[cfg(feature = "onnx")]
mod onnx;

pub use classifier::{Classifier, truncate_chars};
pub use error::ClassifyError;
pub use lexicon::LexiconModel;
pub use model::{ModelHandle, Prediction, SentimentModel, SharedModel};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSentimentModel;
