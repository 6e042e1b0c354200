use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The model could not be loaded. Fatal: checked once at startup.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model returned {got} predictions for a batch of {expected}")]
    OutputMismatch { expected: usize, got: usize },
}
