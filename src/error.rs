use thiserror::Error;

/// Central error type for the stem-studio crate.
///
/// Every failure aborts the current action; there is no internal retry.
#[derive(Debug, Error)]
pub enum StemError {
    /// Model weights could not be resolved, fetched, or loaded.
    #[error("model load failed: {reason}")]
    ModelLoad { reason: String },

    /// The separation model rejected its input or produced invalid output.
    #[error("inference failed: {reason}")]
    Inference { reason: String },

    /// The requested stem configuration needs a source the model did not
    /// declare.
    #[error("{config} separation requires a `{missing}` source")]
    Configuration { config: String, missing: String },

    /// The uploaded file could not be decoded as audio.
    #[error("could not decode `{path}`: {reason}")]
    Decode { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StemError {
    pub fn model_load(reason: impl Into<String>) -> Self {
        StemError::ModelLoad {
            reason: reason.into(),
        }
    }

    pub fn inference(reason: impl Into<String>) -> Self {
        StemError::Inference {
            reason: reason.into(),
        }
    }

    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StemError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StemError>;
