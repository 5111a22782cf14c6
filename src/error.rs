//! Error type shared by every stage of the evaluation pipeline.
use std::path::PathBuf;

use crate::device::Device;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No json configuration file found at {}", .0.display())]
    MissingConfig(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File doesn't exist {}", .0.display())]
    CheckpointNotFound(PathBuf),

    #[error("checkpoint is missing parameter `{0}`")]
    MissingParameter(String),

    #[error("checkpoint has unexpected parameter `{0}`")]
    UnexpectedParameter(String),

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("label {label} is outside the {classes} known classes")]
    LabelOutOfRange { label: usize, classes: usize },

    #[error("model lives on {model} but batch lives on {batch}")]
    DeviceMismatch { model: Device, batch: Device },

    #[error("data iterator yielded no batches")]
    EmptyDataset,

    #[error("metric table is empty")]
    EmptyMetricTable,

    #[error("metric `{key}` is not finite ({value}) and cannot be stored as JSON")]
    NonFiniteMetric { key: String, value: f64 },

    #[error("invalid IDX file {}: {reason}", path.display())]
    InvalidIdx { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to install logger: {0}")]
    Logger(String),
}

impl Error {
    pub(crate) fn shape(what: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Error::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
