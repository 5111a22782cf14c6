//! Hyperparameters loaded from `params.json`.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{Error, Result};
use crate::network::NetConfig;

fn default_hidden_sizes() -> Vec<usize> {
    vec![256, 128, 64]
}

fn default_dropout_rate() -> f64 {
    0.5
}

fn default_labels_per_sample() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub batch_size: usize,
    pub num_classes: usize,
    pub learning_rate: f64,
    #[serde(default = "default_hidden_sizes")]
    pub hidden_sizes: Vec<usize>,
    #[serde(default = "default_dropout_rate")]
    pub dropout_rate: f64,
    /// Label columns per sample; the head emits one logit group per column.
    #[serde(default = "default_labels_per_sample")]
    pub labels_per_sample: usize,
    #[serde(default)]
    pub activation: Activation,
    /// Decided at runtime from the selected device, never read from disk.
    #[serde(skip)]
    pub cuda: bool,
    /// Fields this tool does not interpret (training schedule and the like).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Params {
    /// Load and validate `params.json`. A missing file is reported before any
    /// parsing happens.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MissingConfig(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let mut params: Params = serde_json::from_reader(reader)?;
        params.extra.remove("cuda");
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if self.num_classes == 0 {
            return Err(Error::InvalidConfig("num_classes must be positive".into()));
        }
        if self.labels_per_sample == 0 {
            return Err(Error::InvalidConfig("labels_per_sample must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(Error::InvalidConfig(format!(
                "dropout_rate must lie in [0, 1), got {}",
                self.dropout_rate
            )));
        }
        Ok(())
    }

    /// Width of the classifier head after transfer.
    pub fn head_outputs(&self) -> usize {
        self.labels_per_sample * self.num_classes
    }

    pub fn net_config(&self, input_size: usize) -> NetConfig {
        NetConfig {
            input_size,
            hidden_sizes: self.hidden_sizes.clone(),
            activation: self.activation,
            dropout_rate: self.dropout_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("params.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_is_a_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let err = Params::from_json(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("No json configuration file found at {}", path.display())
        );
    }

    #[test]
    fn defaults_fill_architecture_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"batch_size": 32, "num_classes": 10, "learning_rate": 1e-3, "num_epochs": 5}"#,
        );
        let params = Params::from_json(&path).unwrap();
        assert_eq!(params.batch_size, 32);
        assert_eq!(params.hidden_sizes, vec![256, 128, 64]);
        assert_eq!(params.head_outputs(), 20);
        assert_eq!(params.activation, Activation::ReLU);
        assert!(!params.cuda);
        assert_eq!(params.extra["num_epochs"], 5);
    }

    #[test]
    fn cuda_is_never_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"batch_size": 4, "num_classes": 3, "learning_rate": 0.1, "cuda": true}"#,
        );
        let params = Params::from_json(&path).unwrap();
        assert!(!params.cuda);
        assert!(!params.extra.contains_key("cuda"));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"batch_size": 0, "num_classes": 3, "learning_rate": 0.1}"#,
        );
        assert!(matches!(Params::from_json(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "{ batch_size: ");
        assert!(matches!(Params::from_json(&path), Err(Error::Json(_))));
    }
}
