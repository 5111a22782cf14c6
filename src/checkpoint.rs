//! Checkpoints: gzipped JSON holding a model state dict and an optional
//! optimizer slot.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::Model;

/// One named parameter, stored flat in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl ParamTensor {
    /// Check that `data` fills `shape`.
    pub fn validate(&self, name: &str) -> Result<()> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(Error::shape(name, &[expected], &[self.data.len()]));
        }
        Ok(())
    }
}

/// Parameter name to value, e.g. `features.0.weight`.
pub type StateDict = BTreeMap<String, ParamTensor>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub epoch: Option<usize>,
    pub state_dict: StateDict,
    /// Optimizer state written by training runs. Opaque here.
    #[serde(default)]
    pub optim_dict: Option<serde_json::Value>,
}

impl Checkpoint {
    pub fn from_model<M: Model + ?Sized>(model: &M, epoch: Option<usize>) -> Self {
        Self {
            epoch,
            state_dict: model.state_dict(),
            optim_dict: None,
        }
    }
}

/// Save `checkpoint` to `path` (gzipped JSON), creating parent directories.
/// Non-finite parameters are written as `0.0`.
pub fn save_checkpoint(path: impl AsRef<Path>, checkpoint: &Checkpoint) -> Result<()> {
    let path = path.as_ref();
    let mut sanitized = checkpoint.clone();
    for param in sanitized.state_dict.values_mut() {
        for x in &mut param.data {
            if !x.is_finite() {
                *x = 0.0;
            }
        }
    }
    let json = serde_json::to_vec(&sanitized)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(&json)?;
    enc.finish()?;
    Ok(())
}

/// Read a checkpoint without applying it.
pub fn read_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::CheckpointNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let mut dec = GzDecoder::new(file);
    let mut buf = Vec::new();
    dec.read_to_end(&mut buf)?;
    Ok(serde_json::from_slice(&buf)?)
}

/// Load the parameters stored at `path` into `model`.
///
/// Returns the checkpoint's optimizer slot; callers that only evaluate drop it.
pub fn load_checkpoint<M: Model + ?Sized>(
    path: impl AsRef<Path>,
    model: &mut M,
) -> Result<Option<serde_json::Value>> {
    let checkpoint = read_checkpoint(path)?;
    model.load_state_dict(&checkpoint.state_dict)?;
    Ok(checkpoint.optim_dict)
}
