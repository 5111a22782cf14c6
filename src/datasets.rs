//! IDX split loading and fixed-size batching.
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::tensor::{element_count, Tensor};

/// Contents of a gzipped IDX file of unsigned bytes.
#[derive(Debug)]
pub struct IdxData {
    pub dims: Vec<usize>,
    pub data: Vec<u8>,
}

impl IdxData {
    /// Read an IDX file. The magic number's low byte is the dimension count;
    /// the element type must be unsigned byte (`0x08`).
    pub fn read(path: &Path) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidIdx {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path)?;
        let mut gz = GzDecoder::new(file);
        let mut contents = Vec::new();
        gz.read_to_end(&mut contents)?;
        let mut r = Cursor::new(&contents);
        let magic = r
            .read_u32::<BigEndian>()
            .map_err(|e| invalid(format!("read magic: {e}")))?;
        if magic >> 8 != 0x08 {
            return Err(invalid(format!("unsupported magic {magic:#010x}")));
        }
        let ndims = (magic & 0xff) as usize;
        if !(1..=3).contains(&ndims) {
            return Err(invalid(format!("unsupported dimension count {ndims}")));
        }
        let mut dims = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            let d = r
                .read_u32::<BigEndian>()
                .map_err(|e| invalid(format!("read dimension: {e}")))?;
            dims.push(d as usize);
        }
        let mut data = Vec::new();
        r.read_to_end(&mut data)?;
        let expected = element_count(&dims)
            .ok_or_else(|| invalid(format!("dimensions {dims:?} overflow the address space")))?;
        if data.len() != expected {
            return Err(invalid(format!(
                "expected {expected} bytes of data, found {}",
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }
}

/// One `(input, label)` pair handed to the evaluation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Tensor<f64>,
    pub labels: Tensor<usize>,
}

/// Whole split held in memory.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub images: Tensor<f64>,
    pub labels: Tensor<usize>,
}

impl Dataset {
    pub fn new(images: Tensor<f64>, labels: Tensor<usize>) -> Result<Self> {
        if images.rows() != labels.rows() {
            return Err(Error::shape("dataset labels", &[images.rows()], &[labels.rows()]));
        }
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.images.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of input features per sample.
    pub fn feature_dim(&self) -> usize {
        self.images.row_len()
    }
}

fn split_file(data_dir: &Path, split: &str, kind: &str, ndims: usize) -> PathBuf {
    data_dir.join(format!("{split}-{kind}-idx{ndims}-ubyte.gz"))
}

/// Load `<split>-images-idx3-ubyte.gz` and the matching labels file
/// (`idx1` for one label per sample, `idx2` for several).
pub fn load_split(data_dir: &Path, split: &str) -> Result<Dataset> {
    let image_path = split_file(data_dir, split, "images", 3);
    let label_path = [1, 2]
        .into_iter()
        .map(|n| split_file(data_dir, split, "labels", n))
        .find(|p| p.is_file())
        .unwrap_or_else(|| split_file(data_dir, split, "labels", 1));

    let images = IdxData::read(&image_path)?;
    let labels = IdxData::read(&label_path)?;
    if images.dims.len() != 3 {
        return Err(Error::InvalidIdx {
            path: image_path,
            reason: format!("images need 3 dimensions, found {}", images.dims.len()),
        });
    }
    let n = images.dims[0];
    let pixels = images.dims[1] * images.dims[2];
    let image_tensor = Tensor::new(
        images.data.iter().map(|&b| b as f64 / 255.0).collect(),
        vec![n, pixels],
    )?;
    let label_tensor = Tensor::new(labels.data.iter().map(|&b| b as usize).collect(), labels.dims)?;
    debug!(split, samples = n, pixels, "loaded split");
    Dataset::new(image_tensor, label_tensor)
}

/// Yields consecutive batches of `batch_size` samples, the last one possibly
/// shorter. Order is the file order.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: Dataset,
    batch_size: usize,
    cursor: usize,
}

impl DataLoader {
    pub fn new(dataset: Dataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        Ok(Self {
            dataset,
            batch_size,
            cursor: 0,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Number of batches a full pass yields.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }
}

impl Iterator for DataLoader {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.dataset.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.dataset.len());
        // Dataset::new keeps images and labels at the same row count
        let inputs = self.dataset.images.take_rows(self.cursor..end);
        let labels = self.dataset.labels.take_rows(self.cursor..end);
        self.cursor = end;
        Some(Batch { inputs, labels })
    }
}

/// Build one loader per requested split, keyed by split name.
pub fn fetch_dataloader(
    splits: &[&str],
    data_dir: &Path,
    params: &Params,
) -> Result<HashMap<String, DataLoader>> {
    let mut loaders = HashMap::new();
    for &split in splits {
        let dataset = load_split(data_dir, split)?;
        loaders.insert(split.to_string(), DataLoader::new(dataset, params.batch_size)?);
    }
    Ok(loaders)
}
