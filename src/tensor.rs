//! Minimal row-major tensor used for inputs, logits and labels.
use std::ops::Range;

use crate::device::Device;
use crate::error::{Error, Result};

/// A dense, row-major buffer with an explicit shape and device tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    data: Vec<T>,
    shape: Vec<usize>,
    device: Device,
}

impl<T: Clone> Tensor<T> {
    /// Build a host tensor, checking that `data` fills `shape` exactly.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let expected = element_count(&shape)
            .ok_or_else(|| Error::shape("tensor data", &shape, &[data.len()]))?;
        if expected != data.len() {
            return Err(Error::shape("tensor data", &[expected], &[data.len()]));
        }
        Ok(Self {
            data,
            shape,
            device: Device::Cpu,
        })
    }

    /// Build a 2-D host tensor from equally sized rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(Error::shape("tensor row", &[cols], &[row.len()]));
            }
            data.extend_from_slice(row);
        }
        Self::new(data, vec![rows.len(), cols])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Size of dimension `index`, or `None` when the tensor has fewer dims.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.shape.get(index).copied()
    }

    /// Size of the leading (batch) dimension.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Number of elements per leading-dimension entry.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    pub fn row(&self, index: usize) -> &[T] {
        let width = self.row_len();
        &self.data[index * width..(index + 1) * width]
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Drop dimension `dim` when it has size 1; otherwise return the tensor
    /// unchanged.
    pub fn squeeze(mut self, dim: usize) -> Self {
        if self.shape.get(dim) == Some(&1) {
            self.shape.remove(dim);
        }
        self
    }

    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Copy of the tensor placed on the host, detached from any device.
    pub fn to_host(&self) -> Self {
        self.clone().to_device(Device::Cpu)
    }

    /// Rows `start..end` of the leading dimension.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.rows() {
            return Err(Error::shape("row slice", &[self.rows()], &[start, end]));
        }
        Ok(self.take_rows(start..end))
    }

    /// Rows `range` of the tensor. Panics when the range is out of bounds.
    pub(crate) fn take_rows(&self, range: Range<usize>) -> Self {
        let width = self.row_len();
        let mut shape = self.shape.clone();
        shape[0] = range.len();
        Self {
            data: self.data[range.start * width..range.end * width].to_vec(),
            shape,
            device: self.device,
        }
    }
}

/// Product of `dims`, or `None` when it does not fit in a `usize`.
pub(crate) fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Index of the largest value in `values`; ties resolve to the first.
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0usize, |best, (i, &v)| if v > values[best] { i } else { best })
}
