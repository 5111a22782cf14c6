//! Batch metrics computed on host copies of the logits and labels.
//!
//! A row of logits with `k * C` entries is read as `k` consecutive groups of
//! `C` class scores, one group per label column.
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::tensor::{argmax, Tensor};

/// Pure scalar summary of one batch.
pub type MetricFn = fn(&Tensor<f64>, &Tensor<usize>) -> Result<f64>;

/// Metric name to function. Ordered so summaries print the same way every run.
pub type MetricTable = BTreeMap<String, MetricFn>;

/// Label columns per sample and classes per column for this batch.
pub(crate) fn label_groups(output: &Tensor<f64>, labels: &Tensor<usize>) -> Result<(usize, usize)> {
    if output.rows() != labels.rows() {
        return Err(Error::shape("batch rows", &[labels.rows()], &[output.rows()]));
    }
    let columns = labels.row_len();
    let width = output.row_len();
    if columns == 0 || width % columns != 0 || width == 0 {
        return Err(Error::shape("logit groups", &[columns], output.shape()));
    }
    Ok((columns, width / columns))
}

/// Predicted class for every label column of every row, row-major.
pub(crate) fn predictions(output: &Tensor<f64>, columns: usize, classes: usize) -> Vec<usize> {
    (0..output.rows())
        .flat_map(|r| {
            output
                .row(r)
                .chunks(classes)
                .take(columns)
                .map(argmax)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Fraction of (sample, label column) pairs predicted correctly.
pub fn accuracy(output: &Tensor<f64>, labels: &Tensor<usize>) -> Result<f64> {
    let (columns, classes) = label_groups(output, labels)?;
    let predicted = predictions(output, columns, classes);
    if predicted.is_empty() {
        return Ok(0.0);
    }
    let correct = predicted
        .iter()
        .zip(labels.data())
        .filter(|(p, t)| p == t)
        .count();
    Ok(correct as f64 / predicted.len() as f64)
}

/// Fraction of samples whose every label column is predicted correctly.
pub fn exact_match(output: &Tensor<f64>, labels: &Tensor<usize>) -> Result<f64> {
    let (columns, classes) = label_groups(output, labels)?;
    let predicted = predictions(output, columns, classes);
    let rows = labels.rows();
    if rows == 0 {
        return Ok(0.0);
    }
    let correct = predicted
        .chunks(columns)
        .zip(labels.data().chunks(columns))
        .filter(|(p, t)| p == t)
        .count();
    Ok(correct as f64 / rows as f64)
}

/// Metrics reported by the evaluation tool.
pub fn default_metrics() -> MetricTable {
    let mut table = MetricTable::new();
    table.insert("accuracy".to_string(), accuracy as MetricFn);
    table.insert("exact_match".to_string(), exact_match as MetricFn);
    table
}
