//! Misclassified samples kept for inspection.
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::metrics::{label_groups, predictions};
use crate::tensor::Tensor;

/// One input whose prediction differs from its ground truth in at least one
/// label column.
#[derive(Debug, Clone, PartialEq)]
pub struct IncorrectSample {
    /// Row of the sample inside its batch.
    pub position: usize,
    pub expected: Vec<usize>,
    pub predicted: Vec<usize>,
    pub pixels: Vec<f64>,
}

/// Collect every sample with a wrong prediction in any label column.
pub fn incorrect_two_labels(
    input: &Tensor<f64>,
    output: &Tensor<f64>,
    labels: &Tensor<usize>,
) -> Result<Vec<IncorrectSample>> {
    let (columns, classes) = label_groups(output, labels)?;
    let predicted = predictions(output, columns, classes);
    let samples = predicted
        .chunks(columns)
        .enumerate()
        .filter(|&(r, p)| p != labels.row(r))
        .map(|(r, p)| IncorrectSample {
            position: r,
            expected: labels.row(r).to_vec(),
            predicted: p.to_vec(),
            pixels: input.row(r).to_vec(),
        })
        .collect();
    Ok(samples)
}

#[derive(Serialize)]
struct ReportRow {
    sample: usize,
    position: usize,
    expected: String,
    predicted: String,
}

fn join(labels: &[usize]) -> String {
    labels.iter().map(usize::to_string).collect::<Vec<_>>().join(" ")
}

/// Write one CSV row per sample: order of appearance, batch position and the
/// space-separated expected and predicted labels.
pub fn write_incorrect_report(path: impl AsRef<Path>, samples: &[IncorrectSample]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (i, sample) in samples.iter().enumerate() {
        writer.serialize(ReportRow {
            sample: i,
            position: sample.position,
            expected: join(&sample.expected),
            predicted: join(&sample.predicted),
        })?;
    }
    writer.flush()?;
    Ok(())
}
