//! Evaluation loop and checkpoint restoration.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::checkpoint::load_checkpoint;
use crate::datasets::Batch;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::incorrect::IncorrectSample;
use crate::metrics::MetricTable;
use crate::network::Model;
use crate::params::Params;
use crate::tensor::Tensor;

/// Key under which the batch loss is recorded next to the metrics.
pub const LOSS_KEY: &str = "loss";

/// Metric name to its mean over the evaluated split.
pub type MetricsMean = BTreeMap<String, f64>;

/// Path of the checkpoint named `restore_file` inside `model_dir`.
pub fn checkpoint_path(model_dir: &Path, restore_file: &str) -> PathBuf {
    model_dir.join(format!("{restore_file}.pth.tar"))
}

/// Reload weights from `<model_dir>/<restore_file>.pth.tar` when both are
/// given. Optimizer state stored in the checkpoint is ignored.
pub fn load_model<M: Model + ?Sized>(
    model_dir: Option<&Path>,
    restore_file: Option<&str>,
    model: &mut M,
) -> Result<()> {
    if let (Some(model_dir), Some(restore_file)) = (model_dir, restore_file) {
        let restore_path = checkpoint_path(model_dir, restore_file);
        info!("Restoring parameters from {}", restore_path.display());
        load_checkpoint(&restore_path, model)?;
    }
    Ok(())
}

/// Run `model` over every batch and average the metrics.
///
/// Each metric value is scaled by the batch's share of a nominal batch
/// (`labels / params.batch_size`) and the sums are divided by the total of
/// those shares. The loss is recorded unscaled but divided by the same total,
/// so with a partial last batch it is not a plain per-batch mean.
pub fn evaluate<M, I, L, C>(
    model: &mut M,
    loss_fn: L,
    batches: I,
    metrics: &MetricTable,
    incorrect: C,
    params: &Params,
    device: Device,
) -> Result<(MetricsMean, Vec<IncorrectSample>)>
where
    M: Model + ?Sized,
    I: IntoIterator<Item = Batch>,
    L: Fn(&Tensor<f64>, &Tensor<usize>, usize) -> Result<f64>,
    C: Fn(&Tensor<f64>, &Tensor<f64>, &Tensor<usize>) -> Result<Vec<IncorrectSample>>,
{
    if metrics.is_empty() {
        return Err(Error::EmptyMetricTable);
    }
    model.eval();

    let mut summ: Vec<BTreeMap<String, f64>> = Vec::new();
    let mut prop: Vec<f64> = Vec::new();
    let mut incorrect_samples = Vec::new();

    for (step, Batch { inputs, labels }) in batches.into_iter().enumerate() {
        let (inputs, mut labels) = if params.cuda {
            (inputs.to_device(device), labels.to_device(device))
        } else {
            (inputs, labels)
        };
        if labels.dim(1) == Some(1) {
            labels = labels.squeeze(1);
        }

        let output = model.forward(&inputs)?;
        let loss = loss_fn(&output, &labels, params.num_classes)?;

        let output = output.to_host();
        let labels = labels.to_host();

        let proportion = labels.rows() as f64 / params.batch_size as f64;
        prop.push(proportion);

        let mut summary = BTreeMap::new();
        for (name, metric) in metrics {
            summary.insert(name.clone(), metric(&output, &labels)? * proportion);
        }
        summary.insert(LOSS_KEY.to_string(), loss);
        debug!(step, proportion, loss, "evaluated batch");
        summ.push(summary);

        incorrect_samples.extend(incorrect(&inputs, &output, &labels)?);
    }

    let metrics_mean = aggregate(&summ, &prop)?;
    info!("- Eval metrics : {}", metrics_string(&metrics_mean));
    Ok((metrics_mean, incorrect_samples))
}

/// `Σ value / Σ proportion` for every key of the first summary.
pub fn aggregate(summaries: &[BTreeMap<String, f64>], proportions: &[f64]) -> Result<MetricsMean> {
    let first = summaries.first().ok_or(Error::EmptyDataset)?;
    let prop_sum: f64 = proportions.iter().sum();
    let mut mean = MetricsMean::new();
    for key in first.keys() {
        let mut total = 0.0;
        for (step, summary) in summaries.iter().enumerate() {
            total += summary.get(key).ok_or_else(|| {
                Error::InvalidConfig(format!("batch {step} has no value for `{key}`"))
            })?;
        }
        mean.insert(key.clone(), total / prop_sum);
    }
    Ok(mean)
}

/// `name: value` pairs joined by ` ; `, values zero-padded to three decimals.
pub fn metrics_string(metrics: &MetricsMean) -> String {
    metrics
        .iter()
        .map(|(k, v)| format!("{k}: {v:05.3}"))
        .collect::<Vec<_>>()
        .join(" ; ")
}
