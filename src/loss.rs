//! Loss functions for multi-label classification outputs.
use crate::activations::log_softmax;
use crate::error::{Error, Result};
use crate::metrics::label_groups;
use crate::tensor::Tensor;

/// Softmax cross-entropy averaged over every (sample, label column) pair.
///
/// Each label column owns a group of `num_classes` logits, so the output width
/// must be `columns * num_classes`.
pub fn loss_fn_two_labels(
    output: &Tensor<f64>,
    labels: &Tensor<usize>,
    num_classes: usize,
) -> Result<f64> {
    let (columns, classes) = label_groups(output, labels)?;
    if classes != num_classes {
        return Err(Error::shape(
            "loss logits",
            &[output.rows(), columns * num_classes],
            output.shape(),
        ));
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for r in 0..output.rows() {
        for (group, &label) in output.row(r).chunks(classes).zip(labels.row(r)) {
            if label >= classes {
                return Err(Error::LabelOutOfRange { label, classes });
            }
            total -= log_softmax(group)[label];
            count += 1;
        }
    }
    if count == 0 {
        return Ok(0.0);
    }
    Ok(total / count as f64)
}
