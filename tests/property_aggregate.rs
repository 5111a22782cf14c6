//! Property tests for proportion-weighted metric aggregation.

use std::collections::BTreeMap;

use proptest::collection::vec;
use proptest::prelude::*;
use transfer_eval::evaluate::{aggregate, LOSS_KEY};
use transfer_eval::Error;

fn summaries(values: &[(f64, f64)], proportions: &[f64]) -> Vec<BTreeMap<String, f64>> {
    values
        .iter()
        .zip(proportions)
        .map(|(&(metric, loss), &p)| {
            let mut s = BTreeMap::new();
            s.insert("accuracy".to_string(), metric * p);
            s.insert(LOSS_KEY.to_string(), loss);
            s
        })
        .collect()
}

proptest! {
    #[test]
    fn full_batches_reduce_to_plain_mean(values in vec((0.0f64..1.0, 0.0f64..10.0), 1..40)) {
        let proportions = vec![1.0; values.len()];
        let mean = aggregate(&summaries(&values, &proportions), &proportions).unwrap();
        let k = values.len() as f64;
        let plain_metric = values.iter().map(|v| v.0).sum::<f64>() / k;
        let plain_loss = values.iter().map(|v| v.1).sum::<f64>() / k;
        prop_assert!((mean["accuracy"] - plain_metric).abs() < 1e-9);
        prop_assert!((mean[LOSS_KEY] - plain_loss).abs() < 1e-9);
    }

    #[test]
    fn partial_tail_is_down_weighted(
        values in vec((0.0f64..1.0, 0.0f64..10.0), 1..20),
        tail in 1usize..32,
        batch_size in 32usize..64,
    ) {
        let mut proportions = vec![1.0; values.len()];
        let last = proportions.len() - 1;
        proportions[last] = tail as f64 / batch_size as f64;
        let total: f64 = proportions.iter().sum();

        let mean = aggregate(&summaries(&values, &proportions), &proportions).unwrap();

        let weighted: f64 = values.iter().zip(&proportions).map(|(v, p)| v.0 * p).sum::<f64>() / total;
        let loss: f64 = values.iter().map(|v| v.1).sum::<f64>() / total;
        prop_assert!((mean["accuracy"] - weighted).abs() < 1e-9);
        prop_assert!((mean[LOSS_KEY] - loss).abs() < 1e-9);
        prop_assert!(mean["accuracy"] >= 0.0 && mean["accuracy"] <= 1.0 + 1e-12);
    }
}

#[test]
fn worked_example() {
    let proportions = [1.0, 0.5];
    let mean = aggregate(&summaries(&[(0.8, 0.0), (0.6, 0.0)], &proportions), &proportions).unwrap();
    assert!((mean["accuracy"] - 1.1 / 1.5).abs() < 1e-12);
}

#[test]
fn nothing_to_aggregate() {
    assert!(matches!(aggregate(&[], &[]), Err(Error::EmptyDataset)));
}
