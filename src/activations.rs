//! Element-wise activation functions and the log-softmax used by the loss.
use serde::{Deserialize, Serialize};

/// Activation applied after a dense layer. Stored by name in checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    /// max(0, x)
    #[default]
    ReLU,
    /// 1 / (1 + exp(-x))
    Sigmoid,
    Tanh,
    /// x if x > 0 else alpha * x
    LeakyReLU { alpha: f64 },
    /// identity, used by the classifier head
    Linear,
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Activation::ReLU => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::LeakyReLU { alpha } => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Activation::Linear => x,
        }
    }

    pub fn apply_in_place(&self, values: &mut [f64]) {
        if *self == Activation::Linear {
            return;
        }
        for v in values {
            *v = self.apply(*v);
        }
    }
}

/// log(softmax(x)) computed with the log-sum-exp shift.
pub fn log_softmax(x: &[f64]) -> Vec<f64> {
    let max = x.iter().fold(f64::MIN, |a, &b| a.max(b));
    let log_sum = x.iter().map(|&xi| (xi - max).exp()).sum::<f64>().ln() + max;
    x.iter().map(|&xi| xi - log_sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn relu_and_leaky() {
        assert_eq!(Activation::ReLU.apply(-2.0), 0.0);
        assert_eq!(Activation::ReLU.apply(3.0), 3.0);
        assert_abs_diff_eq!(Activation::LeakyReLU { alpha: 0.1 }.apply(-2.0), -0.2);
    }

    #[test]
    fn log_softmax_exponentiates_to_a_distribution() {
        let lp = log_softmax(&[0.5, -1.0, 4.0]);
        assert_abs_diff_eq!(lp.iter().map(|v| v.exp()).sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(lp[2] > lp[0] && lp[0] > lp[1]);
        assert!(lp.iter().all(|&v| v <= 0.0));
    }

    #[test]
    fn activation_names_round_trip_through_json() {
        let json = serde_json::to_string(&Activation::LeakyReLU { alpha: 0.01 }).unwrap();
        let back: Activation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Activation::LeakyReLU { alpha: 0.01 });
        let relu: Activation = serde_json::from_str("\"ReLU\"").unwrap();
        assert_eq!(relu, Activation::ReLU);
    }
}
