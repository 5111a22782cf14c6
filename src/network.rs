//! Transfer-learning network: a pretrained feature extractor followed by a
//! classifier head whose width is chosen when the network is built.
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activations::Activation;
use crate::checkpoint::{ParamTensor, StateDict};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::layers::{DenseLayer, Dropout};
use crate::tensor::Tensor;

/// Whether stochastic layers (dropout) are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Anything the evaluation loop can drive.
pub trait Model {
    fn set_mode(&mut self, mode: Mode);

    fn mode(&self) -> Mode;

    /// Switch to inference mode.
    fn eval(&mut self) {
        self.set_mode(Mode::Eval);
    }

    fn device(&self) -> Device;

    /// Map a `[batch, in_features]` tensor to `[batch, outputs]` logits.
    fn forward(&mut self, input: &Tensor<f64>) -> Result<Tensor<f64>>;

    fn state_dict(&self) -> StateDict;

    /// Overwrite every parameter from `state`. Nothing is modified unless all
    /// names and shapes match.
    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;
}

/// Architecture of the feature extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct NetConfig {
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub activation: Activation,
    pub dropout_rate: f64,
}

/// Stack of dense layers with dropout after each one.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    pub layers: Vec<DenseLayer>,
    pub dropout: Dropout,
}

impl FeatureExtractor {
    pub fn new(config: &NetConfig, rng: &mut StdRng) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_sizes.len());
        let mut prev = config.input_size;
        for &size in &config.hidden_sizes {
            layers.push(DenseLayer::new(prev, size, config.activation, rng));
            prev = size;
        }
        Self {
            layers,
            dropout: Dropout {
                p: config.dropout_rate,
            },
        }
    }

    /// Width of the extracted feature vector.
    pub fn out_features(&self, input_size: usize) -> usize {
        self.layers.last().map_or(input_size, DenseLayer::out_features)
    }

    fn forward(&self, input: &Tensor<f64>, mode: Mode, rng: &mut StdRng) -> Result<Tensor<f64>> {
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.forward(&current)?;
            if mode == Mode::Train {
                current = self.dropout.apply(current, rng)?;
            }
        }
        Ok(current)
    }
}

/// Final linear layer mapping features to logits.
#[derive(Debug, Clone)]
pub struct ClassifierHead {
    pub layer: DenseLayer,
}

impl ClassifierHead {
    pub fn new(in_features: usize, outputs: usize, rng: &mut StdRng) -> Self {
        Self {
            layer: DenseLayer::new(in_features, outputs, Activation::Linear, rng),
        }
    }

    pub fn outputs(&self) -> usize {
        self.layer.out_features()
    }
}

#[derive(Debug)]
pub struct TransferNet {
    features: FeatureExtractor,
    head: ClassifierHead,
    input_size: usize,
    mode: Mode,
    device: Device,
    rng: StdRng,
}

impl TransferNet {
    /// Build the extractor from `config` and a head with `head_outputs`
    /// logits. All initial weights and dropout masks derive from `seed`.
    pub fn new(config: &NetConfig, head_outputs: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let features = FeatureExtractor::new(config, &mut rng);
        let head = ClassifierHead::new(features.out_features(config.input_size), head_outputs, &mut rng);
        Self {
            features,
            head,
            input_size: config.input_size,
            mode: Mode::Train,
            device: Device::Cpu,
            rng,
        }
    }

    /// Place the parameters on `device`.
    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    fn named_layers(&self) -> impl Iterator<Item = (String, &DenseLayer)> {
        self.features
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (format!("features.{i}"), layer))
            .chain(std::iter::once(("head".to_string(), &self.head.layer)))
    }
}

impl Model for TransferNet {
    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn device(&self) -> Device {
        self.device
    }

    fn forward(&mut self, input: &Tensor<f64>) -> Result<Tensor<f64>> {
        if input.device() != self.device {
            return Err(Error::DeviceMismatch {
                model: self.device,
                batch: input.device(),
            });
        }
        let features = self.features.forward(input, self.mode, &mut self.rng)?;
        self.head.layer.forward(&features)
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        for (prefix, layer) in self.named_layers() {
            state.insert(
                format!("{prefix}.weight"),
                ParamTensor {
                    shape: vec![layer.out_features(), layer.in_features()],
                    data: layer.flat_weights(),
                },
            );
            state.insert(
                format!("{prefix}.bias"),
                ParamTensor {
                    shape: vec![layer.out_features()],
                    data: layer.bias.clone(),
                },
            );
        }
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let expected = self.state_dict();
        for (name, param) in &expected {
            let stored = state
                .get(name)
                .ok_or_else(|| Error::MissingParameter(name.clone()))?;
            stored.validate(name)?;
            if stored.shape != param.shape {
                return Err(Error::shape(name.as_str(), &param.shape, &stored.shape));
            }
        }
        if let Some(extra) = state.keys().find(|k| !expected.contains_key(*k)) {
            return Err(Error::UnexpectedParameter(extra.clone()));
        }

        let layers = self
            .features
            .layers
            .iter_mut()
            .enumerate()
            .map(|(i, layer)| (format!("features.{i}"), layer))
            .chain(std::iter::once(("head".to_string(), &mut self.head.layer)));
        for (prefix, layer) in layers {
            let weight = &state[&format!("{prefix}.weight")];
            let bias = &state[&format!("{prefix}.bias")];
            layer.assign(&weight.data, &bias.data)?;
        }
        Ok(())
    }
}

impl fmt::Display for TransferNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sizes = vec![self.input_size];
        for layer in &self.features.layers {
            sizes.push(layer.out_features());
        }
        sizes.push(self.head.outputs());
        write!(f, "TransferNet: {:?} on {}", sizes, self.device)
    }
}
