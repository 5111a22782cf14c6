//! Evaluate a fine-tuned dense image classifier on a held-out test split.
//!
//! - Feature extractor + classifier head sized for the new label space
//! - Gzipped JSON checkpoints restored by name from a model directory
//! - IDX test split loading with one or several labels per image
//! - Batch metrics averaged by each batch's share of a nominal batch
//! - Misclassified samples collected for inspection

pub mod activations;
pub mod checkpoint;
pub mod datasets;
pub mod device;
pub mod error;
pub mod evaluate;
pub mod incorrect;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod params;
pub mod tensor;
pub mod utils;

pub use activations::Activation;
pub use checkpoint::{load_checkpoint, save_checkpoint, Checkpoint, StateDict};
pub use datasets::{fetch_dataloader, Batch, DataLoader, Dataset};
pub use device::Device;
pub use error::{Error, Result};
pub use evaluate::{evaluate, load_model, MetricsMean};
pub use incorrect::{incorrect_two_labels, write_incorrect_report, IncorrectSample};
pub use loss::loss_fn_two_labels;
pub use metrics::{accuracy, default_metrics, exact_match, MetricTable};
pub use network::{Mode, Model, NetConfig, TransferNet};
pub use params::Params;
pub use tensor::Tensor;
pub use utils::{save_dict_to_json, set_logger, SEED};
