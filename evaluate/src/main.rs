// evaluate/src/main.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use transfer_eval::{
    default_metrics, evaluate, fetch_dataloader, incorrect_two_labels, load_model,
    loss_fn_two_labels, save_dict_to_json, set_logger, write_incorrect_report, Device, Params,
    TransferNet, SEED,
};

/// Evaluate a fine-tuned checkpoint on the test split.
#[derive(Parser, Debug)]
#[command(name = "evaluate", about = "Evaluate the model on the test set")]
struct Args {
    /// Path to experiments and data folder
    #[arg(long = "parent_dir", env = "USERPROFILE")]
    parent_dir: Option<PathBuf>,
    /// Directory containing the dataset
    #[arg(long = "data_dir", default_value = "data")]
    data_dir: PathBuf,
    /// Directory containing params.json
    #[arg(long = "model_dir", default_value = "experiments")]
    model_dir: PathBuf,
    /// Name of the file in --model_dir containing weights to load
    #[arg(long = "restore_file", default_value = "best")]
    restore_file: String,
}

fn main() -> Result<()> {
    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    if let Some(parent) = &args.parent_dir {
        std::env::set_current_dir(parent)
            .with_context(|| format!("cannot enter {}", parent.display()))?;
    }

    let json_path = args.model_dir.join("params.json");
    let mut params = Params::from_json(&json_path)?;

    let device = Device::cuda_if_available(0);
    params.cuda = device.is_cuda();

    set_logger(args.model_dir.join("evaluate.log"))?;

    info!("Creating the dataset...");
    let mut dataloaders = fetch_dataloader(&["test"], &args.data_dir, &params)
        .with_context(|| format!("loading test split from {}", args.data_dir.display()))?;
    let test_dl = dataloaders
        .remove("test")
        .context("no test loader was built")?;
    info!("- done.");

    let config = params.net_config(test_dl.dataset().feature_dim());
    let mut model = TransferNet::new(&config, params.head_outputs(), SEED).to_device(device);
    info!("{model}");

    info!("Starting evaluation");
    load_model(
        Some(args.model_dir.as_path()),
        Some(args.restore_file.as_str()),
        &mut model,
    )?;

    let metrics = default_metrics();
    let (test_metrics, incorrect_samples) = evaluate(
        &mut model,
        loss_fn_two_labels,
        test_dl,
        &metrics,
        incorrect_two_labels,
        &params,
        device,
    )?;

    let save_path = args
        .model_dir
        .join(format!("metrics_test_{}.json", args.restore_file));
    save_dict_to_json(&test_metrics, &save_path)?;

    let report_path = args
        .model_dir
        .join(format!("incorrect_test_{}.csv", args.restore_file));
    write_incorrect_report(&report_path, &incorrect_samples)?;
    info!(
        "{} incorrect samples written to {}",
        incorrect_samples.len(),
        report_path.display()
    );
    Ok(())
}
