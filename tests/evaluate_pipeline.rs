//! End-to-end run over an on-disk experiment directory: params.json, a
//! checkpoint and an IDX test split.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use approx::assert_relative_eq;
use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::GzEncoder;
use flate2::Compression;
use transfer_eval::{
    accuracy, default_metrics, evaluate, exact_match, fetch_dataloader, incorrect_two_labels,
    load_model, loss_fn_two_labels, save_checkpoint, save_dict_to_json, Checkpoint, Device, Error,
    Mode, Model, Params, TransferNet, SEED,
};

const SAMPLES: usize = 5;

fn write_idx(path: &Path, dims: &[u32], data: &[u8]) {
    let mut raw = Vec::new();
    raw.write_u32::<BigEndian>(0x0800 | dims.len() as u32).unwrap();
    for &d in dims {
        raw.write_u32::<BigEndian>(d).unwrap();
    }
    raw.extend_from_slice(data);
    let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    enc.write_all(&raw).unwrap();
    enc.finish().unwrap();
}

/// Lay out `model_dir/params.json`, `model_dir/best.pth.tar` and the test
/// split under `data_dir`. Returns the network whose weights were saved.
fn experiment(model_dir: &Path, data_dir: &Path) -> TransferNet {
    std::fs::create_dir_all(model_dir).unwrap();
    std::fs::create_dir_all(data_dir).unwrap();
    std::fs::write(
        model_dir.join("params.json"),
        r#"{
            "batch_size": 2,
            "num_classes": 3,
            "learning_rate": 0.001,
            "hidden_sizes": [5],
            "dropout_rate": 0.25,
            "labels_per_sample": 2
        }"#,
    )
    .unwrap();

    let pixels: Vec<u8> = (0..SAMPLES * 4).map(|i| (i * 37 % 256) as u8).collect();
    write_idx(&data_dir.join("test-images-idx3-ubyte.gz"), &[SAMPLES as u32, 2, 2], &pixels);
    write_idx(
        &data_dir.join("test-labels-idx2-ubyte.gz"),
        &[SAMPLES as u32, 2],
        &[0, 1, 2, 2, 1, 0, 0, 0, 2, 1],
    );

    let params = Params::from_json(model_dir.join("params.json")).unwrap();
    let trained = TransferNet::new(&params.net_config(4), params.head_outputs(), 11);
    save_checkpoint(
        model_dir.join("best.pth.tar"),
        &Checkpoint::from_model(&trained, Some(12)),
    )
    .unwrap();
    trained
}

#[test]
fn restored_model_is_evaluated_with_proportion_weighting() {
    let root = tempfile::tempdir().unwrap();
    let model_dir = root.path().join("experiments");
    let data_dir = root.path().join("data");
    let mut trained = experiment(&model_dir, &data_dir);

    let params = Params::from_json(model_dir.join("params.json")).unwrap();
    let mut loaders = fetch_dataloader(&["test"], &data_dir, &params).unwrap();
    let test_dl = loaders.remove("test").unwrap();
    assert_eq!(test_dl.num_batches(), 3);

    let dataset = test_dl.dataset().clone();
    let mut model = TransferNet::new(&params.net_config(4), params.head_outputs(), SEED);
    load_model(Some(model_dir.as_path()), Some("best"), &mut model).unwrap();

    let metrics = default_metrics();
    let (mean, incorrect) = evaluate(
        &mut model,
        loss_fn_two_labels,
        test_dl,
        &metrics,
        incorrect_two_labels,
        &params,
        Device::Cpu,
    )
    .unwrap();
    assert_eq!(model.mode(), Mode::Eval);

    // Weighting by rows / batch_size turns per-batch accuracies back into the
    // accuracy over the whole split.
    trained.eval();
    let full = trained.forward(&dataset.images).unwrap();
    assert_relative_eq!(
        mean["accuracy"],
        accuracy(&full, &dataset.labels).unwrap(),
        epsilon = 1e-12
    );
    let exact = exact_match(&full, &dataset.labels).unwrap();
    assert_relative_eq!(mean["exact_match"], exact, epsilon = 1e-12);
    assert_eq!(incorrect.len(), SAMPLES - (exact * SAMPLES as f64).round() as usize);

    // Loss: raw per-batch values over the weighted total 1 + 1 + 0.5.
    let batch_loss = |start, end| {
        loss_fn_two_labels(
            &full.slice_rows(start, end).unwrap(),
            &dataset.labels.slice_rows(start, end).unwrap(),
            3,
        )
        .unwrap()
    };
    let expected_loss = (batch_loss(0, 2) + batch_loss(2, 4) + batch_loss(4, 5)) / 2.5;
    assert_relative_eq!(mean["loss"], expected_loss, epsilon = 1e-9);

    let save_path = model_dir.join("metrics_test_best.json");
    save_dict_to_json(&mean, &save_path).unwrap();
    let saved: BTreeMap<String, f64> =
        serde_json::from_str(&std::fs::read_to_string(&save_path).unwrap()).unwrap();
    assert_eq!(
        saved.keys().collect::<Vec<_>>(),
        ["accuracy", "exact_match", "loss"]
    );
}

#[test]
fn transferred_head_must_match_checkpoint() {
    let root = tempfile::tempdir().unwrap();
    let model_dir = root.path().join("experiments");
    let data_dir = root.path().join("data");
    experiment(&model_dir, &data_dir);

    let params = Params::from_json(model_dir.join("params.json")).unwrap();
    // a head sized for one label column cannot take the two-column weights
    let mut model = TransferNet::new(&params.net_config(4), params.num_classes, SEED);
    let err = load_model(Some(model_dir.as_path()), Some("best"), &mut model).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn missing_params_file_fails_first() {
    let root = tempfile::tempdir().unwrap();
    let err = Params::from_json(root.path().join("params.json")).unwrap_err();
    assert!(matches!(err, Error::MissingConfig(_)));
}
