//! Logger setup and JSON persistence helpers.
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Seed for every random generator the tool creates.
pub const SEED: u64 = 230;

static LOGGER: OnceLock<()> = OnceLock::new();

/// Send log records to the terminal and append them to `log_path`.
///
/// The terminal shows bare messages; the file gets a timestamp and level on
/// every line. Verbosity follows `RUST_LOG`, defaulting to `info`. Calling
/// this again after a successful install does nothing.
pub fn set_logger(log_path: impl AsRef<Path>) -> Result<()> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path.as_ref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal());
    let logfile = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(logfile)
        .try_init()
        .map_err(|e| Error::Logger(e.to_string()))?;
    let _ = LOGGER.set(());
    Ok(())
}

/// Write a flat map of scalars as pretty JSON with four-space indentation.
///
/// JSON has no NaN or infinity, so a non-finite value is an error and no
/// file is written.
pub fn save_dict_to_json(values: &BTreeMap<String, f64>, json_path: impl AsRef<Path>) -> Result<()> {
    if let Some((key, &value)) = values.iter().find(|(_, v)| !v.is_finite()) {
        return Err(Error::NonFiniteMetric {
            key: key.clone(),
            value,
        });
    }
    let mut file = File::create(json_path)?;
    let mut ser = serde_json::Serializer::with_formatter(&mut file, PrettyFormatter::with_indent(b"    "));
    values.serialize(&mut ser)?;
    file.write_all(b"\n")?;
    Ok(())
}
