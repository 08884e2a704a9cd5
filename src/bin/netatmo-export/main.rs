mod args;
mod prompt;

use std::{path::Path, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use args::{AddDeviceArgs, Args, Command, FetchArgs, UpdateDeviceArgs};
use chrono::Utc;
use clap::Parser as _;
use netatmo_export::{
    config::{Config, DeviceEntry, DeviceUpdate},
    export::Exporter,
    fleet::{Fleet, RetryDecision},
    netatmo::{MeasurementType, NetatmoClient},
    station::Station,
};
use tracing_subscriber::EnvFilter;

use crate::prompt::decide_retry;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Fetch(fetch) => run_fetch(&args.config, fetch).await,
        Command::AddDevice(add) => add_device(&args.config, add),
        Command::RemoveDevice { name } => remove_device(&args.config, &name),
        Command::UpdateDevice(update) => update_device(&args.config, update),
    }
}

async fn run_fetch(config_path: &Path, fetch: FetchArgs) -> Result<()> {
    let mut config = Config::load(config_path).context("failed to load configuration")?;
    let stations: Vec<Station> = config
        .devices()
        .context("failed to read devices from configuration")?
        .into_iter()
        .map(Station::new)
        .collect();

    let client = NetatmoClient::new(&fetch.api_url, Duration::from_secs(fetch.timeout_secs))
        .context("failed to create Netatmo client")?;

    let token = client
        .authenticate(&fetch.credentials())
        .await
        .context("failed to authenticate")?;

    let retry_mode = fetch.retry;
    let exporter = Exporter::new(fetch.output_dir, fetch.timezone);
    let fleet = Fleet::new(Arc::new(client), token, exporter, fetch.concurrency);

    let mut report = fleet
        .run(stations, |failed| async move {
            tokio::task::spawn_blocking(move || decide_retry(&failed, retry_mode))
                .await
                .unwrap_or_else(|e| {
                    eprintln!("failed to ask for a retry: {e}");
                    RetryDecision::Skip
                })
        })
        .await;

    report
        .advance_checkpoints(&mut config)
        .context("failed to update checkpoints")?;
    config
        .save(config_path)
        .context("failed to save configuration")?;

    for station in &report.stations {
        if let Some(path) = station.exported() {
            println!("{}: {}", station.name(), path.display());
        }
    }

    let failed = report.failed();
    if !failed.is_empty() {
        eprintln!("No data exported for: {}", failed.join(", "));
    }

    Ok(())
}

fn add_device(config_path: &Path, add: AddDeviceArgs) -> Result<()> {
    let mut config = Config::load(config_path).context("failed to load configuration")?;

    let entry = DeviceEntry {
        mac_address: add.mac_address,
        begin_timestamp: Some(add.begin_timestamp.unwrap_or_else(|| Utc::now().timestamp())),
        measurements: add
            .measurements
            .filter(|m| !m.is_empty())
            .unwrap_or_else(MeasurementType::defaults),
    };

    config
        .add_device(&add.name, entry)
        .with_context(|| format!("failed to add device {}", add.name))?;
    config
        .save(config_path)
        .context("failed to save configuration")?;

    println!("Added device {}", add.name);
    Ok(())
}

fn remove_device(config_path: &Path, name: &str) -> Result<()> {
    let mut config = Config::load(config_path).context("failed to load configuration")?;

    config
        .remove_device(name)
        .with_context(|| format!("failed to remove device {name}"))?;
    config
        .save(config_path)
        .context("failed to save configuration")?;

    println!("Removed device {name}");
    Ok(())
}

fn update_device(config_path: &Path, update: UpdateDeviceArgs) -> Result<()> {
    let mut config = Config::load(config_path).context("failed to load configuration")?;

    let changes = DeviceUpdate {
        name: update.new_name,
        mac_address: update.mac_address,
        begin_timestamp: update.begin_timestamp,
        measurements: update.measurements.filter(|m| !m.is_empty()),
    };

    config
        .update_device(&update.name, changes)
        .with_context(|| format!("failed to update device {}", update.name))?;
    config
        .save(config_path)
        .context("failed to save configuration")?;

    println!("Updated device {}", update.name);
    Ok(())
}
