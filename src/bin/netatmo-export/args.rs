use std::path::PathBuf;

use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};
use netatmo_export::{
    fleet::DEFAULT_CONCURRENCY,
    netatmo::{Credentials, DEFAULT_BASE_URL, DEFAULT_SCOPE, MeasurementType},
};

#[derive(Debug, Parser)]
#[command(version, about = "Export Netatmo weather station measurements to CSV files")]
pub struct Args {
    #[arg(long, env = "NETATMO_CONFIG", default_value = "config.json", global = true)]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every configured device and export the data to CSV
    Fetch(FetchArgs),

    /// Add a device to the configuration file
    AddDevice(AddDeviceArgs),

    /// Remove a device from the configuration file
    RemoveDevice {
        #[arg(long)]
        name: String,
    },

    /// Change fields of a configured device
    UpdateDevice(UpdateDeviceArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetryMode {
    Ask,
    Always,
    Never,
}

#[derive(Debug, clap::Args)]
pub struct FetchArgs {
    #[arg(long, env = "TZ")]
    pub timezone: Tz,

    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, env = "NETATMO_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Per-request timeout
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Maximum number of devices fetched at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Whether to refetch failed devices without a begin timestamp
    #[arg(long, value_enum, default_value_t = RetryMode::Ask)]
    pub retry: RetryMode,

    #[arg(long, env = "NETATMO_CLIENT_ID")]
    pub client_id: String,

    #[arg(long, env = "NETATMO_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    #[arg(long, env = "NETATMO_USERNAME")]
    pub username: String,

    #[arg(long, env = "NETATMO_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long, default_value = DEFAULT_SCOPE)]
    pub scope: String,
}

impl FetchArgs {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            scope: self.scope.clone(),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct AddDeviceArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub mac_address: String,

    /// Unix seconds, defaults to now
    #[arg(long)]
    pub begin_timestamp: Option<i64>,

    /// Comma separated, defaults to temperature,co2,humidity,pressure,noise
    #[arg(long, value_delimiter = ',')]
    pub measurements: Option<Vec<MeasurementType>>,
}

#[derive(Debug, clap::Args)]
pub struct UpdateDeviceArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub new_name: Option<String>,

    #[arg(long)]
    pub mac_address: Option<String>,

    #[arg(long)]
    pub begin_timestamp: Option<i64>,

    #[arg(long, value_delimiter = ',')]
    pub measurements: Option<Vec<MeasurementType>>,
}
