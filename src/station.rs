use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    export::Exporter,
    netatmo::{
        AccessToken, Device, MeasureApi, MeasureError, MeasureRequest, MeasurementType, TimeSeries,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    Idle,
    Fetching,
    Populated,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Incremental,

    FullHistory,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Populated { records: usize },

    Empty,

    Failed {
        measurement: MeasurementType,
        error: MeasureError,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Populated { .. })
    }
}

#[derive(Debug)]
pub struct Station {
    device: Device,
    series: TimeSeries,
    state: StationState,
    exported: Option<PathBuf>,
}

impl Station {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            series: TimeSeries::new(),
            state: StationState::Idle,
            exported: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.device.name
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn state(&self) -> StationState {
        self.state
    }

    pub fn exported(&self) -> Option<&Path> {
        self.exported.as_deref()
    }

    /// The series is rebuilt from scratch. The first failed request ends the
    /// pass, leaving whatever the earlier types returned in the series.
    pub async fn retrieve<A>(
        &mut self,
        api: &A,
        token: &AccessToken,
        mode: FetchMode,
    ) -> FetchOutcome
    where
        A: MeasureApi + ?Sized,
    {
        self.state = StationState::Fetching;
        self.series.clear();
        self.exported = None;

        if mode == FetchMode::FullHistory {
            self.device.begin_timestamp = None;
        }

        for measurement in &self.device.measurements {
            let request = MeasureRequest {
                device_id: &self.device.mac_address,
                measurement,
                date_begin: self.device.begin_timestamp,
            };

            match api.get_measure(token, &request).await {
                Ok(points) => self.series.merge(measurement, points, &self.device.measurements),
                Err(error) => {
                    warn!(
                        device = %self.device.name,
                        %measurement,
                        "unable to retrieve data: {error}"
                    );
                    self.state = StationState::Failed;
                    return FetchOutcome::Failed {
                        measurement: measurement.clone(),
                        error,
                    };
                }
            }
        }

        if self.series.is_empty() {
            warn!(device = %self.device.name, "no data retrieved");
            self.state = StationState::Failed;
            return FetchOutcome::Empty;
        }

        match mode {
            FetchMode::Incremental => info!(device = %self.device.name, "data retrieved"),
            FetchMode::FullHistory => info!(
                device = %self.device.name,
                "data retrieved without specifying a begin timestamp"
            ),
        }

        self.state = StationState::Populated;
        FetchOutcome::Populated {
            records: self.series.len(),
        }
    }

    pub fn export(&mut self, exporter: &Exporter) -> Result<PathBuf> {
        if self.state != StationState::Populated {
            bail!("device {} has no retrieved data to export", self.device.name);
        }
        if let Some(path) = &self.exported {
            bail!("device {} was already exported to {:?}", self.device.name, path);
        }

        let path = exporter.export(&self.device.name, &self.device.measurements, &self.series)?;
        info!(device = %self.device.name, path = ?path, "data exported");

        self.exported = Some(path.clone());
        Ok(path)
    }

    /// Does nothing unless the last fetch pass populated the series.
    pub fn advance_checkpoint(&mut self, config: &mut Config) -> Result<()> {
        if self.state != StationState::Populated {
            return Ok(());
        }

        let Some(last) = self.series.last_timestamp() else {
            return Ok(());
        };

        self.device.begin_timestamp = Some(last);
        config.set_begin_timestamp(&self.device.name, Some(last))
    }

    pub async fn retrieve_and_export<A>(
        &mut self,
        api: &A,
        token: &AccessToken,
        mode: FetchMode,
        exporter: &Exporter,
    ) -> bool
    where
        A: MeasureApi + ?Sized,
    {
        if !self.retrieve(api, token, mode).await.is_success() {
            return false;
        }

        match self.export(exporter) {
            Ok(_) => true,
            Err(e) => {
                error!(device = %self.device.name, "failed to export data: {e:#}");
                self.state = StationState::Failed;
                false
            }
        }
    }
}
