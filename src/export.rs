use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow, bail};
use chrono::DateTime;
use chrono_tz::Tz;
use csv::WriterBuilder;

use crate::netatmo::{MeasurementType, TimeSeries};

const FILE_NAME_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const ROW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes merged series as headerless CSV files named after the device and time range.
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    timezone: Tz,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            output_dir: output_dir.into(),
            timezone,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes one row per timestamp: local time, then one value per entry of
    /// `measurements`. Returns the path of the new file.
    pub fn export(
        &self,
        device_name: &str,
        measurements: &[MeasurementType],
        series: &TimeSeries,
    ) -> Result<PathBuf> {
        let (Some(start), Some(end)) = (series.first_timestamp(), series.last_timestamp()) else {
            bail!("no measurements to export for device {device_name}");
        };

        let path = self
            .output_dir
            .join(export_file_name(device_name, start, end, self.timezone)?);

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("failed to create CSV file: {path:?}"))?;

        for (&timestamp, record) in series {
            let mut row = Vec::with_capacity(measurements.len() + 1);
            row.push(format_local(timestamp, self.timezone, ROW_TIME_FORMAT)?);
            for measurement in measurements {
                let value = record.get(measurement).copied().unwrap_or_default();
                row.push(value.to_string());
            }

            writer
                .write_record(&row)
                .with_context(|| format!("failed to write CSV row: {path:?}"))?;
        }

        writer
            .flush()
            .with_context(|| format!("failed to flush CSV file: {path:?}"))?;

        Ok(path)
    }
}

/// `output_{device}_{start:YYYYMMDDHHMMSS}_{end:YYYYMMDDHHMMSS}.csv`
pub fn export_file_name(device_name: &str, start: i64, end: i64, timezone: Tz) -> Result<String> {
    Ok(format!(
        "output_{}_{}_{}.csv",
        device_name,
        format_local(start, timezone, FILE_NAME_TIME_FORMAT)?,
        format_local(end, timezone, FILE_NAME_TIME_FORMAT)?,
    ))
}

fn format_local(timestamp: i64, timezone: Tz, format: &str) -> Result<String> {
    let utc = DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| anyhow!("timestamp out of range: {timestamp}"))?;

    Ok(utc.with_timezone(&timezone).format(format).to_string())
}
