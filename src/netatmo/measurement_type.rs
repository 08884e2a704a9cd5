use std::{fmt, str::FromStr};

use anyhow::{Error, bail};
use serde::{Deserialize, Serialize};

/// Measurement types assigned to a device when none are given.
pub const DEFAULT_MEASUREMENTS: [&str; 5] = ["temperature", "co2", "humidity", "pressure", "noise"];

/// A `type` understood by the getmeasure endpoint, e.g. `temperature` or `sum_rain`.
///
/// The upstream set is open-ended, so this is a validated string rather than an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeasurementType(String);

impl MeasurementType {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn defaults() -> Vec<MeasurementType> {
        DEFAULT_MEASUREMENTS
            .iter()
            .map(|m| MeasurementType(m.to_string()))
            .collect()
    }
}

impl FromStr for MeasurementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            bail!("measurement type is empty");
        }

        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("invalid measurement type: {}", s);
        }

        Ok(MeasurementType(s.to_string()))
    }
}

impl TryFrom<String> for MeasurementType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MeasurementType> for String {
    fn from(value: MeasurementType) -> Self {
        value.0
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
