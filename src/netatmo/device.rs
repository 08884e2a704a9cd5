use anyhow::{Context as _, Result, bail};
use macaddr::MacAddr6;

use crate::netatmo::MeasurementType;

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,

    /// Sent verbatim as `device_id`; validated as a MAC address on construction.
    pub mac_address: String,

    /// Lower bound for the next fetch in Unix seconds, `None` for full history.
    pub begin_timestamp: Option<i64>,

    pub measurements: Vec<MeasurementType>,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        mac_address: impl Into<String>,
        begin_timestamp: Option<i64>,
        measurements: Vec<MeasurementType>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            bail!("device name is empty");
        }

        let mac_address = mac_address.into();
        validate_mac_address(&mac_address)
            .with_context(|| format!("invalid MAC address for device {name}"))?;

        Ok(Self {
            name,
            mac_address,
            begin_timestamp,
            measurements,
        })
    }
}

pub fn validate_mac_address(mac_address: &str) -> Result<MacAddr6> {
    mac_address
        .parse::<MacAddr6>()
        .with_context(|| format!("failed to parse MAC address: {mac_address}"))
}
