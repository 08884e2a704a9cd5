use std::{fs, path::Path};

use anyhow::{Context as _, Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::{Map, Value, ser::PrettyFormatter};

use crate::netatmo::{Device, MeasurementType, validate_mac_address};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub devices: IndexMap<String, DeviceEntry>,

    /// Keys this crate does not use, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub mac_address: String,

    #[serde(default, deserialize_with = "deserialize_begin_timestamp")]
    pub begin_timestamp: Option<i64>,

    #[serde(default)]
    pub measurements: Vec<MeasurementType>,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceUpdate {
    pub name: Option<String>,

    pub mac_address: Option<String>,

    pub begin_timestamp: Option<i64>,

    pub measurements: Option<Vec<MeasurementType>>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path:?}"))?;

        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file: {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)
            .context("failed to serialize config")?;
        buf.push(b'\n');

        fs::write(path, buf).with_context(|| format!("failed to write config file: {path:?}"))
    }

    pub fn devices(&self) -> Result<Vec<Device>> {
        self.devices
            .iter()
            .map(|(name, entry)| {
                Device::new(
                    name.clone(),
                    entry.mac_address.clone(),
                    entry.begin_timestamp,
                    entry.measurements.clone(),
                )
                .with_context(|| format!("invalid device entry: {name}"))
            })
            .collect()
    }

    pub fn set_begin_timestamp(&mut self, name: &str, begin_timestamp: Option<i64>) -> Result<()> {
        let Some(entry) = self.devices.get_mut(name) else {
            bail!("device {} does not exist in the configuration", name);
        };

        entry.begin_timestamp = begin_timestamp;
        Ok(())
    }

    pub fn add_device(&mut self, name: &str, entry: DeviceEntry) -> Result<()> {
        if self.devices.contains_key(name) {
            bail!("device {} already exists in the configuration", name);
        }

        validate_mac_address(&entry.mac_address)?;
        self.devices.insert(name.to_string(), entry);
        Ok(())
    }

    pub fn remove_device(&mut self, name: &str) -> Result<DeviceEntry> {
        match self.devices.shift_remove(name) {
            Some(entry) => Ok(entry),
            None => bail!("device {} does not exist in the configuration", name),
        }
    }

    pub fn update_device(&mut self, name: &str, update: DeviceUpdate) -> Result<()> {
        let Some(index) = self.devices.get_index_of(name) else {
            bail!("device {} does not exist in the configuration", name);
        };

        if let Some(mac_address) = &update.mac_address {
            validate_mac_address(mac_address)?;
        }

        if let Some(new_name) = &update.name
            && new_name != name
            && self.devices.contains_key(new_name.as_str())
        {
            bail!("device {} already exists in the configuration", new_name);
        }

        let Some((_, mut entry)) = self.devices.shift_remove_index(index) else {
            bail!("device {} does not exist in the configuration", name);
        };

        if let Some(mac_address) = update.mac_address {
            entry.mac_address = mac_address;
        }
        if let Some(begin_timestamp) = update.begin_timestamp {
            entry.begin_timestamp = Some(begin_timestamp);
        }
        if let Some(measurements) = update.measurements {
            entry.measurements = measurements;
        }

        let name = update.name.unwrap_or_else(|| name.to_string());
        self.devices.shift_insert(index, name, entry);
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Integer(i64),
    Text(String),
}

/// Accepts an integer, a decimal string, `"null"` or `null`.
fn deserialize_begin_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawTimestamp::Integer(ts)) => Ok(Some(ts)),
        Some(RawTimestamp::Text(s)) => {
            let s = s.trim();
            if s.is_empty() || s == "null" {
                return Ok(None);
            }

            s.parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid begin_timestamp: {s}")))
        }
    }
}
