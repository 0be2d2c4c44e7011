//! Connect banner parsing.
//!
//! The device's CNXN payload has the form
//! `<systemtype>:<serial>:<key>=<value>;<key>=<value>;...`, usually with a
//! trailing NUL. The `features` value is a comma-separated list and must be
//! present.

use std::collections::{BTreeMap, HashSet};

use crate::error::{constants, AdbError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    raw: String,
    system_type: String,
    serial: String,
    properties: BTreeMap<String, String>,
    features: HashSet<String>,
}

impl Banner {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload);
        let raw = text.trim_end_matches('\0').to_string();

        let mut parts = raw.splitn(3, ':');
        let system_type = parts.next().unwrap_or_default().to_string();
        let (serial, props) = match (parts.next(), parts.next()) {
            (Some(serial), Some(props)) => (serial.to_string(), props),
            _ => {
                return Err(AdbError::InvalidBanner(format!(
                    "Expected '<type>:<serial>:<properties>', got {raw:?}"
                )))
            }
        };

        let properties: BTreeMap<String, String> = props
            .split(';')
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                entry
                    .split_once('=')
                    .map(|(key, value)| (key.to_string(), value.to_string()))
            })
            .collect();

        let features = properties
            .get("features")
            .ok_or_else(|| {
                AdbError::InvalidBanner(format!("{}: {raw:?}", constants::ERR_MISSING_FEATURES))
            })?
            .split(',')
            .filter(|feature| !feature.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            raw,
            system_type,
            serial,
            properties,
            features,
        })
    }

    pub fn supports_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Banner text with the trailing NUL removed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `device`, `recovery`, `bootloader`, `sideload`, ...
    pub fn system_type(&self) -> &str {
        &self.system_type
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn features(&self) -> &HashSet<String> {
        &self.features
    }
}
