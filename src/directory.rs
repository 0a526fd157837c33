//! Device directory: identity resolution and the managed charger inventory.
//!
//! The directory is the collaborator the core consults to turn a device id
//! into a manufacturer/model/transport address, and to enumerate the charge
//! points the DLM loop manages. It is built once from configuration and read
//! for the process lifetime.

use std::collections::HashMap;

use crate::regmap::DeviceKind;

/// Field-bus endpoint of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportAddress {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
}

/// Identity of one device as the directory knows it.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub id: String,
    pub manufacturer: String,
    pub model: String,
    pub kind: DeviceKind,
    pub address: TransportAddress,
}

/// One managed charge point: a charger device plus connector and capability.
#[derive(Debug, Clone)]
pub struct ChargePoint {
    pub device_id: String,
    pub connector_id: u16,
    /// Maximum hardware charging power (kW), a static capability.
    pub max_power_kw: f64,
}

/// In-memory device directory.
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    devices: HashMap<String, DeviceIdentity>,
    chargers: Vec<ChargePoint>,
    site_meter: String,
    battery: Option<String>,
}

impl DeviceDirectory {
    /// Creates a directory from resolved entries.
    ///
    /// `site_meter` names the device whose `active_power_total` point is the
    /// metered site load; `battery` optionally names a device for the
    /// observability-only state-of-charge snapshot.
    pub fn new(
        devices: Vec<DeviceIdentity>,
        chargers: Vec<ChargePoint>,
        site_meter: impl Into<String>,
        battery: Option<String>,
    ) -> Self {
        Self {
            devices: devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
            chargers,
            site_meter: site_meter.into(),
            battery,
        }
    }

    /// Resolves a device id, or `None` when the directory has no such device.
    pub fn identity(&self, device_id: &str) -> Option<&DeviceIdentity> {
        self.devices.get(device_id)
    }

    /// Charge points under DLM management, in configuration order.
    pub fn chargers(&self) -> &[ChargePoint] {
        &self.chargers
    }

    /// Device id of the site meter.
    pub fn site_meter(&self) -> &str {
        &self.site_meter
    }

    /// Device id of the battery used for the SoC snapshot, when present.
    pub fn battery(&self) -> Option<&str> {
        self.battery.as_deref()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, kind: DeviceKind) -> DeviceIdentity {
        DeviceIdentity {
            id: id.to_string(),
            manufacturer: "GridEye".to_string(),
            model: "MTR-3P".to_string(),
            kind,
            address: TransportAddress {
                host: "localhost".to_string(),
                port: 502,
                unit_id: 1,
            },
        }
    }

    #[test]
    fn identity_lookup_by_id() {
        let directory = DeviceDirectory::new(
            vec![identity("meter-main", DeviceKind::Meter)],
            Vec::new(),
            "meter-main",
            None,
        );
        assert!(directory.identity("meter-main").is_some());
        assert!(directory.identity("meter-aux").is_none());
    }

    #[test]
    fn chargers_keep_configuration_order() {
        let chargers = vec![
            ChargePoint {
                device_id: "charger-001".to_string(),
                connector_id: 1,
                max_power_kw: 11.0,
            },
            ChargePoint {
                device_id: "charger-002".to_string(),
                connector_id: 1,
                max_power_kw: 7.4,
            },
        ];
        let directory = DeviceDirectory::new(Vec::new(), chargers, "meter-main", None);
        let ids: Vec<&str> = directory
            .chargers()
            .iter()
            .map(|c| c.device_id.as_str())
            .collect();
        assert_eq!(ids, vec!["charger-001", "charger-002"]);
    }
}
