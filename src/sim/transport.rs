//! Simulated transport: the wire contract served from register banks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::warn;

use crate::codec::PointValue;
use crate::config::SiteConfig;
use crate::directory::DeviceIdentity;
use crate::regmap::catalog::{
    BATTERY_SOC, CHARGER_ACTIVE_POWER, CHARGER_LIMIT, CHARGER_STATUS, METER_ACTIVE_POWER,
};
use crate::regmap::{DeviceKind, RegisterClass, RegisterMapRegistry};
use crate::transport::{Transport, TransportError};

use super::bank::RegisterBank;
use super::site::{SimCharger, SiteState, StepSetpoints};

#[derive(Debug, Clone)]
struct SimDevice {
    id: String,
    manufacturer: String,
    model: String,
    kind: DeviceKind,
}

struct SimInner {
    banks: HashMap<String, RegisterBank>,
    site: SiteState,
    devices: Vec<SimDevice>,
}

/// Transport implementation backed by in-memory register banks and the
/// deterministic site model.
///
/// The single interior lock serializes every register operation, which more
/// than satisfies the per-device serialization the transport contract
/// requires. [`SimTransport::advance`] steps the model and refreshes the
/// banks; the scheduler calls it once before each cycle.
pub struct SimTransport {
    registry: Arc<RegisterMapRegistry>,
    inner: Mutex<SimInner>,
}

impl SimTransport {
    pub fn new(registry: Arc<RegisterMapRegistry>, config: &SiteConfig) -> Self {
        let devices: Vec<SimDevice> = config
            .devices
            .iter()
            .map(|d| SimDevice {
                id: d.id.clone(),
                manufacturer: d.manufacturer.clone(),
                model: d.model.clone(),
                kind: d.kind,
            })
            .collect();

        let chargers: Vec<SimCharger> = config
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::EvCharger)
            .map(|d| SimCharger {
                device_id: d.id.clone(),
                status: d.initial_status,
                power_kw: d.initial_power_kw,
                max_power_kw: d.max_power_kw.unwrap_or(0.0),
            })
            .collect();

        let mut banks = HashMap::new();
        for device in &config.devices {
            let mut bank = RegisterBank::new();
            if let Some(map) = registry.lookup(&device.manufacturer, &device.model) {
                for def in map.registers() {
                    // Writable setpoints start absent: "no limit written yet"
                    // is observable as a missing register, not as zero.
                    if def.writable {
                        continue;
                    }
                    let initial = match def.name.as_str() {
                        BATTERY_SOC => PointValue::Number(config.sim.initial_soc_pct),
                        CHARGER_STATUS => {
                            PointValue::Number(f64::from(device.initial_status.code()))
                        }
                        CHARGER_ACTIVE_POWER => {
                            PointValue::Number(device.initial_power_kw * 1000.0)
                        }
                        "voltage" => PointValue::Number(51.2),
                        "voltage_l1" | "voltage_l2" | "voltage_l3" | "ac_voltage" => {
                            PointValue::Number(230.0)
                        }
                        "frequency" => PointValue::Number(50.0),
                        "soh" => PointValue::Number(100.0),
                        _ => PointValue::Number(0.0),
                    };
                    if let Err(err) = bank.store(def, &initial) {
                        warn!(device = %device.id, point = %def.name, %err, "seed failed");
                    }
                }
            }
            banks.insert(device.id.clone(), bank);
        }

        Self {
            registry,
            inner: Mutex::new(SimInner {
                banks,
                site: SiteState::new(config.sim.clone(), chargers),
                devices,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimInner> {
        // Poisoning only means a panic elsewhere; the register image itself
        // stays usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_point(&self, inner: &SimInner, device: &SimDevice, point: &str) -> Option<f64> {
        let map = self.registry.lookup(&device.manufacturer, &device.model)?;
        let def = map.register(point)?;
        let bank = inner.banks.get(&device.id)?;
        bank.load(def).ok()?.as_f64()
    }

    /// Advances the site model one step and refreshes every device's
    /// registers from the new readings.
    pub fn advance(&self) {
        let mut inner = self.lock();

        // Collect the setpoints the control loop wrote since the last step.
        let charger_devices: Vec<SimDevice> = inner
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::EvCharger)
            .cloned()
            .collect();
        let setpoints: Vec<StepSetpoints> = charger_devices
            .iter()
            .map(|d| StepSetpoints {
                charger_limit_kw: self
                    .load_point(&inner, d, CHARGER_LIMIT)
                    .map(|w| w / 1000.0),
            })
            .collect();
        let battery_device = inner
            .devices
            .iter()
            .find(|d| d.kind == DeviceKind::Bms)
            .cloned();
        let (battery_charge_kw, battery_discharge_kw) = battery_device
            .as_ref()
            .map(|d| {
                (
                    self.load_point(&inner, d, "charge_limit_kw").unwrap_or(0.0),
                    self.load_point(&inner, d, "discharge_limit_kw")
                        .unwrap_or(0.0),
                )
            })
            .unwrap_or((0.0, 0.0));

        let SimInner {
            banks,
            site,
            devices,
        } = &mut *inner;
        let readings = site.advance(&setpoints, battery_charge_kw, battery_discharge_kw);

        let mut store = |device: &SimDevice, point: &str, value: PointValue| {
            let Some(map) = self.registry.lookup(&device.manufacturer, &device.model) else {
                return;
            };
            let Some(def) = map.register(point) else {
                return;
            };
            let Some(bank) = banks.get_mut(&device.id) else {
                return;
            };
            if let Err(err) = bank.store(def, &value) {
                warn!(device = %device.id, point, %err, "sim store failed");
            }
        };

        let mut charger_index = 0usize;
        for device in devices.iter() {
            match device.kind {
                DeviceKind::Meter => store(
                    device,
                    METER_ACTIVE_POWER,
                    PointValue::Number(readings.meter_kw * 1000.0),
                ),
                DeviceKind::PvInverter => store(
                    device,
                    "ac_power",
                    PointValue::Number(readings.pv_kw * 1000.0),
                ),
                DeviceKind::Bms => store(
                    device,
                    BATTERY_SOC,
                    PointValue::Number(readings.battery_soc_pct),
                ),
                DeviceKind::EvCharger => {
                    let charger = &site.chargers()[charger_index];
                    store(
                        device,
                        CHARGER_ACTIVE_POWER,
                        PointValue::Number(readings.charger_power_kw[charger_index] * 1000.0),
                    );
                    store(
                        device,
                        CHARGER_STATUS,
                        PointValue::Number(f64::from(charger.status.code())),
                    );
                    charger_index += 1;
                }
            }
        }
    }

    /// Enables or disables wire-write faults on one device.
    pub fn set_write_fault(&self, device_id: &str, fail: bool) {
        let mut inner = self.lock();
        if let Some(bank) = inner.banks.get_mut(device_id) {
            bank.set_fail_writes(fail);
        }
    }

    /// Enables or disables wire-read faults on one device.
    pub fn set_read_fault(&self, device_id: &str, fail: bool) {
        let mut inner = self.lock();
        if let Some(bank) = inner.banks.get_mut(device_id) {
            bank.set_fail_reads(fail);
        }
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn read_raw(
        &self,
        device: &DeviceIdentity,
        address: u16,
        count: u16,
        class: RegisterClass,
    ) -> Result<Vec<u8>, TransportError> {
        let inner = self.lock();
        let bank = inner.banks.get(&device.id).ok_or_else(|| {
            TransportError::Protocol(format!("unknown device `{}`", device.id))
        })?;
        bank.read(class, address, count)
    }

    async fn write_raw(
        &self,
        device: &DeviceIdentity,
        address: u16,
        class: RegisterClass,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let mut inner = self.lock();
        let bank = inner.banks.get_mut(&device.id).ok_or_else(|| {
            TransportError::Protocol(format!("unknown device `{}`", device.id))
        })?;
        bank.write(class, address, bytes)
    }
}
