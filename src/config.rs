//! TOML-based site configuration and the builtin demo preset.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::directory::{ChargePoint, DeviceDirectory, DeviceIdentity, TransportAddress};
use crate::dlm::engine::DlmSettings;
use crate::dlm::types::{NoHeadroomPolicy, SessionStatus, SiteLoadPolicy};
use crate::regmap::{DeviceKind, RegisterMapRegistry};

/// Top-level configuration parsed from TOML.
///
/// All fields default to the demo site. Load from TOML with
/// [`SiteConfig::from_toml_file`] or use [`SiteConfig::demo`] for the
/// built-in preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Site-wide constraint and meter selection.
    #[serde(default)]
    pub site: SiteSection,
    /// DLM loop timing and policies.
    #[serde(default)]
    pub dlm: DlmSection,
    /// Simulated-site shape (ignored when running against real hardware).
    #[serde(default)]
    pub sim: SimSection,
    /// Device directory entries.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Site-wide constraint and meter selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Grid import ceiling (kW).
    pub import_limit_kw: f64,
    /// Device id of the meter providing `active_power_total`.
    pub meter_device: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            import_limit_kw: 50.0,
            meter_device: "meter-main".to_string(),
        }
    }
}

/// DLM loop timing and policies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DlmSection {
    /// Seconds between cycles.
    pub interval_secs: u64,
    /// Minimum trickle charging power (kW).
    pub min_charge_kw: f64,
    /// Allocation fallback when no headroom is available.
    pub no_headroom_policy: NoHeadroomPolicy,
    /// Cycle behavior when the site-load read fails.
    pub site_load_policy: SiteLoadPolicy,
    /// Budget for one whole cycle (ms); exceeding it abandons the cycle.
    pub cycle_budget_ms: u64,
    /// Timeout for each transport call (ms).
    pub transport_timeout_ms: u64,
}

impl Default for DlmSection {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            min_charge_kw: 1.4,
            no_headroom_policy: NoHeadroomPolicy::Trickle,
            site_load_policy: SiteLoadPolicy::FailCycle,
            cycle_budget_ms: 5_000,
            transport_timeout_ms: 500,
        }
    }
}

impl DlmSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cycle_budget(&self) -> Duration {
        Duration::from_millis(self.cycle_budget_ms)
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_timeout_ms)
    }
}

/// Simulated-site shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimSection {
    /// Scheduler ticks per simulated day (must be > 0).
    pub steps_per_day: usize,
    /// Baseline unmanaged consumption (kW).
    pub base_kw: f64,
    /// Sinusoidal amplitude of the unmanaged load (kW).
    pub amp_kw: f64,
    /// Phase offset (radians).
    pub phase_rad: f64,
    /// Gaussian noise standard deviation (kW).
    pub noise_std: f64,
    /// Peak PV generation (kW).
    pub pv_peak_kw: f64,
    /// Sunrise tick index (inclusive).
    pub sunrise_idx: usize,
    /// Sunset tick index (exclusive).
    pub sunset_idx: usize,
    /// Master random seed.
    pub seed: u64,
    /// Battery energy capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// Initial battery state of charge (%).
    pub initial_soc_pct: f64,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            steps_per_day: 96,
            base_kw: 12.0,
            amp_kw: 6.0,
            phase_rad: 1.2,
            noise_std: 0.2,
            pv_peak_kw: 6.0,
            sunrise_idx: 24,
            sunset_idx: 72,
            seed: 42,
            battery_capacity_kwh: 10.0,
            initial_soc_pct: 62.0,
        }
    }
}

/// One device directory entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub id: String,
    pub manufacturer: String,
    pub model: String,
    pub kind: DeviceKind,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Connector managed by the DLM (chargers only).
    #[serde(default = "default_connector")]
    pub connector_id: u16,
    /// Maximum hardware charging power (kW); required for chargers.
    #[serde(default)]
    pub max_power_kw: Option<f64>,
    /// Status the simulated charger starts in.
    #[serde(default = "default_status")]
    pub initial_status: SessionStatus,
    /// Charging power the simulated charger starts at (kW).
    #[serde(default)]
    pub initial_power_kw: f64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_connector() -> u16 {
    1
}

fn default_status() -> SessionStatus {
    SessionStatus::Preparing
}

impl DeviceConfig {
    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            id: self.id.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            kind: self.kind,
            address: TransportAddress {
                host: self.host.clone(),
                port: self.port,
                unit_id: self.unit_id,
            },
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config error: {field}: {message}")]
    Invalid { field: String, message: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::demo()
    }
}

impl SiteConfig {
    /// The built-in demo site: one meter, one battery, one PV inverter, and
    /// three charge points behind a 50 kW import ceiling.
    pub fn demo() -> Self {
        let charger = |n: u8, unit_id: u8, max_kw: f64, status: SessionStatus, power: f64| {
            DeviceConfig {
                id: format!("charger-00{n}"),
                manufacturer: "VoltEra".to_string(),
                model: "EVC-22".to_string(),
                kind: DeviceKind::EvCharger,
                host: "localhost".to_string(),
                port: 502,
                unit_id,
                connector_id: 1,
                max_power_kw: Some(max_kw),
                initial_status: status,
                initial_power_kw: power,
            }
        };
        Self {
            site: SiteSection::default(),
            dlm: DlmSection::default(),
            sim: SimSection::default(),
            devices: vec![
                DeviceConfig {
                    id: "meter-main".to_string(),
                    manufacturer: "GridEye".to_string(),
                    model: "MTR-3P".to_string(),
                    kind: DeviceKind::Meter,
                    host: "localhost".to_string(),
                    port: 502,
                    unit_id: 3,
                    connector_id: 1,
                    max_power_kw: None,
                    initial_status: SessionStatus::Available,
                    initial_power_kw: 0.0,
                },
                DeviceConfig {
                    id: "bms-01".to_string(),
                    manufacturer: "SafeCell".to_string(),
                    model: "BMS-X96".to_string(),
                    kind: DeviceKind::Bms,
                    host: "localhost".to_string(),
                    port: 502,
                    unit_id: 1,
                    connector_id: 1,
                    max_power_kw: None,
                    initial_status: SessionStatus::Available,
                    initial_power_kw: 0.0,
                },
                DeviceConfig {
                    id: "pv-inverter-01".to_string(),
                    manufacturer: "GenericSolarTech".to_string(),
                    model: "INV-5000".to_string(),
                    kind: DeviceKind::PvInverter,
                    host: "localhost".to_string(),
                    port: 502,
                    unit_id: 2,
                    connector_id: 1,
                    max_power_kw: None,
                    initial_status: SessionStatus::Available,
                    initial_power_kw: 0.0,
                },
                charger(1, 11, 11.0, SessionStatus::Charging, 7.2),
                charger(2, 12, 7.4, SessionStatus::Charging, 6.8),
                charger(3, 13, 22.0, SessionStatus::Available, 0.0),
            ],
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Checks the configuration against its constraints and the register
    /// catalog. Runs once at startup, before the control loop; any error
    /// here is fatal by design.
    pub fn validate(&self, registry: &RegisterMapRegistry) -> Result<(), ConfigError> {
        if self.site.import_limit_kw <= 0.0 {
            return Err(ConfigError::invalid("site.import_limit_kw", "must be > 0"));
        }
        if self.dlm.interval_secs == 0 {
            return Err(ConfigError::invalid("dlm.interval_secs", "must be > 0"));
        }
        if self.dlm.min_charge_kw < 0.0 {
            return Err(ConfigError::invalid("dlm.min_charge_kw", "must be >= 0"));
        }
        if self.dlm.cycle_budget_ms == 0 {
            return Err(ConfigError::invalid("dlm.cycle_budget_ms", "must be > 0"));
        }
        if self.dlm.transport_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "dlm.transport_timeout_ms",
                "must be > 0",
            ));
        }
        if self.sim.steps_per_day == 0 {
            return Err(ConfigError::invalid("sim.steps_per_day", "must be > 0"));
        }
        if self.sim.sunrise_idx >= self.sim.sunset_idx
            || self.sim.sunset_idx > self.sim.steps_per_day
        {
            return Err(ConfigError::invalid(
                "sim.sunrise_idx",
                "need sunrise < sunset <= steps_per_day",
            ));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.id.as_str()) {
                return Err(ConfigError::invalid(
                    "devices.id",
                    format!("duplicate device id `{}`", device.id),
                ));
            }
            if registry
                .lookup(&device.manufacturer, &device.model)
                .is_none()
            {
                return Err(ConfigError::invalid(
                    "devices.model",
                    format!(
                        "no register map for {}:{} (device `{}`)",
                        device.manufacturer, device.model, device.id
                    ),
                ));
            }
            if device.kind == DeviceKind::EvCharger
                && device.max_power_kw.filter(|kw| *kw > 0.0).is_none()
            {
                return Err(ConfigError::invalid(
                    "devices.max_power_kw",
                    format!("charger `{}` needs max_power_kw > 0", device.id),
                ));
            }
        }

        let meter = self
            .devices
            .iter()
            .find(|d| d.id == self.site.meter_device)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "site.meter_device",
                    format!("device `{}` is not configured", self.site.meter_device),
                )
            })?;
        if meter.kind != DeviceKind::Meter {
            return Err(ConfigError::invalid(
                "site.meter_device",
                format!("device `{}` is not a meter", meter.id),
            ));
        }
        Ok(())
    }

    /// Builds the device directory this configuration describes.
    pub fn directory(&self) -> DeviceDirectory {
        let identities = self.devices.iter().map(DeviceConfig::identity).collect();
        let chargers = self
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::EvCharger)
            .map(|d| ChargePoint {
                device_id: d.id.clone(),
                connector_id: d.connector_id,
                max_power_kw: d.max_power_kw.unwrap_or(0.0),
            })
            .collect();
        let battery = self
            .devices
            .iter()
            .find(|d| d.kind == DeviceKind::Bms)
            .map(|d| d.id.clone());
        DeviceDirectory::new(
            identities,
            chargers,
            self.site.meter_device.clone(),
            battery,
        )
    }

    /// DLM engine settings derived from this configuration.
    pub fn dlm_settings(&self) -> DlmSettings {
        DlmSettings {
            ceiling_kw: self.site.import_limit_kw,
            min_charge_kw: self.dlm.min_charge_kw,
            no_headroom_policy: self.dlm.no_headroom_policy,
            site_load_policy: self.dlm.site_load_policy,
        }
    }
}
