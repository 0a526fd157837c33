//! Deterministic site model: base load, PV, battery, chargers.
//!
//! Pure state-stepping with no transport in sight, so the physics is
//! unit-testable on its own. The transport layer feeds written setpoints in
//! and stores the produced readings back into register banks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimSection;
use crate::dlm::types::SessionStatus;

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// One simulated charge point.
#[derive(Debug, Clone)]
pub struct SimCharger {
    pub device_id: String,
    pub status: SessionStatus,
    /// Momentary charging power (kW).
    pub power_kw: f64,
    pub max_power_kw: f64,
}

/// Setpoints the control loop wrote since the previous step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepSetpoints {
    /// Written charger limit (kW); `None` when no limit was ever written.
    pub charger_limit_kw: Option<f64>,
}

/// Readings produced by one model step.
#[derive(Debug, Clone)]
pub struct SiteReadings {
    /// Unmanaged base consumption (kW).
    pub base_kw: f64,
    /// PV generation (kW, positive).
    pub pv_kw: f64,
    /// Battery power (kW, charge > 0).
    pub battery_kw: f64,
    pub battery_soc_pct: f64,
    /// Net site load at the meter (kW).
    pub meter_kw: f64,
    /// Charging power per charger, in charger order (kW).
    pub charger_power_kw: Vec<f64>,
}

/// Evolving state of the simulated site.
#[derive(Debug)]
pub struct SiteState {
    cfg: SimSection,
    rng: StdRng,
    step: u64,
    battery_soc_pct: f64,
    chargers: Vec<SimCharger>,
}

impl SiteState {
    pub fn new(cfg: SimSection, chargers: Vec<SimCharger>) -> Self {
        let rng = StdRng::seed_from_u64(cfg.seed);
        let battery_soc_pct = cfg.initial_soc_pct;
        Self {
            cfg,
            rng,
            step: 0,
            battery_soc_pct,
            chargers,
        }
    }

    pub fn chargers(&self) -> &[SimCharger] {
        &self.chargers
    }

    fn day_fraction(&self) -> f64 {
        let spd = self.cfg.steps_per_day as f64;
        (self.step % self.cfg.steps_per_day as u64) as f64 / spd
    }

    fn pv_kw(&self) -> f64 {
        let t = (self.step % self.cfg.steps_per_day as u64) as f64;
        let sunrise = self.cfg.sunrise_idx as f64;
        let sunset = self.cfg.sunset_idx as f64;
        if t < sunrise || t >= sunset {
            return 0.0;
        }
        let daylight = (t - sunrise) / (sunset - sunrise);
        (std::f64::consts::PI * daylight).sin().max(0.0) * self.cfg.pv_peak_kw
    }

    fn base_kw(&mut self) -> f64 {
        let angle = 2.0 * std::f64::consts::PI * self.day_fraction() + self.cfg.phase_rad;
        let noise = gaussian_noise(&mut self.rng, self.cfg.noise_std);
        (self.cfg.base_kw + self.cfg.amp_kw * angle.sin() + noise).max(0.0)
    }

    /// Steps each charger halfway toward its target: the written limit when
    /// one exists, capped by hardware; zero outside a manageable session.
    fn step_chargers(&mut self, setpoints: &[StepSetpoints]) {
        for (charger, sp) in self.chargers.iter_mut().zip(setpoints) {
            let target = if charger.status.is_manageable() {
                sp.charger_limit_kw
                    .unwrap_or(charger.max_power_kw)
                    .clamp(0.0, charger.max_power_kw)
            } else {
                0.0
            };
            charger.power_kw += (target - charger.power_kw) * 0.5;
            if (charger.power_kw - target).abs() < 1e-3 {
                charger.power_kw = target;
            }
            // A vehicle that starts drawing power has begun its session.
            if charger.status == SessionStatus::Preparing && charger.power_kw > 0.1 {
                charger.status = SessionStatus::Charging;
            }
        }
    }

    /// Integrates battery SoC from the written charge/discharge setpoints,
    /// with the round-trip losses applied on the respective leg.
    fn step_battery(&mut self, charge_kw: f64, discharge_kw: f64) -> f64 {
        let net_kw = charge_kw.max(0.0) - discharge_kw.max(0.0);
        let dt_hours = 24.0 / self.cfg.steps_per_day as f64;
        let energy_kwh = if net_kw > 0.0 {
            net_kw * dt_hours * 0.95
        } else {
            net_kw * dt_hours / 0.90
        };
        let delta_pct = energy_kwh / self.cfg.battery_capacity_kwh * 100.0;
        self.battery_soc_pct = (self.battery_soc_pct + delta_pct).clamp(0.0, 100.0);
        net_kw
    }

    /// Advances the model one step and returns the new site readings.
    ///
    /// `charger_setpoints` is aligned with [`SiteState::chargers`];
    /// `battery_charge_kw`/`battery_discharge_kw` are the setpoints last
    /// written to the battery's limit registers.
    pub fn advance(
        &mut self,
        charger_setpoints: &[StepSetpoints],
        battery_charge_kw: f64,
        battery_discharge_kw: f64,
    ) -> SiteReadings {
        self.step += 1;

        let base_kw = self.base_kw();
        let pv_kw = self.pv_kw();
        self.step_chargers(charger_setpoints);
        let battery_kw = self.step_battery(battery_charge_kw, battery_discharge_kw);

        let charger_power_kw: Vec<f64> = self.chargers.iter().map(|c| c.power_kw).collect();
        let ev_kw: f64 = charger_power_kw.iter().sum();
        let meter_kw = base_kw + ev_kw + battery_kw - pv_kw;

        SiteReadings {
            base_kw,
            pv_kw,
            battery_kw,
            battery_soc_pct: self.battery_soc_pct,
            meter_kw,
            charger_power_kw,
        }
    }
}
