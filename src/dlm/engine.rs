//! The DLM control engine: one cycle of read → allocate → command.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::codec::{CodecError, DataPointCodec, PointValue};
use crate::directory::{ChargePoint, DeviceDirectory};
use crate::regmap::catalog::{
    BATTERY_SOC, CHARGER_ACTIVE_POWER, CHARGER_LIMIT, CHARGER_STATUS, METER_ACTIVE_POWER,
};
use crate::transport::Transport;

use super::allocation::proportional_allocations;
use super::profile::{ChargingProfile, LimitCommand};
use super::types::{
    ChargerSession, CycleSummary, NoHeadroomPolicy, SessionDecision, SessionStatus, SiteLoadPolicy,
};

/// Control parameters for the DLM loop.
#[derive(Debug, Clone)]
pub struct DlmSettings {
    /// Site import ceiling (kW) the loop must never knowingly exceed.
    pub ceiling_kw: f64,
    /// Minimum trickle power (kW) under the trickle policy.
    pub min_charge_kw: f64,
    pub no_headroom_policy: NoHeadroomPolicy,
    pub site_load_policy: SiteLoadPolicy,
}

/// Why one charger's session state could not be established this cycle.
#[derive(Debug, Error)]
enum SessionReadError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("unknown status code {0}")]
    UnknownStatus(u16),
    #[error("status register returned a non-numeric value")]
    NonNumericStatus,
}

/// Dynamic load management engine.
///
/// Two states: Idle between cycles and Running while one is in flight. A
/// cycle is the atomic unit of work and always ends back in Idle; an error
/// aborts the current cycle only, which is reported through the summary, and
/// the loop continues on the next scheduled tick. The engine never halts.
pub struct DlmEngine<T: Transport> {
    codec: DataPointCodec<T>,
    directory: Arc<DeviceDirectory>,
    settings: DlmSettings,
    /// Limit applied by the last successful command per (device, connector).
    /// Only updated on success, so a failed session keeps its previous limit.
    last_limits: HashMap<(String, u16), f64>,
    last_site_load_kw: Option<f64>,
    cycles: u64,
}

impl<T: Transport> DlmEngine<T> {
    pub fn new(
        codec: DataPointCodec<T>,
        directory: Arc<DeviceDirectory>,
        settings: DlmSettings,
    ) -> Self {
        Self {
            codec,
            directory,
            settings,
            last_limits: HashMap::new(),
            last_site_load_kw: None,
            cycles: 0,
        }
    }

    /// Cycles started so far, including one currently in flight.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn settings(&self) -> &DlmSettings {
        &self.settings
    }

    /// Runs one full control cycle and returns its structured summary.
    ///
    /// Never fails as a whole: degraded inputs and per-session command
    /// failures are recorded in the summary and isolated from one another.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        self.cycles += 1;
        let cycle = self.cycles;
        let ceiling_kw = self.settings.ceiling_kw;
        let mut errors = Vec::new();

        // 1–2. Ceiling is configuration; site load is a live read that may
        // degrade per policy.
        let metered_load_kw = match self.read_site_load().await {
            Ok(kw) => {
                self.last_site_load_kw = Some(kw);
                Some(kw)
            }
            Err(err) => {
                warn!(cycle, %err, "site load read failed");
                errors.push(format!("site load: {err}"));
                match self.settings.site_load_policy {
                    SiteLoadPolicy::FailCycle => None,
                    SiteLoadPolicy::LastKnown => {
                        if self.last_site_load_kw.is_none() {
                            errors.push("no last known site load to fall back on".to_string());
                        }
                        self.last_site_load_kw
                    }
                    SiteLoadPolicy::Zero => Some(0.0),
                }
            }
        };
        let Some(metered_load_kw) = metered_load_kw else {
            let mut summary = CycleSummary::aborted(cycle, ceiling_kw, "site load unavailable");
            summary.errors.extend(errors);
            return summary;
        };

        let battery_soc = self.read_battery_soc().await;

        // 3. Enumerate sessions; keep only the manageable ones.
        let directory = Arc::clone(&self.directory);
        let mut sessions = Vec::new();
        for charge_point in directory.chargers() {
            match self.read_session(charge_point).await {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    warn!(device = %charge_point.device_id, %err, "session read failed");
                    errors.push(format!("session {}: {err}", charge_point.device_id));
                }
            }
        }
        sessions.retain(|s| s.status.is_manageable());

        // 4. Nothing to manage: end the cycle with no commands.
        if sessions.is_empty() {
            info!(cycle, metered_load_kw, "no charging sessions require management");
            return CycleSummary {
                cycle,
                ceiling_kw,
                metered_load_kw: Some(metered_load_kw),
                ev_load_kw: 0.0,
                base_load_kw: Some(metered_load_kw),
                headroom_kw: Some(ceiling_kw - metered_load_kw),
                battery_soc,
                sessions: Vec::new(),
                errors,
                aborted: false,
            };
        }

        // 5–8. The meter includes the managed EV load; peel it off to get the
        // base load the chargers cannot influence, then the EV headroom.
        let ev_load_kw: f64 = sessions.iter().map(|s| s.current_power_kw).sum();
        let base_load_kw = metered_load_kw - ev_load_kw;
        let headroom_kw = ceiling_kw - base_load_kw;

        // 9. Allocate.
        let allocations = proportional_allocations(
            headroom_kw,
            &sessions,
            self.settings.no_headroom_policy,
            self.settings.min_charge_kw,
        );

        // 10. Issue limit commands; one failure never blocks the rest.
        let mut decisions = Vec::with_capacity(sessions.len());
        for (session, allocated_kw) in sessions.iter().zip(allocations) {
            let limit_w = (allocated_kw * 1000.0).round() as u32;
            let profile_id = (cycle as u32).wrapping_mul(100) + u32::from(session.connector_id);
            let command = LimitCommand {
                device_id: session.device_id.clone(),
                connector_id: session.connector_id,
                profile: ChargingProfile::absolute_limit(profile_id, limit_w),
            };

            let (applied, error) = match self.issue(&command).await {
                Ok(()) => {
                    info!(
                        device = %session.device_id,
                        connector = session.connector_id,
                        limit_w,
                        "applied charging limit"
                    );
                    self.last_limits.insert(
                        (session.device_id.clone(), session.connector_id),
                        allocated_kw,
                    );
                    (true, None)
                }
                Err(err) => {
                    error!(device = %session.device_id, %err, "limit command failed");
                    errors.push(format!("command {}: {err}", session.device_id));
                    (false, Some(err.to_string()))
                }
            };

            decisions.push(SessionDecision {
                device_id: session.device_id.clone(),
                connector_id: session.connector_id,
                status: session.status,
                current_power_kw: session.current_power_kw,
                max_power_kw: session.max_power_kw,
                allocated_kw,
                limit_w,
                applied,
                error,
            });
        }

        // 11. Structured summary for observability.
        info!(
            cycle,
            ceiling_kw,
            metered_load_kw,
            ev_load_kw,
            base_load_kw,
            headroom_kw,
            sessions = decisions.len(),
            failures = decisions.iter().filter(|d| !d.applied).count(),
            "cycle complete"
        );

        CycleSummary {
            cycle,
            ceiling_kw,
            metered_load_kw: Some(metered_load_kw),
            ev_load_kw,
            base_load_kw: Some(base_load_kw),
            headroom_kw: Some(headroom_kw),
            battery_soc,
            sessions: decisions,
            errors,
            aborted: false,
        }
    }

    /// Reads the metered site load from the configured meter (kW).
    async fn read_site_load(&self) -> Result<f64, CodecError> {
        let read = self
            .codec
            .read_point(self.directory.site_meter(), METER_ACTIVE_POWER)
            .await?;
        // The meter reports watts.
        Ok(read.value.as_f64().unwrap_or(0.0) / 1000.0)
    }

    /// Battery SoC snapshot for the cycle record; observability only, so a
    /// failure degrades to `None` instead of touching the cycle.
    async fn read_battery_soc(&self) -> Option<f64> {
        let battery_id = self.directory.battery()?;
        match self.codec.read_point(battery_id, BATTERY_SOC).await {
            Ok(read) => read.value.as_f64(),
            Err(err) => {
                warn!(device = battery_id, %err, "battery SoC read failed");
                None
            }
        }
    }

    /// Builds the live session state for one charge point.
    async fn read_session(
        &self,
        charge_point: &ChargePoint,
    ) -> Result<ChargerSession, SessionReadError> {
        let status_read = self
            .codec
            .read_point(&charge_point.device_id, CHARGER_STATUS)
            .await?;
        let code = status_read
            .value
            .as_f64()
            .ok_or(SessionReadError::NonNumericStatus)?
            .round() as u16;
        let status =
            SessionStatus::from_code(code).ok_or(SessionReadError::UnknownStatus(code))?;

        let power_read = self
            .codec
            .read_point(&charge_point.device_id, CHARGER_ACTIVE_POWER)
            .await?;
        let current_power_kw = power_read.value.as_f64().unwrap_or(0.0) / 1000.0;

        Ok(ChargerSession {
            device_id: charge_point.device_id.clone(),
            connector_id: charge_point.connector_id,
            current_power_kw,
            max_power_kw: charge_point.max_power_kw,
            last_limit_kw: self
                .last_limits
                .get(&(charge_point.device_id.clone(), charge_point.connector_id))
                .copied(),
            status,
        })
    }

    /// Writes the command's immediate watt limit to the charger's limit
    /// register.
    async fn issue(&self, command: &LimitCommand) -> Result<(), CodecError> {
        let limit_w = command.profile.immediate_limit_w().unwrap_or(0);
        self.codec
            .write_point(
                &command.device_id,
                CHARGER_LIMIT,
                &PointValue::Number(f64::from(limit_w)),
            )
            .await
    }
}
