//! Session state, management policies, and per-cycle result records.

use std::fmt;

use serde::Deserialize;

/// Connector lifecycle status as reported by the charger's status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Available,
    Preparing,
    Charging,
    SuspendedEv,
    SuspendedEvse,
    Finishing,
    Unavailable,
    Faulted,
}

impl SessionStatus {
    /// Maps a status register code to a status, or `None` for codes outside
    /// the known range; those sessions are reported and skipped, never
    /// coerced into an eligible state.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(SessionStatus::Available),
            1 => Some(SessionStatus::Preparing),
            2 => Some(SessionStatus::Charging),
            3 => Some(SessionStatus::SuspendedEv),
            4 => Some(SessionStatus::SuspendedEvse),
            5 => Some(SessionStatus::Finishing),
            6 => Some(SessionStatus::Unavailable),
            7 => Some(SessionStatus::Faulted),
            _ => None,
        }
    }

    /// The register code for this status.
    pub fn code(self) -> u16 {
        match self {
            SessionStatus::Available => 0,
            SessionStatus::Preparing => 1,
            SessionStatus::Charging => 2,
            SessionStatus::SuspendedEv => 3,
            SessionStatus::SuspendedEvse => 4,
            SessionStatus::Finishing => 5,
            SessionStatus::Unavailable => 6,
            SessionStatus::Faulted => 7,
        }
    }

    /// Whether a session in this status is subject to load management.
    pub fn is_manageable(self) -> bool {
        matches!(self, SessionStatus::Charging | SessionStatus::Preparing)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Available => "Available",
            SessionStatus::Preparing => "Preparing",
            SessionStatus::Charging => "Charging",
            SessionStatus::SuspendedEv => "SuspendedEV",
            SessionStatus::SuspendedEvse => "SuspendedEVSE",
            SessionStatus::Finishing => "Finishing",
            SessionStatus::Unavailable => "Unavailable",
            SessionStatus::Faulted => "Faulted",
        };
        f.write_str(name)
    }
}

/// What to allocate when no headroom (or no capability) is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoHeadroomPolicy {
    /// Keep every session alive at the configured minimum charging power.
    Trickle,
    /// Stop charging outright.
    Zero,
}

/// How a cycle proceeds when the site-load read fails.
///
/// The choice materially changes the safety margin of the import constraint,
/// so it is explicit configuration rather than an implicit default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteLoadPolicy {
    /// Abort the cycle; sessions keep their previous limits.
    FailCycle,
    /// Continue with the last successfully read value, aborting when none
    /// exists yet.
    LastKnown,
    /// Continue as if the metered load were zero.
    Zero,
}

/// Live state of one charging session, rebuilt each cycle from device reads.
#[derive(Debug, Clone)]
pub struct ChargerSession {
    pub device_id: String,
    pub connector_id: u16,
    /// Momentary charging power from telemetry (kW).
    pub current_power_kw: f64,
    /// Maximum hardware charging power (kW).
    pub max_power_kw: f64,
    /// Limit applied by the previous successful command, if any.
    pub last_limit_kw: Option<f64>,
    pub status: SessionStatus,
}

/// Outcome of one session within a cycle.
#[derive(Debug, Clone)]
pub struct SessionDecision {
    pub device_id: String,
    pub connector_id: u16,
    pub status: SessionStatus,
    pub current_power_kw: f64,
    pub max_power_kw: f64,
    /// Target allocation for this cycle (kW).
    pub allocated_kw: f64,
    /// Limit written to the charger (W).
    pub limit_w: u32,
    /// Whether the limit command reached the device.
    pub applied: bool,
    pub error: Option<String>,
}

/// Structured record of one control cycle, the observability output of the
/// engine.
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub cycle: u64,
    pub ceiling_kw: f64,
    /// Metered site load (kW); `None` when the read failed and the policy
    /// degraded the cycle.
    pub metered_load_kw: Option<f64>,
    /// Current managed EV load (kW), summed over eligible sessions.
    pub ev_load_kw: f64,
    /// Metered load minus managed EV load (kW).
    pub base_load_kw: Option<f64>,
    /// Power available for EV charging (kW); may be negative.
    pub headroom_kw: Option<f64>,
    /// Battery state of charge snapshot (%), observability only.
    pub battery_soc: Option<f64>,
    pub sessions: Vec<SessionDecision>,
    pub errors: Vec<String>,
    /// True when the cycle issued no commands (no eligible sessions, degraded
    /// input, or exceeded budget).
    pub aborted: bool,
}

impl CycleSummary {
    /// A summary for a cycle abandoned before any allocation happened.
    pub fn aborted(cycle: u64, ceiling_kw: f64, reason: impl Into<String>) -> Self {
        Self {
            cycle,
            ceiling_kw,
            errors: vec![reason.into()],
            aborted: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for code in 0..8 {
            let status = SessionStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(SessionStatus::from_code(8), None);
        assert_eq!(SessionStatus::from_code(999), None);
    }

    #[test]
    fn only_charging_and_preparing_are_manageable() {
        let manageable: Vec<SessionStatus> = (0..8)
            .filter_map(SessionStatus::from_code)
            .filter(|s| s.is_manageable())
            .collect();
        assert_eq!(
            manageable,
            vec![SessionStatus::Preparing, SessionStatus::Charging]
        );
    }
}
