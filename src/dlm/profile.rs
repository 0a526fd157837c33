//! Charging-profile command structures.
//!
//! A limit command carries a structured schedule rather than a bare number so
//! downstream consumers (charge-point protocols, audit logs) see the full
//! shape: purpose, kind, rate unit, and at least one period.

use std::fmt;

/// What the profile constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilePurpose {
    /// Overall ceiling for the charge point or connector.
    ChargePointMax,
    /// Default profile for transactions.
    TxDefault,
    /// Profile for one specific transaction.
    Tx,
}

/// How the schedule's limits are anchored in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Limits are absolute values effective from the period offset.
    Absolute,
    Recurring,
    Relative,
}

/// Unit the schedule's limits are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Watts,
    Amps,
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateUnit::Watts => f.write_str("W"),
            RateUnit::Amps => f.write_str("A"),
        }
    }
}

/// One schedule segment: a limit that applies from `start_offset_s` onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePeriod {
    /// Seconds from the start of the schedule.
    pub start_offset_s: u32,
    pub limit_w: u32,
}

/// Limit schedule with at least one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargingSchedule {
    pub rate_unit: RateUnit,
    pub periods: Vec<SchedulePeriod>,
}

/// A complete profile as issued to one charge point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargingProfile {
    pub profile_id: u32,
    /// Higher stack levels override lower ones on the device.
    pub stack_level: u8,
    pub purpose: ProfilePurpose,
    pub kind: ProfileKind,
    pub schedule: ChargingSchedule,
}

impl ChargingProfile {
    /// An absolute watt limit effective immediately, the shape every DLM
    /// cycle emits.
    pub fn absolute_limit(profile_id: u32, limit_w: u32) -> Self {
        Self {
            profile_id,
            stack_level: 1,
            purpose: ProfilePurpose::ChargePointMax,
            kind: ProfileKind::Absolute,
            schedule: ChargingSchedule {
                rate_unit: RateUnit::Watts,
                periods: vec![SchedulePeriod {
                    start_offset_s: 0,
                    limit_w,
                }],
            },
        }
    }

    /// The limit of the first schedule period, the value that lands in the
    /// charger's limit register.
    pub fn immediate_limit_w(&self) -> Option<u32> {
        self.schedule.periods.first().map(|p| p.limit_w)
    }
}

/// A profile addressed to one device and connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitCommand {
    pub device_id: String,
    pub connector_id: u16,
    pub profile: ChargingProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_limit_has_one_immediate_watt_period() {
        let profile = ChargingProfile::absolute_limit(101, 7400);
        assert_eq!(profile.purpose, ProfilePurpose::ChargePointMax);
        assert_eq!(profile.kind, ProfileKind::Absolute);
        assert_eq!(profile.schedule.rate_unit, RateUnit::Watts);
        assert_eq!(
            profile.schedule.periods,
            vec![SchedulePeriod {
                start_offset_s: 0,
                limit_w: 7400,
            }]
        );
        assert_eq!(profile.immediate_limit_w(), Some(7400));
    }
}
