//! Proportional power allocation under a headroom constraint.
//!
//! Pure arithmetic, separated from the engine so the constraint and fairness
//! properties are testable without any transport in the picture.

use super::types::{ChargerSession, NoHeadroomPolicy};

/// Computes the target allocation (kW) for each session, in input order.
///
/// With positive headroom and non-zero total capability, each session gets
/// `headroom * max_i / Σ max`, clamped to `[0, max_i]`. The shares sum to
/// exactly the headroom before clamping and clamping only ever reduces the
/// sum, so `Σ allocation ≤ headroom` holds by construction. Clamped excess is
/// NOT redistributed within the same cycle; the next cycle sees the freed
/// headroom through the meter.
///
/// Without headroom (or without any capability to key shares off), every
/// session gets the policy's fallback: the minimum trickle power, or zero
/// under the stricter policy.
pub fn proportional_allocations(
    headroom_kw: f64,
    sessions: &[ChargerSession],
    policy: NoHeadroomPolicy,
    min_charge_kw: f64,
) -> Vec<f64> {
    let total_max_kw: f64 = sessions.iter().map(|s| s.max_power_kw).sum();

    sessions
        .iter()
        .map(|session| {
            if headroom_kw > 0.0 && total_max_kw > 0.0 {
                let share = headroom_kw * (session.max_power_kw / total_max_kw);
                share.clamp(0.0, session.max_power_kw)
            } else {
                match policy {
                    NoHeadroomPolicy::Trickle => min_charge_kw,
                    NoHeadroomPolicy::Zero => 0.0,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlm::types::SessionStatus;

    fn session(device_id: &str, current_kw: f64, max_kw: f64) -> ChargerSession {
        ChargerSession {
            device_id: device_id.to_string(),
            connector_id: 1,
            current_power_kw: current_kw,
            max_power_kw: max_kw,
            last_limit_kw: None,
            status: SessionStatus::Charging,
        }
    }

    #[test]
    fn shares_are_proportional_to_max_power() {
        let sessions = vec![session("a", 7.2, 11.0), session("b", 6.8, 7.4)];
        let allocations =
            proportional_allocations(10.0, &sessions, NoHeadroomPolicy::Trickle, 1.4);

        assert!((allocations[0] - 10.0 * 11.0 / 18.4).abs() < 1e-9);
        assert!((allocations[1] - 10.0 * 7.4 / 18.4).abs() < 1e-9);
        // ≈ 5.98 kW and ≈ 4.02 kW
        assert!((allocations[0] - 5.978).abs() < 0.01);
        assert!((allocations[1] - 4.022).abs() < 0.01);
    }

    #[test]
    fn fairness_ratio_matches_capability_ratio_absent_clamping() {
        let sessions = vec![session("a", 0.0, 22.0), session("b", 0.0, 11.0)];
        let allocations =
            proportional_allocations(12.0, &sessions, NoHeadroomPolicy::Trickle, 1.4);
        assert!((allocations[0] / allocations[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn allocations_never_exceed_headroom() {
        let sessions = vec![
            session("a", 3.0, 11.0),
            session("b", 5.0, 7.4),
            session("c", 0.5, 22.0),
        ];
        for headroom in [0.5, 3.7, 10.0, 100.0] {
            let total: f64 =
                proportional_allocations(headroom, &sessions, NoHeadroomPolicy::Trickle, 1.4)
                    .iter()
                    .sum();
            assert!(total <= headroom + 1e-9, "Σ {total} > headroom {headroom}");
        }
    }

    #[test]
    fn clamped_excess_is_not_redistributed() {
        // Two 7.4 kW chargers with 18 kW headroom: each unclamped share is
        // 9 kW, clamped to 7.4 kW; the spare 3.2 kW stays unused this cycle.
        let sessions = vec![session("a", 6.0, 7.4), session("b", 6.0, 7.4)];
        let allocations =
            proportional_allocations(18.0, &sessions, NoHeadroomPolicy::Trickle, 1.4);
        assert_eq!(allocations, vec![7.4, 7.4]);
    }

    #[test]
    fn zero_headroom_applies_trickle_to_every_session() {
        let sessions = vec![session("a", 7.2, 11.0), session("b", 6.8, 7.4)];
        for headroom in [0.0, -4.2] {
            let allocations =
                proportional_allocations(headroom, &sessions, NoHeadroomPolicy::Trickle, 1.4);
            assert_eq!(allocations, vec![1.4, 1.4]);
        }
    }

    #[test]
    fn zero_headroom_with_strict_policy_stops_charging() {
        let sessions = vec![session("a", 7.2, 11.0)];
        let allocations = proportional_allocations(-1.0, &sessions, NoHeadroomPolicy::Zero, 1.4);
        assert_eq!(allocations, vec![0.0]);
    }

    #[test]
    fn zero_total_capability_falls_back_to_policy() {
        let sessions = vec![session("a", 0.0, 0.0)];
        let allocations = proportional_allocations(5.0, &sessions, NoHeadroomPolicy::Zero, 1.4);
        assert_eq!(allocations, vec![0.0]);
    }

    #[test]
    fn no_sessions_yields_no_allocations() {
        let allocations = proportional_allocations(10.0, &[], NoHeadroomPolicy::Trickle, 1.4);
        assert!(allocations.is_empty());
    }
}
