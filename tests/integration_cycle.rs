//! Integration tests for full control cycles over the simulated site.

mod common;

use sitecap::codec::PointValue;
use sitecap::config::SiteConfig;
use sitecap::regmap::catalog::CHARGER_LIMIT;

#[tokio::test]
async fn first_cycle_limits_every_manageable_session() {
    let mut site = common::demo_site();
    let summary = site.step().await;

    assert!(!summary.aborted);
    assert!(summary.metered_load_kw.is_some());

    // charger-001 and charger-002 are charging; charger-003 is Available and
    // therefore outside management.
    let ids: Vec<&str> = summary
        .sessions
        .iter()
        .map(|d| d.device_id.as_str())
        .collect();
    assert_eq!(ids, vec!["charger-001", "charger-002"]);
    assert!(summary.sessions.iter().all(|d| d.applied));

    // The written limits are readable back through the codec.
    let codec = site.codec();
    for decision in &summary.sessions {
        let read = codec
            .read_point(&decision.device_id, CHARGER_LIMIT)
            .await
            .unwrap();
        assert_eq!(read.value, PointValue::Number(f64::from(decision.limit_w)));
    }

    // The unmanaged charger never received a limit: its setpoint register
    // was never created.
    assert!(codec.read_point("charger-003", CHARGER_LIMIT).await.is_err());
}

#[tokio::test]
async fn allocations_respect_headroom_and_proportionality() {
    // A 28 kW ceiling leaves less headroom than the 18.4 kW of combined
    // charger capability, so shares stay unclamped and proportional.
    let mut config = SiteConfig::demo();
    config.site.import_limit_kw = 28.0;
    let mut site = common::build_site(config);

    let summary = site.step().await;
    let headroom = summary.headroom_kw.unwrap();
    assert!(headroom > 0.0);

    let total: f64 = summary.sessions.iter().map(|d| d.allocated_kw).sum();
    assert!(total <= headroom + 1e-9);

    let a = &summary.sessions[0];
    let b = &summary.sessions[1];
    assert!(
        (a.allocated_kw / b.allocated_kw - a.max_power_kw / b.max_power_kw).abs() < 1e-9,
        "allocation ratio should match capability ratio"
    );
    // Shares are exactly headroom * max / Σ max.
    let total_max = a.max_power_kw + b.max_power_kw;
    assert!((a.allocated_kw - headroom * a.max_power_kw / total_max).abs() < 1e-9);
}

#[tokio::test]
async fn generous_ceiling_clamps_allocations_to_hardware_max() {
    // The demo's 50 kW ceiling leaves more headroom than the chargers can
    // use; every allocation caps at the hardware limit and the excess is not
    // redistributed.
    let mut site = common::demo_site();
    let summary = site.step().await;

    for decision in &summary.sessions {
        assert!((decision.allocated_kw - decision.max_power_kw).abs() < 1e-9);
    }
}

#[tokio::test]
async fn overloaded_site_falls_back_to_trickle_power() {
    let mut config = SiteConfig::demo();
    config.site.import_limit_kw = 5.0;
    let mut site = common::build_site(config);

    let summary = site.step().await;
    assert!(summary.headroom_kw.unwrap() <= 0.0);
    for decision in &summary.sessions {
        assert!((decision.allocated_kw - 1.4).abs() < 1e-9);
        assert_eq!(decision.limit_w, 1400);
    }
}

#[tokio::test]
async fn the_invariant_holds_across_consecutive_cycles() {
    let mut config = SiteConfig::demo();
    config.site.import_limit_kw = 30.0;
    let mut site = common::build_site(config);

    for _ in 0..6 {
        let summary = site.step().await;
        let headroom = summary.headroom_kw.unwrap();
        if headroom > 0.0 {
            let total: f64 = summary.sessions.iter().map(|d| d.allocated_kw).sum();
            assert!(total <= headroom + 1e-9);
        }
        assert_eq!(summary.cycle, site.engine.cycles());
    }
}

#[tokio::test]
async fn cycle_without_manageable_sessions_issues_no_commands() {
    let mut config = SiteConfig::demo();
    // Park every charger.
    for device in &mut config.devices {
        if device.max_power_kw.is_some() {
            device.initial_status = sitecap::dlm::types::SessionStatus::Available;
            device.initial_power_kw = 0.0;
        }
    }
    let mut site = common::build_site(config);

    let summary = site.step().await;
    assert!(!summary.aborted);
    assert!(summary.sessions.is_empty());
    assert_eq!(summary.ev_load_kw, 0.0);

    let codec = site.codec();
    for n in 1..=3 {
        assert!(
            codec
                .read_point(&format!("charger-00{n}"), CHARGER_LIMIT)
                .await
                .is_err(),
            "no limit should have been written"
        );
    }
}
