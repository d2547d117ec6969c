//! End-to-end behavior of the stability engine.
//!
//! Each test drives a fresh engine through its public API only: owner
//! credits, transfers, settlement reports and health ticks.

use stab_core::config::{ConfigOption, EngineConfig};
use stab_core::constants::{PPM, SECS_PER_DAY};
use stab_core::error::{ConfigError, StabilityError, TransferError};
use stab_core::types::{BreakerState, ChainId, OperationKind, RiskBand, SettlementDirection};
use stab_tests::helpers::*;

// ---------------------------------------------------------------------------
// Demurrage
// ---------------------------------------------------------------------------

#[test]
fn idle_balance_decay_is_capped() {
    let e = engine();
    fund(&e, "idle", 1_000);
    let later = T0 + 40 * SECS_PER_DAY;
    assert_eq!(e.effective_balance(&id("idle"), later).unwrap(), 500);
    // Reads never realize decay.
    assert_eq!(e.account_view(&id("idle"), later).unwrap().raw_balance, 1_000);
}

#[test]
fn no_decay_inside_grace_period() {
    let e = engine();
    fund(&e, "fresh", 1_000);
    assert_eq!(e.effective_balance(&id("fresh"), T0 + SECS_PER_DAY).unwrap(), 1_000);
}

#[test]
fn fiat_activity_selects_slower_decay() {
    let e = engine();
    fund(&e, "fiat", 1_000);
    fund(&e, "plain", 1_000);
    e.report_settlement(&id("fiat"), 1_000, SettlementDirection::Onramp, T0)
        .unwrap();
    e.report_settlement(&id("fiat"), 600, SettlementDirection::Offramp, T0)
        .unwrap();

    // 216 decayable hours at 0.05% vs 0.10%.
    let later = T0 + 10 * SECS_PER_DAY;
    assert_eq!(e.effective_balance(&id("fiat"), later).unwrap(), 892);
    assert_eq!(e.effective_balance(&id("plain"), later).unwrap(), 784);
}

#[test]
fn activity_resets_the_decay_clock() {
    let e = engine();
    fund(&e, "alice", 100_000);
    let t1 = T0 + 10 * SECS_PER_DAY;
    let r = e.transfer(&id("alice"), &id("bob"), 1_000, t1).unwrap();
    // 216 hours at 0.10% realized, then amount and fee deducted.
    assert_eq!(r.sender_effective_balance, 78_400 - 2_000);
    // Within a fresh grace period nothing further decays.
    assert_eq!(
        e.effective_balance(&id("alice"), t1 + SECS_PER_DAY).unwrap(),
        76_400
    );
}

// ---------------------------------------------------------------------------
// Pattern analysis and penalties
// ---------------------------------------------------------------------------

#[test]
fn burst_of_transfers_escalates_surcharges() {
    let e = engine();
    fund(&e, "trader", 1_000_000);
    let receipts: Vec<_> = (0..12u64)
        .map(|k| {
            e.transfer(&id("trader"), &id(&format!("dest-{k}")), 1_000, T0 + k * 300)
                .unwrap()
        })
        .collect();

    assert_eq!(receipts[0].surcharge, 0);
    assert_eq!(receipts[0].band, RiskBand::None);

    let eleventh = &receipts[10];
    let twelfth = &receipts[11];
    assert!(eleventh.risk_score >= 500, "score {}", eleventh.risk_score);
    assert_eq!(eleventh.band, RiskBand::Tier2);
    assert!(eleventh.surcharge > 0);
    assert!(
        twelfth.surcharge > eleventh.surcharge,
        "{} <= {}",
        twelfth.surcharge,
        eleventh.surcharge
    );
}

#[test]
fn rapid_fire_hits_velocity_ceiling() {
    let e = engine();
    fund(&e, "bot", 1_000_000);
    e.transfer(&id("bot"), &id("x"), 10, T0 + 100).unwrap();
    let r = e.transfer(&id("bot"), &id("y"), 10, T0 + 101).unwrap();
    // Maximum velocity alone is 60% of the composite.
    assert_eq!(r.risk_score, 600);
    assert_eq!(r.band, RiskBand::Tier2);
}

#[test]
fn round_trip_raises_reciprocity() {
    let e = engine();
    fund(&e, "a", 1_000_000);
    fund(&e, "b", 1_000_000);
    e.transfer(&id("a"), &id("b"), 50_000, T0 + 10).unwrap();
    let back = e.transfer(&id("b"), &id("a"), 50_000, T0 + 10).unwrap();
    let fresh = e.transfer(&id("a"), &id("c"), 50_000, T0 + 4_000).unwrap();
    assert!(back.risk_score > fresh.risk_score);
}

#[test]
fn fiat_backing_discounts_risk() {
    let e = engine();
    for who in ["fiat", "plain"] {
        fund(&e, who, 1_000_000);
    }
    e.report_settlement(&id("fiat"), 10_000, SettlementDirection::Onramp, T0)
        .unwrap();
    e.report_settlement(&id("fiat"), 10_000, SettlementDirection::Offramp, T0)
        .unwrap();

    let mut last = Vec::new();
    for who in ["fiat", "plain"] {
        let mut receipt = None;
        for k in 0..5u64 {
            receipt = Some(
                e.transfer(&id(who), &id(&format!("{who}-{k}")), 100, T0 + k * 300)
                    .unwrap(),
            );
        }
        last.push(receipt.unwrap());
    }
    assert_eq!(last[0].risk_score, 240);
    assert_eq!(last[0].surcharge, 0);
    assert_eq!(last[1].risk_score, 300);
    assert_eq!(last[1].band, RiskBand::Tier1);
    assert!(last[1].surcharge > 0);
}

#[test]
fn risk_score_relaxes_over_time() {
    let e = engine();
    fund(&e, "bot", 1_000_000);
    e.transfer(&id("bot"), &id("x"), 10, T0 + 100).unwrap();
    e.transfer(&id("bot"), &id("y"), 10, T0 + 101).unwrap();
    assert_eq!(e.account_view(&id("bot"), T0 + 101).unwrap().risk_score, 600);
    assert_eq!(
        e.account_view(&id("bot"), T0 + 101 + 3 * 3_600).unwrap().risk_score,
        300
    );
    assert_eq!(
        e.account_view(&id("bot"), T0 + 101 + SECS_PER_DAY).unwrap().risk_score,
        0
    );
}

// ---------------------------------------------------------------------------
// Exempt accounts
// ---------------------------------------------------------------------------

#[test]
fn exempt_accounts_never_decay_or_pay_surcharges() {
    let e = engine();
    e.open_exempt_account(&owner(), &id("reserve"), T0).unwrap();
    e.credit(&owner(), &id("reserve"), 10_000_000, T0).unwrap();

    for days in [1, 30, 365, 3_650] {
        assert_eq!(
            e.effective_balance(&id("reserve"), T0 + days * SECS_PER_DAY)
                .unwrap(),
            10_000_000
        );
    }
    let start = T0 + 400 * SECS_PER_DAY;
    for k in 0..30u64 {
        let r = e
            .transfer(&id("reserve"), &id("user"), 5_000, start + k)
            .unwrap();
        assert_eq!(r.surcharge, 0);
        assert_eq!(r.band, RiskBand::None);
    }
    assert_eq!(e.account_view(&id("reserve"), start + 30).unwrap().risk_score, 0);
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

fn drive(e: &stab_engine::StabilityEngine, lhis: &[u64]) -> Vec<BreakerState> {
    lhis.iter()
        .enumerate()
        .map(|(i, &l)| e.tick(&metrics_with_lhi(l), T0 + i as u64).breaker)
        .collect()
}

#[test]
fn stress_sequence_walks_the_breaker() {
    let e = engine();
    assert_eq!(
        drive(&e, &[350_000, 180_000, 90_000, 160_000, 270_000]),
        vec![
            BreakerState::Normal,
            BreakerState::Congested,
            BreakerState::Halted,
            BreakerState::Halted,
            BreakerState::Emergency,
        ]
    );
}

#[test]
fn recovery_requires_hysteresis() {
    let e = engine();
    let states = drive(&e, &[250_000, 150_000, 220_000, 280_000]);
    assert_eq!(
        states,
        vec![
            BreakerState::Congested,
            BreakerState::Emergency,
            BreakerState::Emergency,
            BreakerState::Emergency,
        ]
    );
    assert_eq!(
        drive(&e, &[300_000, 400_000, 400_000]),
        vec![
            BreakerState::Congested,
            BreakerState::Normal,
            BreakerState::Normal
        ]
    );
}

#[test]
fn breaker_gates_operations_by_state() {
    let e = engine();
    fund(&e, "alice", 10_000_000);
    let eth = ChainId("eth".into());
    let large = e.config().large_transfer_threshold;

    drive(&e, &[250_000, 150_000]);
    assert_eq!(e.network_health().breaker, BreakerState::Emergency);
    assert!(e.transfer(&id("alice"), &id("bob"), 100, T0 + 10).is_ok());
    assert!(e.bridge_inbound(&id("carol"), &eth, 100, T0 + 10).is_ok());
    assert!(e
        .report_settlement(&id("alice"), 100, SettlementDirection::Onramp, T0 + 10)
        .is_ok());
    match e.transfer(&id("alice"), &id("bob"), large, T0 + 10) {
        Err(StabilityError::Transfer(TransferError::CircuitBreakerRejected {
            state,
            operation,
            ..
        })) => {
            assert_eq!(state, BreakerState::Emergency);
            assert_eq!(operation, OperationKind::LargeTransfer);
        }
        other => panic!("expected breaker rejection, got {other:?}"),
    }

    drive(&e, &[50_000]);
    assert_eq!(e.network_health().breaker, BreakerState::Halted);
    assert!(e.transfer(&id("alice"), &id("bob"), 100, T0 + 20).is_err());
    assert!(e.bridge_inbound(&id("carol"), &eth, 100, T0 + 20).is_err());
    let ratio_before = e.account_view(&id("alice"), T0 + 20).unwrap().fiat_ratio_ppm;
    match e.report_settlement(&id("alice"), 900, SettlementDirection::Offramp, T0 + 20) {
        Err(StabilityError::Transfer(TransferError::CircuitBreakerRejected {
            state,
            operation,
            ..
        })) => {
            assert_eq!(state, BreakerState::Halted);
            assert_eq!(operation, OperationKind::Settlement);
        }
        other => panic!("expected breaker rejection, got {other:?}"),
    }
    assert_eq!(
        e.account_view(&id("alice"), T0 + 20).unwrap().fiat_ratio_ppm,
        ratio_before
    );
    assert!(e.credit(&owner(), &id("alice"), 1, T0 + 20).is_ok());
}

#[test]
fn custom_thresholds_keep_ordering() {
    let config = EngineConfig {
        lhi_upper_threshold_ppm: 500_000,
        lhi_emergency_threshold_ppm: 300_000,
        lhi_halt_threshold_ppm: 150_000,
        lhi_recovery_hysteresis_ppm: 50_000,
        ..EngineConfig::default()
    };
    let e = engine_with(config);
    assert_eq!(
        drive(&e, &[550_000, 400_000, 100_000, 180_000, 210_000, 360_000]),
        vec![
            BreakerState::Normal,
            BreakerState::Congested,
            BreakerState::Halted,
            BreakerState::Halted,
            BreakerState::Emergency,
            BreakerState::Congested,
        ]
    );
}

// ---------------------------------------------------------------------------
// Fees and configuration
// ---------------------------------------------------------------------------

#[test]
fn fees_follow_the_published_snapshot() {
    let e = engine();
    fund(&e, "alice", 1_000_000);
    e.set_configuration(&owner(), &[ConfigOption::BaseFee(2_000)])
        .unwrap();
    // Config changes reach the fee at the next tick.
    let r = e.transfer(&id("alice"), &id("bob"), 10, T0 + 1).unwrap();
    assert_eq!(r.base_fee, 1_000);

    let snapshot = e.tick(&metrics_with_lhi(PPM), T0 + 2);
    assert_eq!(snapshot.dynamic_fee, 2_000);
    let r = e.transfer(&id("alice"), &id("bob"), 10, T0 + 3_600).unwrap();
    assert_eq!(r.base_fee, 2_000);
    assert_eq!(r.snapshot_version, snapshot.version);

    let pool = e.fee_pool();
    assert_eq!(pool.total(), 3_000);
    assert_eq!((pool.host, pool.pool, pool.reserve), (2_100, 600, 300));
}

#[test]
fn stressed_health_raises_fees() {
    let e = engine();
    let healthy = e.tick(&metrics_with_lhi(PPM), T0).dynamic_fee;
    let stressed = e.tick(&metrics_with_lhi(250_000), T0 + 1).dynamic_fee;
    assert_eq!(stressed, 4 * healthy);
}

#[test]
fn rejected_configuration_changes_nothing() {
    let e = engine();
    let before = e.config();
    assert_eq!(
        e.set_configuration(&id("mallory"), &[ConfigOption::BaseFee(5)]),
        Err(ConfigError::Unauthorized(id("mallory")))
    );
    assert!(matches!(
        e.set_configuration(
            &owner(),
            &[
                ConfigOption::LhiHaltThreshold(400_000),
                ConfigOption::GracePeriodHours(1)
            ]
        ),
        Err(ConfigError::InvalidConfiguration(_))
    ));
    assert_eq!(*e.config(), *before);
}

#[test]
fn epoch_stats_roll_over() {
    let e = engine();
    fund(&e, "alice", 1_000_000);
    e.transfer(&id("alice"), &id("bob"), 100, T0 + 10).unwrap();
    e.transfer(&id("alice"), &id("carol"), 200, T0 + 20).unwrap();
    let stats = e.epoch_stats();
    assert_eq!((stats.epoch, stats.transfer_count, stats.transfer_volume), (0, 2, 300));
    assert_eq!(stats.active_senders, 1);

    e.tick(&metrics_with_lhi(PPM), T0 + SECS_PER_DAY);
    let stats = e.epoch_stats();
    assert_eq!((stats.epoch, stats.transfer_count), (1, 0));
    assert_eq!(e.network_health().epoch, 1);
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[test]
fn bridge_out_lands_in_exempt_escrow() {
    let e = engine();
    let eth = ChainId("eth".into());
    e.bridge_inbound(&id("alice"), &eth, 100_000, T0).unwrap();
    let r = e.bridge_outbound(&id("alice"), &eth, 40_000, T0 + 60).unwrap();
    let escrow = stab_engine::engine::bridge_escrow(&eth);
    assert_eq!(r.to, escrow);
    assert_eq!(r.sender_effective_balance, 100_000 - 40_000 - 1_000);

    let later = T0 + 100 * SECS_PER_DAY;
    assert_eq!(e.effective_balance(&escrow, later).unwrap(), 40_000);
    assert_eq!(e.epoch_stats().cross_chain_volume, 140_000);
}

#[test]
fn escrow_ids_cannot_be_claimed_outside_the_bridge() {
    let e = engine();
    let eth = ChainId("eth".into());
    let escrow = stab_engine::engine::bridge_escrow(&eth);
    fund(&e, "mallory", 100_000);
    fund(&e, "alice", 1_000_000);

    assert_eq!(
        e.transfer(&id("mallory"), &escrow, 10, T0 + 5),
        Err(TransferError::ReservedAccount(escrow.clone()).into())
    );
    assert_eq!(
        e.credit(&owner(), &escrow, 10, T0 + 5),
        Err(TransferError::ReservedAccount(escrow.clone()).into())
    );
    assert_eq!(
        e.bridge_inbound(&escrow, &eth, 10, T0 + 5),
        Err(TransferError::ReservedAccount(escrow.clone()).into())
    );
    assert!(!e.ledger().contains(&escrow));

    e.bridge_outbound(&id("alice"), &eth, 100_000, T0 + 10).unwrap();
    let view = e.account_view(&escrow, T0 + 100 * SECS_PER_DAY).unwrap();
    assert!(view.exempt);
    assert_eq!(view.raw_balance, 100_000);
    assert_eq!(view.effective_balance, 100_000);
    assert!(e.transfer(&id("mallory"), &escrow, 10, T0 + 20).is_err());
}
