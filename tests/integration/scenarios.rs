//! End-to-end engine scenarios against the shipped rate schedule.
//!
//! Each test builds the schedule explicitly from `rates.toml` and drives
//! the full runner, checking figures, invariants and trace shape.

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use mdb_estimator::engine::EstimateRunner;
use mdb_estimator::rates::RateSchedule;
use mdb_estimator::types::{EligibilityFlags, EstimateError, EstimateRequest, EstimateResult, VatRegime};

fn schedule() -> Arc<RateSchedule> {
    Arc::new(RateSchedule::from_toml_str(include_str!("../../rates.toml")).unwrap())
}

fn run(request: &EstimateRequest) -> EstimateResult {
    EstimateRunner::new(schedule()).run(request).unwrap()
}

fn deal(regime: VatRegime, eligible: bool) -> EstimateRequest {
    EstimateRequest::new("75", regime, dec!(320000), dec!(550000))
        .with_works_cost(dec!(85000))
        .with_agency_fees(dec!(16000))
        .with_flags(EligibilityFlags {
            reduced_dmto_eligible: eligible,
            structuring_works: false,
        })
}

fn total_cost(r: &EstimateResult, req: &EstimateRequest) -> Decimal {
    req.purchase_price
        + req.works_cost
        + req.agency_fees
        + r.dmto
        + r.notary_fees
        + r.csi
        + r.disbursements
        + r.vat_on_margin
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_a_marge_with_reduced_dmto() {
    let r = run(&deal(VatRegime::Marge, true));

    assert_eq!(r.dmto_rate_used, dec!(0.00715));
    assert_eq!(r.dmto, dec!(2288.00));
    assert_eq!(r.notary_fees, dec!(4376.10));
    assert_eq!(r.csi, dec!(320.00));
    assert_eq!(r.disbursements, dec!(800));
    assert_eq!(r.vat_on_margin, dec!(38333.33));
    assert_eq!(r.vat_collected, Decimal::ZERO);
    assert_eq!(r.gross_margin, dec!(82882.57));
    assert_eq!(r.net_margin, dec!(82882.57));
    assert_eq!(r.tri_estimated, dec!(0.1933));

    let raw_margin = r
        .trace
        .iter()
        .find(|i| i.label == "Margin subject to VAT (MARGE)")
        .unwrap();
    assert_eq!(raw_margin.amount, dec!(230000));
}

#[test]
fn test_scenario_b_exo_standard_dmto() {
    let r = run(&deal(VatRegime::Exo, true));

    // EXO never takes the reduced rate, even with the flag set.
    assert_eq!(r.dmto_rate_used, dec!(0.045));
    assert_eq!(r.dmto, dec!(14400.00));
    assert_eq!(r.vat_collected, Decimal::ZERO);
    assert_eq!(r.vat_on_margin, Decimal::ZERO);
    assert_eq!(r.gross_margin, dec!(109103.90));
    assert_eq!(r.tri_estimated, dec!(0.2475));
}

#[test]
fn test_normal_regime_collects_vat_on_price() {
    let r = run(&deal(VatRegime::Normal, true));

    assert_eq!(r.vat_collected, dec!(91666.67));
    assert_eq!(r.vat_on_margin, Decimal::ZERO);
    assert_eq!(r.gross_margin, dec!(29549.23));
    assert_eq!(r.tri_estimated, dec!(0.0689));
}

#[test]
fn test_scenario_c_zero_purchase() {
    let req = EstimateRequest::new("75", VatRegime::Marge, Decimal::ZERO, Decimal::ZERO);
    let r = run(&req);

    assert_eq!(r.tri_estimated, Decimal::ZERO);
    assert_eq!(r.dmto, Decimal::ZERO);
    assert_eq!(r.notary_fees, Decimal::ZERO);
    assert_eq!(r.csi, Decimal::ZERO);
    assert_eq!(r.gross_margin, dec!(-800));
}

#[test]
fn test_scenario_c_zero_purchase_with_sale() {
    let req = EstimateRequest::new("33", VatRegime::Exo, Decimal::ZERO, dec!(100000))
        .with_works_cost(dec!(20000));
    let r = run(&req);
    assert_eq!(r.tri_estimated, Decimal::ZERO);
    assert_eq!(r.dmto, Decimal::ZERO);
}

#[test]
fn test_scenario_d_loss_under_marge() {
    let req = EstimateRequest::new("75", VatRegime::Marge, dec!(400000), dec!(350000))
        .with_works_cost(dec!(20000));
    let r = run(&req);

    assert_eq!(r.vat_on_margin, Decimal::ZERO);
    assert_eq!(r.dmto, dec!(18000.00));
    assert_eq!(r.notary_fees, dec!(5352.10));
    assert_eq!(r.csi, dec!(400.00));
    assert_eq!(r.gross_margin, dec!(-94552.10));
    assert_eq!(r.tri_estimated, Decimal::ZERO);
    assert_eq!(r.alerts.len(), 1);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn test_margin_identity_across_regimes() {
    for regime in [VatRegime::Marge, VatRegime::Normal, VatRegime::Exo] {
        for eligible in [true, false] {
            let req = deal(regime, eligible);
            let r = run(&req);
            let revenue = req.sale_price - r.vat_collected;
            assert_eq!(r.gross_margin, revenue - total_cost(&r, &req), "{regime}/{eligible}");
        }
    }
}

#[test]
fn test_regime_exclusivity() {
    let marge = run(&deal(VatRegime::Marge, false));
    assert!(marge.vat_collected.is_zero());

    let normal = run(&deal(VatRegime::Normal, false));
    assert!(normal.vat_on_margin.is_zero());

    let exo = run(&deal(VatRegime::Exo, false));
    assert!(exo.vat_collected.is_zero() && exo.vat_on_margin.is_zero());
}

#[test]
fn test_tri_bounds() {
    let cases = [
        (dec!(0), dec!(0)),
        (dec!(100000), dec!(1000000)),
        (dec!(100000), dec!(50000)),
        (dec!(250000), dec!(310000)),
        (dec!(1), dec!(2)),
    ];
    for (purchase, sale) in cases {
        for regime in [VatRegime::Marge, VatRegime::Normal, VatRegime::Exo] {
            let r = run(&EstimateRequest::new("69", regime, purchase, sale));
            assert!(r.tri_estimated >= Decimal::ZERO && r.tri_estimated <= Decimal::ONE);
        }
    }
}

#[test]
fn test_high_return_capped_at_one() {
    let r = run(&EstimateRequest::new("75", VatRegime::Exo, dec!(100000), dec!(1000000)));
    assert_eq!(r.tri_estimated, Decimal::ONE);
}

#[test]
fn test_determinism_identical_json() {
    let req = deal(VatRegime::Marge, true);
    let first = serde_json::to_string(&run(&req)).unwrap();
    let second = serde_json::to_string(&run(&req)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_trace_ends_with_tri() {
    let r = run(&deal(VatRegime::Normal, false));
    assert_eq!(r.trace.first().unwrap().label, "DMTO rate selection (département override)");
    assert_eq!(r.trace.last().unwrap().label, "TRI estimate");
    assert_eq!(r.trace.last().unwrap().amount, r.tri_estimated);
}

#[test]
fn test_structuring_works_alerts_without_changing_figures() {
    let plain = deal(VatRegime::Marge, true);
    let mut structuring = plain.clone();
    structuring.flags.structuring_works = true;

    let a = run(&plain);
    let b = run(&structuring);

    assert_eq!(a.notary_fees, b.notary_fees);
    assert_eq!(a.gross_margin, b.gross_margin);
    assert!(a.alerts.is_empty());
    assert_eq!(b.alerts.len(), 1);
}

#[test]
fn test_unknown_department_rejected() {
    let req = EstimateRequest::new("20", VatRegime::Marge, dec!(1), dec!(1));
    let err = EstimateRunner::new(schedule()).run(&req).unwrap_err();
    assert!(matches!(err, EstimateError::Validation(_)));
    assert!(err.is_client_error());
}

#[test]
fn test_negative_amount_rejected() {
    let req = deal(VatRegime::Marge, true).with_agency_fees(dec!(-1));
    let err = EstimateRunner::new(schedule()).run(&req).unwrap_err();
    assert!(err.to_string().starts_with("frais_agence_ttc"));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_runs_share_one_schedule() {
    let shared = schedule();
    let expected = EstimateRunner::new(shared.clone())
        .run(&deal(VatRegime::Marge, true))
        .unwrap();

    let tasks = (0..32).map(|i| {
        let schedule = shared.clone();
        tokio::spawn(async move {
            let regime = match i % 3 {
                0 => VatRegime::Marge,
                1 => VatRegime::Normal,
                _ => VatRegime::Exo,
            };
            let result = EstimateRunner::new(schedule).run(&deal(regime, true)).unwrap();
            (regime, result)
        })
    });

    for joined in join_all(tasks).await {
        let (regime, result) = joined.unwrap();
        if regime == VatRegime::Marge {
            assert_eq!(result, expected);
        }
        assert_eq!(result.schedule_version, "2025-01-01");
    }
}
