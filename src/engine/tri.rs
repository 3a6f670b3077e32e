//! Estimated return rate (TRI).
//!
//! Single-period approximation `net_margin / investment`, clamped to
//! [0, 1]. No cash-flow schedule and no iterative IRR solve.

use rust_decimal::{Decimal, RoundingStrategy};

use super::margin::CostStack;
use super::trace::ExplanationTracer;

/// Decimal places kept on the ratio.
const TRI_DP: u32 = 4;

pub struct TriEstimator;

impl TriEstimator {
    pub fn estimate(net_margin: Decimal, costs: &CostStack, tracer: &mut ExplanationTracer) -> Decimal {
        let investment = costs.investment();

        // Without an acquisition there is nothing to return on.
        let raw = if costs.purchase_price.is_zero() || investment <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            net_margin / investment
        };
        let tri = raw
            .clamp(Decimal::ZERO, Decimal::ONE)
            .round_dp_with_strategy(TRI_DP, RoundingStrategy::MidpointAwayFromZero);

        tracer
            .line("TRI estimate", "clamp(net_margin / investment, 0, 1)")
            .with_amount("net_margin", net_margin)
            .with_amount("investment", investment)
            .amount(tri);

        tri
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
