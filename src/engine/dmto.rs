//! Transfer duty (droits de mutation à titre onéreux).

use rust_decimal::Decimal;

use super::eligibility::Eligibility;
use super::round_money;
use super::trace::ExplanationTracer;
use crate::types::EstimateError;

pub struct DmtoCalculator;

impl DmtoCalculator {
    /// `purchase_price × rate`, rounded half-up to the cent.
    pub fn compute(
        purchase_price: Decimal,
        eligibility: &Eligibility,
        tracer: &mut ExplanationTracer,
    ) -> Result<Decimal, EstimateError> {
        // The runner validates first; this guards direct callers.
        if purchase_price < Decimal::ZERO {
            return Err(EstimateError::InvalidInput(format!(
                "purchase price must be non-negative, got {purchase_price}"
            )));
        }

        let dmto = round_money(purchase_price * eligibility.dmto_rate);

        tracer
            .line(
                format!("DMTO ({} rate)", eligibility.rate_kind),
                "purchase_price × dmto_rate",
            )
            .with_amount("purchase_price", purchase_price)
            .with_rate("dmto_rate", eligibility.dmto_rate)
            .amount(dmto);

        Ok(dmto)
    }
}
