//! Notary fees: émoluments over the degressive bracket scale, plus the
//! registry contribution (CSI) and the flat disbursements.

use rust_decimal::Decimal;

use super::round_money;
use super::trace::ExplanationTracer;
use crate::rates::{NotaryBracket, RateSchedule};
use crate::types::EstimateError;

/// The acquisition-side fees charged through the notary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotaryFees {
    pub emoluments: Decimal,
    pub csi: Decimal,
    pub disbursements: Decimal,
}

/// Share of the base falling inside one bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BracketShare {
    index: usize,
    portion: Decimal,
    contribution: Decimal,
}

pub struct NotaryFeeCalculator;

impl NotaryFeeCalculator {
    /// Émoluments, CSI and disbursements, in that trace order.
    pub fn compute(
        notary_base: Decimal,
        schedule: &RateSchedule,
        tracer: &mut ExplanationTracer,
    ) -> Result<NotaryFees, EstimateError> {
        let emoluments = Self::emoluments(notary_base, schedule.notary_brackets(), tracer)?;
        let csi = Self::csi(notary_base, schedule.csi_rate(), tracer);
        let disbursements = Self::disbursements(schedule.disbursement_flat(), tracer);

        Ok(NotaryFees {
            emoluments,
            csi,
            disbursements,
        })
    }

    /// Degressive émoluments over `notary_base`.
    ///
    /// Each bracket charges its marginal rate on the part of the base within
    /// `[lower_bound, upper_bound)`; the last bracket also takes everything
    /// above its upper bound. One trace line per bracket with a non-zero
    /// contribution (exact amount), then one line with the rounded total.
    pub fn emoluments(
        notary_base: Decimal,
        brackets: &[NotaryBracket],
        tracer: &mut ExplanationTracer,
    ) -> Result<Decimal, EstimateError> {
        if notary_base < Decimal::ZERO {
            return Err(EstimateError::InvalidInput(format!(
                "notary base must be non-negative, got {notary_base}"
            )));
        }

        let shares = bracket_shares(notary_base, brackets);
        let mut raw_total = Decimal::ZERO;

        for share in &shares {
            let bracket = &brackets[share.index];
            let upper = match bracket.upper_bound {
                Some(upper) if share.index + 1 < brackets.len() => upper.to_string(),
                _ => "open".to_string(),
            };

            let mut line = tracer
                .line(
                    format!("Notary bracket {}", share.index + 1),
                    "(min(base, upper_bound) − lower_bound) × marginal_rate",
                )
                .with_amount("lower_bound", bracket.lower_bound)
                .with_text("upper_bound", upper)
                .with_amount("portion", share.portion)
                .with_rate("marginal_rate", bracket.marginal_rate);
            if share.index > 0 {
                line = line.with_amount("cumulative_base", bracket.cumulative_base);
            }
            line.amount(share.contribution);

            raw_total += share.contribution;
        }

        let emoluments = round_money(raw_total);

        tracer
            .line("Notary fees (émoluments)", "Σ bracket contributions")
            .with_amount("notary_base", notary_base)
            .with_text("brackets_touched", shares.len().to_string())
            .amount(emoluments);

        Ok(emoluments)
    }

    /// Registry contribution: `base × csi_rate`, rounded half-up.
    pub fn csi(notary_base: Decimal, csi_rate: Decimal, tracer: &mut ExplanationTracer) -> Decimal {
        let csi = round_money(notary_base * csi_rate);
        tracer
            .line("CSI", "notary_base × csi_rate")
            .with_amount("notary_base", notary_base)
            .with_rate("csi_rate", csi_rate)
            .amount(csi);
        csi
    }

    /// Flat disbursements, independent of the price.
    pub fn disbursements(flat: Decimal, tracer: &mut ExplanationTracer) -> Decimal {
        tracer
            .line("Disbursements (débours)", "flat amount from rate schedule")
            .amount(flat);
        flat
    }
}

fn bracket_shares(base: Decimal, brackets: &[NotaryBracket]) -> Vec<BracketShare> {
    let mut shares = Vec::new();

    for (index, bracket) in brackets.iter().enumerate() {
        if base <= bracket.lower_bound {
            break;
        }
        let is_last = index + 1 == brackets.len();
        let top = match bracket.upper_bound {
            Some(upper) if !is_last => base.min(upper),
            _ => base,
        };
        let portion = top - bracket.lower_bound;
        let contribution = portion * bracket.marginal_rate;
        if !contribution.is_zero() {
            shares.push(BracketShare {
                index,
                portion,
                contribution,
            });
        }
    }

    shares
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
