//! Eligibility resolver: which DMTO rate applies and what the notary base is.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use super::round_money;
use super::trace::ExplanationTracer;
use crate::rates::RateSchedule;
use crate::types::{EstimateRequest, VatRegime};

/// Where the selected DMTO rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DmtoRateKind {
    Standard,
    DepartmentOverride,
    Reduced,
}

impl fmt::Display for DmtoRateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmtoRateKind::Standard => write!(f, "standard"),
            DmtoRateKind::DepartmentOverride => write!(f, "département override"),
            DmtoRateKind::Reduced => write!(f, "reduced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub dmto_rate: Decimal,
    pub rate_kind: DmtoRateKind,
    /// Base for émoluments and CSI.
    pub notary_base: Decimal,
}

pub struct EligibilityResolver;

impl EligibilityResolver {
    /// Select the DMTO rate and notary base. Emits exactly one trace line.
    ///
    /// The reduced rate needs both the declared eligibility and a VAT-bearing
    /// regime; an exonerated deal always takes the standard (or département)
    /// rate. Structuring works scale the notary base by the schedule's
    /// factor, which is 1 unless the rate table says otherwise.
    pub fn resolve(
        request: &EstimateRequest,
        schedule: &RateSchedule,
        tracer: &mut ExplanationTracer,
    ) -> Eligibility {
        let regime_allows_reduction = match request.vat_regime {
            VatRegime::Marge | VatRegime::Normal => true,
            VatRegime::Exo => false,
        };

        let (dmto_rate, rate_kind, reason) = if request.flags.reduced_dmto_eligible
            && regime_allows_reduction
        {
            (
                schedule.reduced_dmto_rate(),
                DmtoRateKind::Reduced,
                format!("dealer eligibility declared under {} regime", request.vat_regime),
            )
        } else {
            let reason = if request.flags.reduced_dmto_eligible {
                "exonerated deal: reduced rate not applicable".to_string()
            } else {
                "reduced-rate eligibility not declared".to_string()
            };
            match schedule.department_dmto_rate(&request.department) {
                Some(rate) => (
                    rate,
                    DmtoRateKind::DepartmentOverride,
                    format!("{reason}; rate configured for département {}", request.department),
                ),
                None => (schedule.standard_dmto_rate(), DmtoRateKind::Standard, reason),
            }
        };

        let factor = if request.flags.structuring_works {
            schedule.structuring_works_factor()
        } else {
            Decimal::ONE
        };
        let notary_base = round_money(request.purchase_price * factor);

        tracer
            .line(
                format!("DMTO rate selection ({rate_kind})"),
                "reduced if eligible and regime in {MARGE, NORMAL}, else département or standard rate",
            )
            .with_text("dept", request.department.clone())
            .with_text("regime", request.vat_regime.as_str())
            .with_flag("reduced_dmto_eligible", request.flags.reduced_dmto_eligible)
            .with_text("reason", reason)
            .with_flag("structuring_works", request.flags.structuring_works)
            .with_rate("structuring_works_factor", factor)
            .with_amount("notary_base", notary_base)
            .amount(dmto_rate);

        Eligibility {
            dmto_rate,
            rate_kind,
            notary_base,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
