//! Estimation engine over eligibility, duties, fees, VAT, margin and TRI.
//!
//! [`EstimateRunner`] drives the calculators in a fixed order against one
//! shared [`RateSchedule`]:
//! eligibility → DMTO → notary fees → VAT → margin → TRI → alerts.
//! Every step appends to one ordered trace. The runner holds no state
//! between calls, so a single instance serves any number of concurrent
//! requests.

pub mod alerts;
pub mod dmto;
pub mod eligibility;
pub mod margin;
pub mod notary;
pub mod trace;
pub mod tri;
pub mod vat;

use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, info};

use crate::rates::RateSchedule;
use crate::types::{EstimateError, EstimateRequest, EstimateResult};
use alerts::AlertAdvisor;
use dmto::DmtoCalculator;
use eligibility::EligibilityResolver;
use margin::{CostStack, MarginCalculator};
use notary::NotaryFeeCalculator;
use trace::ExplanationTracer;
use tri::TriEstimator;
use vat::VatCalculator;

/// Round half-up (away from zero) to the cent.
pub(crate) fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct EstimateRunner {
    schedule: Arc<RateSchedule>,
}

impl EstimateRunner {
    pub fn new(schedule: Arc<RateSchedule>) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &RateSchedule {
        &self.schedule
    }

    /// Validate the request and compute the full estimate.
    ///
    /// Pure in (request, schedule): the same pair always yields the same
    /// result, trace order included.
    pub fn run(&self, request: &EstimateRequest) -> Result<EstimateResult, EstimateError> {
        request.validate()?;

        let schedule = &*self.schedule;
        let mut tracer = ExplanationTracer::new();

        let eligibility = EligibilityResolver::resolve(request, schedule, &mut tracer);
        let dmto = DmtoCalculator::compute(request.purchase_price, &eligibility, &mut tracer)?;
        let fees = NotaryFeeCalculator::compute(eligibility.notary_base, schedule, &mut tracer)?;
        let vat = VatCalculator::compute(
            request.vat_regime,
            request.purchase_price,
            request.sale_price,
            schedule.vat_rate(),
            &mut tracer,
        );

        let costs = CostStack {
            purchase_price: request.purchase_price,
            works_cost: request.works_cost,
            agency_fees: request.agency_fees,
            dmto,
            notary_fees: fees.emoluments,
            csi: fees.csi,
            disbursements: fees.disbursements,
            vat_on_margin: vat.vat_on_margin,
        };
        let margins = MarginCalculator::compute(
            &costs,
            request.vat_regime,
            request.sale_price,
            vat.vat_collected,
            &mut tracer,
        );
        let tri = TriEstimator::estimate(margins.net, &costs, &mut tracer);

        let alerts = AlertAdvisor::advise(request);

        debug!(
            lines = tracer.len(),
            alerts = alerts.len(),
            rate_kind = %eligibility.rate_kind,
            "Estimate trace assembled"
        );
        info!(
            dept = %request.department,
            regime = %request.vat_regime,
            schedule = %schedule.version(),
            dmto = %dmto,
            notary_fees = %fees.emoluments,
            gross_margin = %margins.gross,
            tri = %tri,
            "Estimate computed"
        );

        Ok(EstimateResult {
            dmto,
            dmto_rate_used: eligibility.dmto_rate,
            notary_fees: fees.emoluments,
            csi: fees.csi,
            disbursements: fees.disbursements,
            vat_collected: vat.vat_collected,
            vat_on_margin: vat.vat_on_margin,
            gross_margin: margins.gross,
            net_margin: margins.net,
            tri_estimated: tri,
            trace: tracer.into_items(),
            alerts,
            schedule_version: schedule.version().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
