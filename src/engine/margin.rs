//! Margin: aggregates every cost line against the resale revenue.

use rust_decimal::Decimal;

use super::trace::ExplanationTracer;
use crate::types::VatRegime;

/// Every cost borne by the dealer on one deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostStack {
    pub purchase_price: Decimal,
    pub works_cost: Decimal,
    pub agency_fees: Decimal,
    pub dmto: Decimal,
    pub notary_fees: Decimal,
    pub csi: Decimal,
    pub disbursements: Decimal,
    /// Not recoverable by the dealer, so it is a cost.
    pub vat_on_margin: Decimal,
}

impl CostStack {
    /// Capital tied up in the deal: every cost except VAT on margin, which
    /// is only paid out of the resale.
    pub fn investment(&self) -> Decimal {
        self.purchase_price
            + self.works_cost
            + self.agency_fees
            + self.dmto
            + self.notary_fees
            + self.csi
            + self.disbursements
    }

    pub fn total_cost(&self) -> Decimal {
        self.investment() + self.vat_on_margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub total_cost: Decimal,
    /// Sale price net of any VAT collected for the Treasury.
    pub revenue: Decimal,
    pub gross: Decimal,
    pub net: Decimal,
}

pub struct MarginCalculator;

impl MarginCalculator {
    pub fn compute(
        costs: &CostStack,
        regime: VatRegime,
        sale_price: Decimal,
        vat_collected: Decimal,
        tracer: &mut ExplanationTracer,
    ) -> Margins {
        let total_cost = costs.total_cost();
        tracer
            .line(
                "Total cost",
                "purchase + works + agency + dmto + notary_fees + csi + disbursements + vat_on_margin",
            )
            .with_amount("purchase_price", costs.purchase_price)
            .with_amount("works_cost", costs.works_cost)
            .with_amount("agency_fees", costs.agency_fees)
            .with_amount("dmto", costs.dmto)
            .with_amount("notary_fees", costs.notary_fees)
            .with_amount("csi", costs.csi)
            .with_amount("disbursements", costs.disbursements)
            .with_amount("vat_on_margin", costs.vat_on_margin)
            .amount(total_cost);

        // VAT collected under NORMAL is remitted, never the dealer's revenue.
        let revenue = match regime {
            VatRegime::Normal => {
                let revenue = sale_price - vat_collected;
                tracer
                    .line("Revenue for margin", "sale_price − vat_collected")
                    .with_amount("sale_price", sale_price)
                    .with_amount("vat_collected", vat_collected)
                    .amount(revenue);
                revenue
            }
            VatRegime::Marge | VatRegime::Exo => {
                tracer
                    .line("Revenue for margin", "sale_price")
                    .with_amount("sale_price", sale_price)
                    .amount(sale_price);
                sale_price
            }
        };

        let gross = revenue - total_cost;
        tracer
            .line("Gross margin", "revenue − total_cost")
            .with_amount("revenue", revenue)
            .with_amount("total_cost", total_cost)
            .amount(gross);

        // No line item sits between gross and net yet (e.g. income tax), so
        // they are equal. Any future deduction belongs here.
        let net = gross;
        tracer
            .line("Net margin", "gross_margin (no further deductions)")
            .with_amount("gross_margin", gross)
            .amount(net);

        Margins {
            total_cost,
            revenue,
            gross,
            net,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
