//! VAT on the resale, by regime.
//!
//! Each regime ends in exactly one outcome; the match is exhaustive so a
//! new regime cannot be added without deciding its treatment here.

use rust_decimal::Decimal;

use super::round_money;
use super::trace::ExplanationTracer;
use crate::types::VatRegime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatOutcome {
    /// VAT contained in a VAT-inclusive sale price (NORMAL).
    pub vat_collected: Decimal,
    /// VAT on the dealer's margin (MARGE).
    pub vat_on_margin: Decimal,
}

impl VatOutcome {
    const NONE: VatOutcome = VatOutcome {
        vat_collected: Decimal::ZERO,
        vat_on_margin: Decimal::ZERO,
    };
}

pub struct VatCalculator;

impl VatCalculator {
    pub fn compute(
        regime: VatRegime,
        purchase_price: Decimal,
        sale_price: Decimal,
        vat_rate: Decimal,
        tracer: &mut ExplanationTracer,
    ) -> VatOutcome {
        match regime {
            VatRegime::Normal => {
                let vat_collected = extract_vat(sale_price, vat_rate);
                tracer
                    .line("VAT collected (NORMAL)", "sale_price × vat_rate / (1 + vat_rate)")
                    .with_amount("sale_price", sale_price)
                    .with_rate("vat_rate", vat_rate)
                    .amount(vat_collected);
                VatOutcome {
                    vat_collected,
                    ..VatOutcome::NONE
                }
            }
            VatRegime::Marge => {
                let raw_margin = sale_price - purchase_price;
                tracer
                    .line("Margin subject to VAT (MARGE)", "sale_price − purchase_price")
                    .with_amount("sale_price", sale_price)
                    .with_amount("purchase_price", purchase_price)
                    .amount(raw_margin);

                if raw_margin <= Decimal::ZERO {
                    tracer
                        .line("VAT on margin (MARGE)", "no VAT due on a non-positive margin")
                        .with_amount("raw_margin", raw_margin)
                        .amount(Decimal::ZERO);
                    return VatOutcome::NONE;
                }

                let vat_on_margin = extract_vat(raw_margin, vat_rate);
                tracer
                    .line("VAT on margin (MARGE)", "raw_margin × vat_rate / (1 + vat_rate)")
                    .with_amount("raw_margin", raw_margin)
                    .with_rate("vat_rate", vat_rate)
                    .amount(vat_on_margin);
                VatOutcome {
                    vat_on_margin,
                    ..VatOutcome::NONE
                }
            }
            VatRegime::Exo => {
                tracer
                    .line("VAT (EXO)", "no VAT treatment applied")
                    .amount(Decimal::ZERO);
                VatOutcome::NONE
            }
        }
    }
}

/// VAT contained in a VAT-inclusive amount, rounded half-up to the cent.
fn extract_vat(amount_incl: Decimal, vat_rate: Decimal) -> Decimal {
    round_money(amount_incl * vat_rate / (Decimal::ONE + vat_rate))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
