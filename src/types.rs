//! Shared types for the estimation engine.
//!
//! The request, result and error types form the data model used by the
//! rate schedule, the calculators and the HTTP boundary. Amounts are exact
//! decimals throughout; binary floats only appear at the JSON edge.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::trace::LineItem;

/// Largest amount accepted on any monetary input (one quadrillion euros).
/// Keeps every sum the engine performs far inside `Decimal`'s range.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

// ---------------------------------------------------------------------------
// VAT regime
// ---------------------------------------------------------------------------

/// VAT treatment applied to the resale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VatRegime {
    /// VAT on the margin between resale and purchase price (dealer resale).
    Marge,
    /// VAT on the full resale price.
    Normal,
    /// Exonerated: no VAT at all.
    Exo,
}

impl VatRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            VatRegime::Marge => "MARGE",
            VatRegime::Normal => "NORMAL",
            VatRegime::Exo => "EXO",
        }
    }
}

impl fmt::Display for VatRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VatRegime {
    type Err = EstimateError;

    /// Exact, case-sensitive match on the wire values. Anything else is an
    /// input error and is never mapped onto a default regime.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MARGE" => Ok(VatRegime::Marge),
            "NORMAL" => Ok(VatRegime::Normal),
            "EXO" => Ok(VatRegime::Exo),
            other => Err(EstimateError::InvalidRegime(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Eligibility hypotheses declared by the dealer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityFlags {
    /// Dealer commits to resell within the statutory window, unlocking the
    /// reduced DMTO rate.
    pub reduced_dmto_eligible: bool,
    /// Works on the structure of the building are planned.
    pub structuring_works: bool,
}

/// One deal to estimate. All amounts are VAT-inclusive euros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub department: String,
    pub vat_regime: VatRegime,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub works_cost: Decimal,
    pub agency_fees: Decimal,
    pub flags: EligibilityFlags,
}

impl EstimateRequest {
    /// Build a request with no works, no agency fees and no flags set.
    pub fn new(
        department: impl Into<String>,
        vat_regime: VatRegime,
        purchase_price: Decimal,
        sale_price: Decimal,
    ) -> Self {
        Self {
            department: department.into(),
            vat_regime,
            purchase_price,
            sale_price,
            works_cost: Decimal::ZERO,
            agency_fees: Decimal::ZERO,
            flags: EligibilityFlags::default(),
        }
    }

    pub fn with_works_cost(mut self, works_cost: Decimal) -> Self {
        self.works_cost = works_cost;
        self
    }

    pub fn with_agency_fees(mut self, agency_fees: Decimal) -> Self {
        self.agency_fees = agency_fees;
        self
    }

    pub fn with_flags(mut self, flags: EligibilityFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check the request, reporting the first failing constraint.
    ///
    /// A sale price below the purchase price is valid: it produces a
    /// negative-margin estimate, not an error.
    pub fn validate(&self) -> Result<(), EstimateError> {
        if !is_known_department(&self.department) {
            return Err(EstimateError::Validation(format!(
                "dept: unknown département code '{}'",
                self.department
            )));
        }

        let amounts = [
            ("prix_achat_ttc", self.purchase_price),
            ("prix_vente_ttc", self.sale_price),
            ("travaux_ttc", self.works_cost),
            ("frais_agence_ttc", self.agency_fees),
        ];
        for (field, value) in amounts {
            if value < Decimal::ZERO {
                return Err(EstimateError::Validation(format!(
                    "{field}: must be non-negative, got {value}"
                )));
            }
            if value > MAX_AMOUNT {
                return Err(EstimateError::Validation(format!(
                    "{field}: exceeds the supported maximum of {MAX_AMOUNT}"
                )));
            }
        }

        Ok(())
    }
}

/// Metropolitan département codes: "01" to "95" (no "20"), plus Corsica's
/// "2A" and "2B".
pub fn is_known_department(code: &str) -> bool {
    match code {
        "2A" | "2B" => true,
        _ => {
            code.len() == 2
                && code.bytes().all(|b| b.is_ascii_digit())
                && matches!(code.parse::<u8>(), Ok(n) if (1..=95).contains(&n) && n != 20)
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of one estimate run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateResult {
    pub dmto: Decimal,
    pub dmto_rate_used: Decimal,
    pub notary_fees: Decimal,
    pub csi: Decimal,
    pub disbursements: Decimal,
    /// Non-zero only under [`VatRegime::Normal`].
    pub vat_collected: Decimal,
    /// Non-zero only under [`VatRegime::Marge`] with a positive margin.
    pub vat_on_margin: Decimal,
    pub gross_margin: Decimal,
    pub net_margin: Decimal,
    pub tri_estimated: Decimal,
    /// Every computed figure, in computation order.
    pub trace: Vec<LineItem>,
    /// Advisory notes; they never change a figure.
    pub alerts: Vec<String>,
    /// Version label of the rate schedule the figures were computed with.
    pub schedule_version: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain error types for the estimation engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EstimateError {
    /// Malformed or out-of-range request. User-facing.
    #[error("{0}")]
    Validation(String),

    #[error("regime_tva: unrecognised VAT regime '{0}' (expected MARGE, NORMAL or EXO)")]
    InvalidRegime(String),

    /// Out-of-range value reaching a calculator directly.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Rate schedule missing or malformed at load time. Operator-facing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal consistency broken (unsorted brackets, negative bracket rate).
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl EstimateError {
    /// Whether the caller can fix this by correcting the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EstimateError::Validation(_)
                | EstimateError::InvalidRegime(_)
                | EstimateError::InvalidInput(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
