//! Rate schedule: the immutable tables every estimate is computed against.
//!
//! A schedule is deserialised from TOML into [`RateScheduleConfig`], then
//! checked and frozen into a [`RateSchedule`]. Once built it is never
//! mutated; callers share it behind an `Arc`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::types::{is_known_department, EstimateError, MAX_AMOUNT};

/// Upper bound on the structuring-works multiplier applied to the notary base.
pub const MAX_STRUCTURING_WORKS_FACTOR: Decimal = Decimal::TEN;

// ---------------------------------------------------------------------------
// Raw configuration (as written in the TOML file)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RateScheduleConfig {
    pub version: String,
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    pub dmto: DmtoRatesConfig,
    pub notary: NotaryRatesConfig,
    pub vat: VatRatesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DmtoRatesConfig {
    pub standard_rate: Decimal,
    pub reduced_rate: Decimal,
    /// Per-département replacements for the standard rate.
    #[serde(default)]
    pub departments: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotaryRatesConfig {
    pub csi_rate: Decimal,
    pub disbursement_flat: Decimal,
    /// Multiplier applied to the notary base when structuring works are
    /// declared. 1 leaves the base unchanged.
    #[serde(default = "default_structuring_factor")]
    pub structuring_works_factor: Decimal,
    #[serde(default)]
    pub brackets: Vec<NotaryBracketConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotaryBracketConfig {
    /// Absent only on an open-ended last bracket.
    #[serde(default)]
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
    /// Optional cross-check against the fee accrued below this bracket.
    #[serde(default)]
    pub cumulative_base: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VatRatesConfig {
    pub rate: Decimal,
}

fn default_structuring_factor() -> Decimal {
    Decimal::ONE
}

// ---------------------------------------------------------------------------
// Validated schedule
// ---------------------------------------------------------------------------

/// One band of the degressive émolument scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotaryBracket {
    pub lower_bound: Decimal,
    /// `None` for an open-ended top bracket.
    pub upper_bound: Option<Decimal>,
    pub marginal_rate: Decimal,
    /// Émoluments accrued on everything below `lower_bound`.
    pub cumulative_base: Decimal,
}

/// Immutable rate tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSchedule {
    version: String,
    effective_from: Option<NaiveDate>,
    standard_dmto_rate: Decimal,
    reduced_dmto_rate: Decimal,
    department_dmto_rates: BTreeMap<String, Decimal>,
    csi_rate: Decimal,
    vat_rate: Decimal,
    disbursement_flat: Decimal,
    structuring_works_factor: Decimal,
    notary_brackets: Vec<NotaryBracket>,
}

impl RateSchedule {
    /// Read and validate a schedule file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EstimateError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EstimateError::Configuration(format!(
                "failed to read rate schedule {}: {e}",
                path.display()
            ))
        })?;
        let schedule = Self::from_toml_str(&contents)?;
        info!(
            path = %path.display(),
            version = %schedule.version,
            brackets = schedule.notary_brackets.len(),
            overrides = schedule.department_dmto_rates.len(),
            "Rate schedule loaded"
        );
        Ok(schedule)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, EstimateError> {
        let config: RateScheduleConfig = toml::from_str(contents).map_err(|e| {
            EstimateError::Configuration(format!("failed to parse rate schedule: {e}"))
        })?;
        Self::from_config(config)
    }

    /// Check every rate and the bracket table, deriving cumulative bases.
    pub fn from_config(config: RateScheduleConfig) -> Result<Self, EstimateError> {
        if config.version.trim().is_empty() {
            return Err(EstimateError::Configuration(
                "schedule version label is empty".into(),
            ));
        }

        check_fraction("dmto.standard_rate", config.dmto.standard_rate)?;
        check_fraction("dmto.reduced_rate", config.dmto.reduced_rate)?;
        check_fraction("notary.csi_rate", config.notary.csi_rate)?;
        check_fraction("vat.rate", config.vat.rate)?;

        for (dept, rate) in &config.dmto.departments {
            if !is_known_department(dept) {
                return Err(EstimateError::Configuration(format!(
                    "dmto.departments: unknown département code '{dept}'"
                )));
            }
            check_fraction(&format!("dmto.departments.{dept}"), *rate)?;
        }

        // Every figure is bounded so that no request within MAX_AMOUNT can
        // overflow the decimal range.
        let disbursement = config.notary.disbursement_flat;
        if disbursement < Decimal::ZERO || disbursement > MAX_AMOUNT {
            return Err(EstimateError::Configuration(format!(
                "notary.disbursement_flat must be within [0, {MAX_AMOUNT}], got {disbursement}"
            )));
        }
        let factor = config.notary.structuring_works_factor;
        if factor <= Decimal::ZERO || factor > MAX_STRUCTURING_WORKS_FACTOR {
            return Err(EstimateError::Configuration(format!(
                "notary.structuring_works_factor must be within (0, {MAX_STRUCTURING_WORKS_FACTOR}], got {factor}"
            )));
        }

        let notary_brackets = build_brackets(&config.notary.brackets)?;

        Ok(Self {
            version: config.version,
            effective_from: config.effective_from,
            standard_dmto_rate: config.dmto.standard_rate,
            reduced_dmto_rate: config.dmto.reduced_rate,
            department_dmto_rates: config.dmto.departments,
            csi_rate: config.notary.csi_rate,
            vat_rate: config.vat.rate,
            disbursement_flat: config.notary.disbursement_flat,
            structuring_works_factor: config.notary.structuring_works_factor,
            notary_brackets,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn effective_from(&self) -> Option<NaiveDate> {
        self.effective_from
    }

    pub fn standard_dmto_rate(&self) -> Decimal {
        self.standard_dmto_rate
    }

    pub fn reduced_dmto_rate(&self) -> Decimal {
        self.reduced_dmto_rate
    }

    /// The département's standard-rate replacement, if one is configured.
    pub fn department_dmto_rate(&self, department: &str) -> Option<Decimal> {
        self.department_dmto_rates.get(department).copied()
    }

    pub fn department_dmto_rates(&self) -> &BTreeMap<String, Decimal> {
        &self.department_dmto_rates
    }

    pub fn csi_rate(&self) -> Decimal {
        self.csi_rate
    }

    pub fn vat_rate(&self) -> Decimal {
        self.vat_rate
    }

    pub fn disbursement_flat(&self) -> Decimal {
        self.disbursement_flat
    }

    pub fn structuring_works_factor(&self) -> Decimal {
        self.structuring_works_factor
    }

    /// Brackets in ascending order; never empty.
    pub fn notary_brackets(&self) -> &[NotaryBracket] {
        &self.notary_brackets
    }

    /// Reference schedule used across the crate's tests.
    #[cfg(test)]
    pub fn sample() -> Self {
        Self::from_toml_str(include_str!("../../rates.toml")).expect("reference rates.toml is valid")
    }
}

fn check_fraction(field: &str, rate: Decimal) -> Result<(), EstimateError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(EstimateError::Configuration(format!(
            "{field} must be a fraction within [0, 1], got {rate}"
        )));
    }
    Ok(())
}

fn build_brackets(raw: &[NotaryBracketConfig]) -> Result<Vec<NotaryBracket>, EstimateError> {
    if raw.is_empty() {
        return Err(EstimateError::Configuration(
            "notary.brackets: bracket table is missing or empty".into(),
        ));
    }

    let mut brackets = Vec::with_capacity(raw.len());
    let mut lower = Decimal::ZERO;
    let mut cumulative = Decimal::ZERO;

    for (i, b) in raw.iter().enumerate() {
        let is_last = i + 1 == raw.len();

        if b.rate < Decimal::ZERO {
            return Err(EstimateError::Invariant(format!(
                "notary bracket {i} has a negative rate {}",
                b.rate
            )));
        }
        check_fraction(&format!("notary.brackets[{i}].rate"), b.rate)?;
        if let Some(upper) = b.upper_bound {
            if upper > MAX_AMOUNT {
                return Err(EstimateError::Configuration(format!(
                    "notary.brackets[{i}].upper_bound must not exceed {MAX_AMOUNT}, got {upper}"
                )));
            }
        }

        if let Some(expected) = b.cumulative_base {
            if expected != cumulative {
                return Err(EstimateError::Invariant(format!(
                    "notary bracket {i} declares cumulative base {expected}, table yields {cumulative}"
                )));
            }
        }

        match b.upper_bound {
            Some(upper) if upper <= lower => {
                return Err(EstimateError::Invariant(format!(
                    "notary bracket {i} upper bound {upper} is not above {lower}; brackets must ascend"
                )));
            }
            None if !is_last => {
                return Err(EstimateError::Invariant(format!(
                    "notary bracket {i} is open-ended but is not the last bracket"
                )));
            }
            _ => {}
        }

        brackets.push(NotaryBracket {
            lower_bound: lower,
            upper_bound: b.upper_bound,
            marginal_rate: b.rate,
            cumulative_base: cumulative,
        });

        if let Some(upper) = b.upper_bound {
            cumulative += (upper - lower) * b.rate;
            lower = upper;
        }
    }

    Ok(brackets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
