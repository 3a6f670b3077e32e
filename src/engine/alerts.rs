//! Advisory alerts raised from the deal's hypotheses.
//!
//! Alerts are informational only and never feed back into any figure.

use crate::types::{EstimateRequest, VatRegime};

pub const STRUCTURING_WORKS_ALERT: &str =
    "structuring works declared: check the ten-year builder's liability (garantie décennale) cover";

pub const MARGIN_VAT_WITHOUT_DEALER_STATUS_ALERT: &str =
    "VAT on margin without dealer status: check the conditions of CGI article 268";

pub struct AlertAdvisor;

impl AlertAdvisor {
    pub fn advise(request: &EstimateRequest) -> Vec<String> {
        let mut alerts = Vec::new();

        if request.flags.structuring_works {
            alerts.push(STRUCTURING_WORKS_ALERT.to_string());
        }
        if request.vat_regime == VatRegime::Marge && !request.flags.reduced_dmto_eligible {
            alerts.push(MARGIN_VAT_WITHOUT_DEALER_STATUS_ALERT.to_string());
        }

        alerts
    }
}
