//! API route handlers.
//!
//! All endpoints return JSON. Errors are rendered as `{ "detail": ... }`.
//! State is shared via `Arc<ApiState>`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::engine::trace::{render_text, LineItem};
use crate::engine::EstimateRunner;
use crate::rates::ScheduleHandle;
use crate::types::{EligibilityFlags, EstimateError, EstimateRequest, EstimateResult, VatRegime};

const SERVICE_NAME: &str = "Marchands de Biens API";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub schedule: ScheduleHandle,
    /// File re-read by `POST /api/rates/reload`. Reload is refused without one.
    pub rates_path: Option<PathBuf>,
}

impl ApiState {
    pub fn new(schedule: ScheduleHandle) -> Self {
        Self {
            schedule,
            rates_path: None,
        }
    }

    pub fn with_rates_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rates_path = Some(path.into());
        self
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error rendered as `{ "detail": "..." }` with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<EstimateError> for ApiError {
    fn from(err: EstimateError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Well-formed JSON that does not fit the payload (missing field,
        // wrong type) is a validation failure; anything else is a bad request.
        let status = match rejection {
            JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = %self.detail, "Request failed");
        } else {
            warn!(status = %self.status, detail = %self.detail, "Request rejected");
        }
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/estimate/run`.
#[derive(Debug, Clone, Deserialize)]
pub struct EstimatePayload {
    pub dept: String,
    /// Parsed into [`VatRegime`] after deserialisation so an unknown value
    /// gets a dedicated message.
    pub regime_tva: String,
    pub prix_achat_ttc: Decimal,
    pub prix_vente_ttc: Decimal,
    #[serde(default)]
    pub travaux_ttc: Decimal,
    #[serde(default)]
    pub frais_agence_ttc: Decimal,
    #[serde(default)]
    pub hypotheses: Hypotheses,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hypotheses {
    #[serde(default)]
    pub md_b_0715_ok: bool,
    #[serde(default)]
    pub travaux_structurants: bool,
}

impl TryFrom<EstimatePayload> for EstimateRequest {
    type Error = EstimateError;

    fn try_from(payload: EstimatePayload) -> Result<Self, Self::Error> {
        let regime: VatRegime = payload.regime_tva.parse()?;
        Ok(EstimateRequest::new(payload.dept, regime, payload.prix_achat_ttc, payload.prix_vente_ttc)
            .with_works_cost(payload.travaux_ttc)
            .with_agency_fees(payload.frais_agence_ttc)
            .with_flags(EligibilityFlags {
                reduced_dmto_eligible: payload.hypotheses.md_b_0715_ok,
                structuring_works: payload.hypotheses.travaux_structurants,
            }))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateResponse {
    pub dmto: Decimal,
    pub dmto_rate: Decimal,
    pub notary_fees: Decimal,
    pub csi: Decimal,
    pub debours: Decimal,
    pub tva_collectee: Decimal,
    pub tva_marge: Decimal,
    pub marge_brute: Decimal,
    pub net_margin: Decimal,
    pub tri: Decimal,
    pub explain: Vec<LineItem>,
    pub explain_text: String,
    pub alerts: Vec<String>,
    pub rates_version: String,
}

impl From<EstimateResult> for EstimateResponse {
    fn from(result: EstimateResult) -> Self {
        let explain_text = render_text(&result.trace);
        Self {
            dmto: result.dmto,
            dmto_rate: result.dmto_rate_used,
            notary_fees: result.notary_fees,
            csi: result.csi,
            debours: result.disbursements,
            tva_collectee: result.vat_collected,
            tva_marge: result.vat_on_margin,
            marge_brute: result.gross_margin,
            net_margin: result.net_margin,
            tri: result.tri_estimated,
            explain: result.trace,
            explain_text,
            alerts: result.alerts,
            rates_version: result.schedule_version,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub previous_version: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/estimate/run
pub async fn run_estimate(
    State(state): State<AppState>,
    payload: Result<Json<EstimatePayload>, JsonRejection>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let Json(payload) = payload?;
    let request = EstimateRequest::try_from(payload)?;

    // One schedule snapshot for the whole computation.
    let schedule = state.schedule.current().await;

    let span = info_span!("estimate", estimate_id = %Uuid::new_v4());
    let result = span.in_scope(|| EstimateRunner::new(schedule).run(&request))?;

    Ok(Json(result.into()))
}

/// GET /api/rates
pub async fn get_rates(State(state): State<AppState>) -> Response {
    let schedule = state.schedule.current().await;
    Json(&*schedule).into_response()
}

/// POST /api/rates/reload
pub async fn reload_rates(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let path = state.rates_path.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "no rates file configured for reload",
        )
    })?;

    let swap = state.schedule.reload_from(path).await?;

    info!(
        previous = %swap.previous.version(),
        version = %swap.installed.version(),
        "Rate schedule reloaded via API"
    );

    Ok(Json(ReloadResponse {
        previous_version: swap.previous.version().to_string(),
        version: swap.installed.version().to_string(),
    }))
}

/// GET /api/
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
