//! HTTP API tests, driving the router in-process with `oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use mdb_estimator::api::{build_router, ApiState};
use mdb_estimator::rates::{RateSchedule, ScheduleHandle};

const RATES: &str = include_str!("../../rates.toml");

fn state() -> ApiState {
    ApiState::new(ScheduleHandle::new(RateSchedule::from_toml_str(RATES).unwrap()))
}

fn app() -> Router {
    build_router(Arc::new(state()))
}

fn temp_rates(tag: &str, contents: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("mdb_api_rates_{tag}_{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&p, contents).unwrap();
    p
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn scenario_a() -> Value {
    json!({
        "dept": "75",
        "regime_tva": "MARGE",
        "prix_achat_ttc": 320000,
        "prix_vente_ttc": 550000,
        "travaux_ttc": 85000,
        "frais_agence_ttc": 16000,
        "hypotheses": { "md_b_0715_ok": true, "travaux_structurants": false }
    })
}

fn close(value: &Value, expected: f64) -> bool {
    (value.as_f64().unwrap() - expected).abs() < 1e-6
}

// ---------------------------------------------------------------------------
// Estimate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_estimate_run_ok() {
    let (status, json) = send(app(), post_json("/api/estimate/run", &scenario_a().to_string())).await;
    assert_eq!(status, StatusCode::OK);

    assert!(close(&json["dmto"], 2288.0));
    assert!(close(&json["dmto_rate"], 0.00715));
    assert!(close(&json["notary_fees"], 4376.10));
    assert!(close(&json["csi"], 320.0));
    assert!(close(&json["debours"], 800.0));
    assert!(close(&json["tva_collectee"], 0.0));
    assert!(close(&json["tva_marge"], 38333.33));
    assert!(close(&json["marge_brute"], 82882.57));
    assert!(close(&json["net_margin"], 82882.57));
    assert!(close(&json["tri"], 0.1933));
    assert_eq!(json["rates_version"], "2025-01-01");
    assert_eq!(json["alerts"].as_array().unwrap().len(), 0);

    let explain = json["explain"].as_array().unwrap();
    assert!(!explain.is_empty());
    assert_eq!(explain[0]["label"], "DMTO rate selection (reduced)");
    assert_eq!(explain.last().unwrap()["label"], "TRI estimate");

    let text = json["explain_text"].as_str().unwrap();
    assert_eq!(text.lines().count(), explain.len());
    assert!(text.starts_with("1. DMTO rate selection (reduced)"));
}

#[tokio::test]
async fn test_estimate_optional_fields_default() {
    let body = json!({
        "dept": "2B",
        "regime_tva": "EXO",
        "prix_achat_ttc": 200000,
        "prix_vente_ttc": 260000
    });
    let (status, json) = send(app(), post_json("/api/estimate/run", &body.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(close(&json["dmto_rate"], 0.045));
    assert!(close(&json["tva_marge"], 0.0));
}

#[tokio::test]
async fn test_estimate_alerts() {
    let mut body = scenario_a();
    body["hypotheses"] = json!({ "md_b_0715_ok": false, "travaux_structurants": true });
    let (status, json) = send(app(), post_json("/api/estimate/run", &body.to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let alerts = json["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts[0].as_str().unwrap().contains("décennale"));
    assert!(alerts[1].as_str().unwrap().contains("268"));
}

#[tokio::test]
async fn test_estimate_negative_amount_422() {
    let mut body = scenario_a();
    body["prix_achat_ttc"] = json!(-1);
    let (status, json) = send(app(), post_json("/api/estimate/run", &body.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["detail"].as_str().unwrap().starts_with("prix_achat_ttc"));
}

#[tokio::test]
async fn test_estimate_unknown_department_422() {
    let mut body = scenario_a();
    body["dept"] = json!("99");
    let (status, json) = send(app(), post_json("/api/estimate/run", &body.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["detail"].as_str().unwrap().contains("99"));
}

#[tokio::test]
async fn test_estimate_unknown_regime_422() {
    let mut body = scenario_a();
    body["regime_tva"] = json!("marge");
    let (status, json) = send(app(), post_json("/api/estimate/run", &body.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["detail"].as_str().unwrap().starts_with("regime_tva"));
}

#[tokio::test]
async fn test_estimate_missing_field_422() {
    let mut body = scenario_a();
    body.as_object_mut().unwrap().remove("prix_vente_ttc");
    let (status, json) = send(app(), post_json("/api/estimate/run", &body.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["detail"].as_str().unwrap().contains("prix_vente_ttc"));
}

#[tokio::test]
async fn test_estimate_malformed_json_400() {
    let (status, json) = send(app(), post_json("/api/estimate/run", "{\"dept\": ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].is_string());
}

#[tokio::test]
async fn test_estimate_missing_content_type_400() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/estimate/run")
        .body(Body::from(scenario_a().to_string()))
        .unwrap();
    let (status, json) = send(app(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].is_string());
}

// ---------------------------------------------------------------------------
// Service endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_endpoint() {
    let (status, _) = send(app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_service_info() {
    let (status, json) = send(app(), get("/api/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Marchands de Biens API");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_rates_view() {
    let (status, json) = send(app(), get("/api/rates")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], "2025-01-01");
    assert_eq!(json["notary_brackets"].as_array().unwrap().len(), 4);
    assert!(close(&json["notary_brackets"][3]["cumulative_base"], 1204.1));
    assert!(json["department_dmto_rates"]["75"].is_number());
}

// ---------------------------------------------------------------------------
// Reload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reload_swaps_schedule() {
    let path = temp_rates("ok", &RATES.replacen("version = \"2025-01-01\"", "version = \"2026-01-01\"", 1));
    let app = build_router(Arc::new(state().with_rates_path(&path)));

    let (status, json) = send(app.clone(), post_json("/api/rates/reload", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["previous_version"], "2025-01-01");
    assert_eq!(json["version"], "2026-01-01");

    let (_, json) = send(app.clone(), post_json("/api/estimate/run", &scenario_a().to_string())).await;
    assert_eq!(json["rates_version"], "2026-01-01");

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_reload_invalid_file_keeps_schedule() {
    let path = temp_rates("bad", &RATES.replacen("rate = 0.0380", "rate = -0.0380", 1));
    let app = build_router(Arc::new(state().with_rates_path(&path)));

    let (status, json) = send(app.clone(), post_json("/api/rates/reload", "")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().contains("Invariant"));

    let (_, json) = send(app, get("/api/rates")).await;
    assert_eq!(json["version"], "2025-01-01");

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_reload_without_configured_path() {
    let (status, json) = send(app(), post_json("/api/rates/reload", "")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().contains("no rates file"));
}
