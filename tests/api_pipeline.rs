// tests/api_pipeline.rs
//
// End-to-end pipeline tests through the public router, with every model
// seam disabled: rule-based crisis detection and canned fallbacks only.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::Request,
};
use http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use wellbeing_risk_analyzer::classify::DisabledClassifier;
use wellbeing_risk_analyzer::generate::DisabledGenerator;
use wellbeing_risk_analyzer::profile::ProfileStore;
use wellbeing_risk_analyzer::safety::CRISIS_ESCALATION_MESSAGE;
use wellbeing_risk_analyzer::{create_router, AppState, RiskConfig, RiskEngine};

fn test_app() -> axum::Router {
    let engine = Arc::new(RiskEngine::new(
        &RiskConfig::default(),
        Arc::new(DisabledClassifier),
        Arc::new(DisabledClassifier),
        Arc::new(DisabledGenerator),
        Arc::new(ProfileStore::new()),
    ));
    create_router(AppState { engine })
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_version() {
    let app = test_app();
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn quiet_chat_turn_returns_full_bundle() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/chat",
        json!({"user_id": "alice", "message": "I had a long but okay day"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], json!("alice"));
    assert_eq!(body["crisis"]["is_crisis"], json!(false));
    assert_eq!(body["crisis"]["safety_override"], json!(false));
    assert!(body["matrix"]["trs"].as_f64().unwrap() <= 1.0);
    assert!(body["matrix"]["mhi"].as_f64().unwrap() <= 100.0);
    assert_eq!(body["safety"]["flagged"], json!(false));
    assert!(!body["safety"]["final_text"].as_str().unwrap().is_empty());
    // Component echo is present for auditing.
    assert!(body["matrix"]["component_scores"]["historical_trend"].is_number());
}

#[tokio::test]
async fn crisis_message_escalates_verbatim() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/chat",
        json!({"user_id": "bob", "message": "I can't go on, I want to end my life"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crisis"]["safety_override"], json!(true));
    assert_eq!(body["matrix"]["category"], json!("crisis"));
    assert!(body["matrix"]["mhi"].as_f64().unwrap() <= 15.0);
    assert_eq!(
        body["safety"]["final_text"],
        json!(CRISIS_ESCALATION_MESSAGE)
    );
    assert_eq!(body["safety"]["flagged"], json!(true));
    let matched = body["crisis"]["matched_keywords"].as_array().unwrap();
    assert!(!matched.is_empty());
}

#[tokio::test]
async fn assessment_flows_into_next_turn_screening_component() {
    let app = test_app();

    // Baseline turn: no screening on record.
    let (_, before) = post_json(
        &app,
        "/chat",
        json!({"user_id": "carol", "message": "just checking in"}),
    )
    .await;
    assert_eq!(
        before["matrix"]["component_scores"]["screening"],
        json!(0.0)
    );

    // Submit PHQ-2 = 4, GAD-2 = 3 → 7/12 = 0.5833.
    let (status, resp) = post_json(
        &app,
        "/assessment",
        json!({"user_id": "carol", "phq2": 4, "gad2": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((resp["screening_normalized"].as_f64().unwrap() - 0.5833).abs() < 1e-9);

    // The next turn picks the stored value up.
    let (_, after) = post_json(
        &app,
        "/chat",
        json!({"user_id": "carol", "message": "hello again"}),
    )
    .await;
    assert!(
        (after["matrix"]["component_scores"]["screening"].as_f64().unwrap() - 0.5833).abs()
            < 1e-9
    );
    // Higher screening risk must not raise the index.
    assert!(
        after["matrix"]["mhi"].as_f64().unwrap() <= before["matrix"]["mhi"].as_f64().unwrap()
    );
}

#[tokio::test]
async fn assessment_rejects_out_of_range_scores() {
    let app = test_app();
    let (status, _) = post_json(
        &app,
        "/assessment",
        json!({"user_id": "dave", "phq2": 9, "gad2": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = test_app();
    let (status, _) = post_json(&app, "/chat", json!({"user_id": "erin", "message": "  "})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn repeated_turns_build_profile_and_trend_readout() {
    let app = test_app();

    for _ in 0..3 {
        let (status, _) = post_json(
            &app,
            "/chat",
            json!({"user_id": "fred", "message": "another ordinary day"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, profile) = get_json(&app, "/debug/profile?user_id=fred").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["total_sessions"], json!(3));
    assert_eq!(profile["mhi_history"].as_array().unwrap().len(), 3);

    let (status, trend) = get_json(&app, "/debug/trend?user_id=fred").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trend["trend_direction"], json!("stable"));
    assert!(trend["average_mhi"].as_f64().unwrap() > 0.0);

    // Unknown users are a 404, not an empty fabrication.
    let (status, _) = get_json(&app, "/debug/profile?user_id=nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
