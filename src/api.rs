use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::engine::{RiskEngine, TurnBundle};
use crate::matrix::Category;
use crate::profile::MhiSample;
use crate::signals::screening_risk;
use crate::trend::trend_direction;

pub const MESSAGE_MAX_LEN: usize = 4096;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RiskEngine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/assessment", post(assessment))
        .route("/debug/profile", get(debug_profile))
        .route("/debug/trend", get(debug_trend))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn default_user_id() -> String {
    "default_user".to_string()
}

#[derive(Deserialize)]
struct ChatReq {
    message: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

fn unprocessable(msg: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiError {
            error: msg.to_string(),
        }),
    )
}

/// POST /chat — run one message through the full risk pipeline.
///
/// The pipeline itself is infallible; the task spawn around it maps any
/// unexpected internal fault to the crisis-caution bundle instead of a 500.
async fn chat(State(state): State<AppState>, Json(body): Json<ChatReq>) -> impl IntoResponse {
    if body.message.trim().is_empty() {
        return unprocessable("message must not be empty").into_response();
    }
    if body.message.len() > MESSAGE_MAX_LEN {
        return unprocessable("message exceeds maximum length").into_response();
    }

    let engine = state.engine.clone();
    let user_id = body.user_id.clone();
    let message = body.message;

    let bundle: TurnBundle =
        match tokio::spawn(async move { engine.process_turn(&user_id, &message).await }).await {
            Ok(bundle) => bundle,
            Err(err) => {
                tracing::error!(error = ?err, "turn pipeline fault, returning crisis caution");
                TurnBundle::crisis_caution(&body.user_id)
            }
        };

    Json(bundle).into_response()
}

#[derive(Deserialize)]
struct AssessmentReq {
    user_id: String,
    #[serde(default)]
    phq2: Option<u8>,
    #[serde(default)]
    gad2: Option<u8>,
}

#[derive(Serialize)]
struct AssessmentResp {
    user_id: String,
    phq2_score: Option<u8>,
    gad2_score: Option<u8>,
    screening_normalized: f64,
    timestamp: DateTime<Utc>,
}

/// POST /assessment — PHQ-2 / GAD-2 self-report submission.
/// Screening is held constant across chat turns until the next submission.
async fn assessment(
    State(state): State<AppState>,
    Json(body): Json<AssessmentReq>,
) -> impl IntoResponse {
    if body.user_id.trim().is_empty() {
        return unprocessable("user_id must not be empty").into_response();
    }
    for (name, v) in [("phq2", body.phq2), ("gad2", body.gad2)] {
        if let Some(v) = v {
            if v > 6 {
                return unprocessable(&format!("{name} must be in 0..=6, got {v}"))
                    .into_response();
            }
        }
    }

    let normalized = screening_risk(body.phq2, body.gad2);
    let now = Utc::now();
    state
        .engine
        .profiles()
        .record_assessment(&body.user_id, body.phq2, body.gad2, normalized, now);

    info!(
        user = %body.user_id,
        normalized,
        "assessment recorded"
    );

    Json(AssessmentResp {
        user_id: body.user_id,
        phq2_score: body.phq2,
        gad2_score: body.gad2,
        screening_normalized: normalized,
        timestamp: now,
    })
    .into_response()
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
}

async fn health() -> Json<HealthResp> {
    Json(HealthResp {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

async fn debug_profile(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let user_id = q.get("user_id").cloned().unwrap_or_default();
    match state.engine.profiles().get(&user_id) {
        Some(profile) => Json(profile).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: format!("no profile for user '{user_id}'"),
            }),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct TrendResp {
    user_id: String,
    mhi_history: Vec<MhiSample>,
    average_mhi: f64,
    latest_category: Category,
    trend_direction: &'static str,
}

async fn debug_trend(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let user_id = q.get("user_id").cloned().unwrap_or_default();
    let Some(profile) = state.engine.profiles().get(&user_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: format!("no profile for user '{user_id}'"),
            }),
        )
            .into_response();
    };

    let values: Vec<f64> = profile.mhi_history.iter().map(|s| s.mhi).collect();
    let average_mhi = if values.is_empty() {
        profile.latest_mhi
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };

    Json(TrendResp {
        user_id: profile.user_id.clone(),
        mhi_history: profile.mhi_history.clone(),
        average_mhi,
        latest_category: profile.latest_category,
        trend_direction: trend_direction(&values),
    })
    .into_response()
}
