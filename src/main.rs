//! Risk Analyzer Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, model adapters, and state.
//!
//! An invalid risk config is fatal here on purpose: the service must refuse
//! to serve rather than run with unvalidated weights or thresholds.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wellbeing_risk_analyzer::api::{create_router, AppState};
use wellbeing_risk_analyzer::classify::build_classifiers;
use wellbeing_risk_analyzer::config::RiskConfig;
use wellbeing_risk_analyzer::engine::RiskEngine;
use wellbeing_risk_analyzer::generate::DisabledGenerator;
use wellbeing_risk_analyzer::metrics::Metrics;
use wellbeing_risk_analyzer::profile::ProfileStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wellbeing_risk_analyzer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RiskConfig::load()?;
    tracing::info!(
        crisis_threshold = cfg.thresholds.crisis,
        override_threshold = cfg.thresholds.safety_override,
        models_enabled = cfg.models.enabled,
        "risk config loaded"
    );

    let metrics = Metrics::init(cfg.thresholds.crisis, cfg.thresholds.safety_override);

    let (emotion_model, crisis_model) = build_classifiers(&cfg.models);
    let profiles = Arc::new(ProfileStore::new());

    // The generation backend is a pluggable collaborator; the service runs
    // with the canned fallback replies until one is wired in.
    let engine = Arc::new(RiskEngine::new(
        &cfg,
        emotion_model,
        crisis_model,
        Arc::new(DisabledGenerator),
        profiles,
    ));

    let app = create_router(AppState { engine }).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "risk analyzer listening");
    axum::serve(listener, app).await?;
    Ok(())
}
