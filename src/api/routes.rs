use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::health::HealthState;
use crate::config::RECENT_DEFAULT_LIMIT;
use crate::error::AppError;
use crate::ledger::{PredictionLedger, PredictionRow, RecordOutcome};
use crate::resolver::{Reconciler, ReconcileOutcome};
use crate::stats::compute_stats;
use crate::types::{Prediction, StatsPeriod, WeightConfig, WindowedStats};
use crate::weights::WeightEngine;

#[derive(Clone)]
pub struct ApiState {
    pub ledger: PredictionLedger,
    pub reconciler: Arc<Reconciler>,
    pub weights: Arc<WeightEngine>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/predictions", post(record_prediction))
        .route("/predictions/recent", get(recent_predictions))
        .route("/reconcile", post(trigger_reconcile))
        .route("/stats", get(get_stats))
        .route("/weights", get(get_weights))
        .route("/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub period: Option<StatsPeriod>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn record_prediction(
    State(state): State<ApiState>,
    Json(prediction): Json<Prediction>,
) -> Result<Json<RecordOutcome>, AppError> {
    let outcome = state.ledger.record(&prediction).await?;
    Ok(Json(outcome))
}

async fn recent_predictions(
    State(state): State<ApiState>,
    Query(params): Query<RecentQuery>,
) -> Result<Json<Vec<PredictionRow>>, AppError> {
    let limit = params.limit.unwrap_or(RECENT_DEFAULT_LIMIT).max(1);
    let rows = state.ledger.fetch_recent(limit).await?;
    Ok(Json(rows))
}

async fn trigger_reconcile(
    State(state): State<ApiState>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    let outcome = state.reconciler.reconcile_pending().await?;
    Ok(Json(outcome))
}

async fn get_stats(
    State(state): State<ApiState>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<WindowedStats>, AppError> {
    let period = params.period.unwrap_or(StatsPeriod::All);
    let stats = compute_stats(&state.ledger, period, Utc::now()).await?;
    Ok(Json(stats))
}

/// Always answers with a usable weight set; degraded calibration shows up
/// only in the `version` field, never as an error.
async fn get_weights(State(state): State<ApiState>) -> Json<WeightConfig> {
    Json(state.weights.get_weights().await)
}

async fn get_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "last_reconcile_at": state.health.last_reconcile_at(),
        "last_resolved_count": state.health.last_resolved_count(),
        "pending_count": state.health.pending_count(),
    }))
}
