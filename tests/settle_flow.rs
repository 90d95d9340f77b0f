//! Full-loop test: record a prediction, settle it against provider results,
//! and read the calibration inputs back out of the aggregator.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;

use prediction_tracker::api::health::HealthState;
use prediction_tracker::config::Config;
use prediction_tracker::ledger::PredictionLedger;
use prediction_tracker::resolver::Reconciler;
use prediction_tracker::stats::compute_stats;
use prediction_tracker::types::{
    FinishedEvent, Pick, Prediction, PredictionStatus, StatsPeriod, StreakKind,
};
use prediction_tracker::weights::WeightEngine;

async fn test_ledger() -> PredictionLedger {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    PredictionLedger::new(pool)
}

fn test_config() -> Config {
    Config {
        results_api_url: "http://127.0.0.1:8090".to_string(),
        log_level: "info".to_string(),
        db_path: ":memory:".to_string(),
        api_port: 0,
        reconcile_interval_secs: 1800,
        results_lookback_hours: 48,
    }
}

fn prediction(match_id: &str, home: &str, away: &str) -> Prediction {
    Prediction {
        match_id: match_id.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        league: "Premier League".to_string(),
        sport: "football".to_string(),
        kickoff_at: Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap(),
        predicted: Pick::Home,
        confidence: 80.0,
        rationale: "home side unbeaten in six".to_string(),
        home_odds: Some(1.8),
        away_odds: Some(4.2),
        draw_odds: Some(3.6),
    }
}

#[tokio::test]
async fn record_reconcile_stats_round_trip() {
    let ledger = test_ledger().await;
    let reconciler = Reconciler::new(test_config(), ledger.clone(), Arc::new(HealthState::new()));

    // Record while pending.
    let out = ledger.record(&prediction("M1", "A", "B")).await.unwrap();
    assert!(out.is_new);

    // Provider reports M1 finished 2-1.
    let events = vec![FinishedEvent {
        id: Some("M1".to_string()),
        home_team: "A".to_string(),
        away_team: "B".to_string(),
        home_score: 2,
        away_score: 1,
    }];

    let outcome = reconciler.reconcile_with(&events).await.unwrap();
    assert_eq!(outcome.resolved_count, 1);
    assert_eq!(outcome.total_pending, 1);

    let row = ledger.fetch("M1").await.unwrap().unwrap();
    assert_eq!(row.status, PredictionStatus::Won);
    // 100 * (1.8 - 1.0)
    assert!((row.profit.unwrap() - 80.0).abs() < 1e-9);

    let stats = compute_stats(&ledger, StatsPeriod::All, Utc::now()).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.wins, 1);
    assert_eq!(stats.win_rate, 100.0);
    assert_eq!(stats.roi_pct, 80.0);
    assert_eq!(stats.streak.kind, StreakKind::Win);
    assert_eq!(stats.streak.count, 1);
    // Confidence 80 lands in the high tier.
    assert_eq!(stats.tiers.high.total, 1);
    assert_eq!(stats.tiers.high.wins, 1);
}

#[tokio::test]
async fn redundant_sweeps_never_double_count() {
    let ledger = test_ledger().await;
    let reconciler = Reconciler::new(test_config(), ledger.clone(), Arc::new(HealthState::new()));

    ledger.record(&prediction("M1", "A", "B")).await.unwrap();
    let events = vec![FinishedEvent {
        id: Some("M1".to_string()),
        home_team: "A".to_string(),
        away_team: "B".to_string(),
        home_score: 2,
        away_score: 1,
    }];

    reconciler.reconcile_with(&events).await.unwrap();
    let second = reconciler.reconcile_with(&events).await.unwrap();
    assert_eq!(second.resolved_count, 0);

    // Profit is counted exactly once downstream.
    let stats = compute_stats(&ledger, StatsPeriod::All, Utc::now()).await.unwrap();
    assert_eq!(stats.total, 1);
    assert!((stats.total_profit - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn upsert_then_settle_uses_latest_payload() {
    let ledger = test_ledger().await;
    let reconciler = Reconciler::new(test_config(), ledger.clone(), Arc::new(HealthState::new()));

    ledger.record(&prediction("M1", "A", "B")).await.unwrap();
    // Odds drift before kickoff; the app re-records its pick.
    let mut updated = prediction("M1", "A", "B");
    updated.home_odds = Some(2.1);
    let out = ledger.record(&updated).await.unwrap();
    assert!(!out.is_new);

    let recent = ledger.fetch_recent(10).await.unwrap();
    assert_eq!(recent.len(), 1);

    let events = vec![FinishedEvent {
        id: Some("M1".to_string()),
        home_team: "A".to_string(),
        away_team: "B".to_string(),
        home_score: 1,
        away_score: 0,
    }];
    let outcome = reconciler.reconcile_with(&events).await.unwrap();
    // Settled against the re-recorded odds: 100 * (2.1 - 1.0).
    assert!((outcome.resolved[0].profit - 110.0).abs() < 1e-9);
}

#[tokio::test]
async fn weights_stay_static_until_history_is_deep_enough() {
    let ledger = test_ledger().await;
    let reconciler = Reconciler::new(test_config(), ledger.clone(), Arc::new(HealthState::new()));

    // A handful of settled predictions is not enough history to calibrate.
    for i in 0..5 {
        let id = format!("M{i}");
        ledger.record(&prediction(&id, &format!("H{i}"), &format!("A{i}"))).await.unwrap();
        let events = vec![FinishedEvent {
            id: Some(id.clone()),
            home_team: format!("H{i}"),
            away_team: format!("A{i}"),
            home_score: 2,
            away_score: 0,
        }];
        reconciler.reconcile_with(&events).await.unwrap();
    }

    let engine = WeightEngine::new(ledger);
    let weights = engine.get_weights().await;
    assert_eq!(weights.version, "static");
    assert_eq!(weights.optimized_at, None);
}
