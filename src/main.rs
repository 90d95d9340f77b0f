use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use prediction_tracker::api::health::HealthState;
use prediction_tracker::api::routes::{router, ApiState};
use prediction_tracker::config::Config;
use prediction_tracker::error::Result;
use prediction_tracker::ledger::PredictionLedger;
use prediction_tracker::resolver::Reconciler;
use prediction_tracker::weights::WeightEngine;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    let ledger = PredictionLedger::new(pool);
    let health = Arc::new(HealthState::new());
    let weights = Arc::new(WeightEngine::new(ledger.clone()));
    let reconciler = Arc::new(Reconciler::new(
        cfg.clone(),
        ledger.clone(),
        Arc::clone(&health),
    ));

    // Background settlement sweep (cron-equivalent cadence).
    info!(
        "Reconciling against {} every {}s (lookback {}h)",
        cfg.results_api_url, cfg.reconcile_interval_secs, cfg.results_lookback_hours,
    );
    let sweeper = reconciler.as_ref().clone();
    tokio::spawn(async move { sweeper.run().await });

    // --- HTTP API server ---
    let api_state = ApiState { ledger, reconciler, weights, health };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
