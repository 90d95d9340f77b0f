use crate::error::{AppError, Result};

pub const RESULTS_API_URL: &str = "http://127.0.0.1:8090";

/// Notional wager per prediction. Profit/loss and ROI are computed against
/// this flat stake; no real money moves through this service.
pub const FLAT_STAKE: f64 = 100.0;

/// Odds used at settlement when the winning side has no usable recorded
/// odds (missing or malformed at prediction time).
pub const FALLBACK_ODDS: f64 = 1.90;

/// Minimum resolved predictions before calibrated weights are derived.
/// Below this the engine serves the static baseline.
pub const MIN_SAMPLE_SIZE: i64 = 30;

/// Hard ceiling on a weight recomputation's stats query.
pub const STATS_TIMEOUT_SECS: u64 = 3;

/// How long a computed weight set is served from cache.
pub const WEIGHTS_TTL_SECS: u64 = 900;

/// Timeout for requests to the results provider.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Default page size for the recent-predictions endpoint.
pub const RECENT_DEFAULT_LIMIT: i64 = 20;

/// Win-rate thresholds (percent) for the three-regime weight adjustment.
pub mod win_rate_thresholds {
    /// At or above: lean on market odds.
    pub const HOT: f64 = 58.0;
    /// At or below: lean on recent form.
    pub const COLD: f64 = 45.0;
}

/// Confidence bucket edges, lower edge inclusive.
pub mod confidence_tiers {
    pub const HIGH_MIN: f64 = 75.0;
    pub const MID_MIN: f64 = 65.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub results_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// How often the reconciler sweeps pending predictions (RECONCILE_INTERVAL_SECS).
    pub reconcile_interval_secs: u64,
    /// How far back finished events are fetched from the provider (RESULTS_LOOKBACK_HOURS).
    pub results_lookback_hours: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            results_api_url: std::env::var("RESULTS_API_URL")
                .unwrap_or_else(|_| RESULTS_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "tracker.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse::<u64>()
                .unwrap_or(1800),
            results_lookback_hours: std::env::var("RESULTS_LOOKBACK_HOURS")
                .unwrap_or_else(|_| "48".to_string())
                .parse::<u64>()
                .unwrap_or(48),
        })
    }
}
