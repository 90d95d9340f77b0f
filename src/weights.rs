use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::{win_rate_thresholds, MIN_SAMPLE_SIZE, STATS_TIMEOUT_SECS, WEIGHTS_TTL_SECS};
use crate::error::{AppError, Result};
use crate::ledger::PredictionLedger;
use crate::stats::compute_stats;
use crate::types::{StatsPeriod, WeightConfig, WindowedStats};

/// Time source for the cache, injectable so tests can force TTL expiry
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CachedWeights {
    config: WeightConfig,
    valid_until: DateTime<Utc>,
}

/// Serves calibration weights derived from all-time stats, cached with a
/// TTL.
///
/// The adjustment itself is a three-regime step function over the win rate
/// (see [`derive_weights`]), chosen over a fitted optimizer so every served
/// weight set can be traced to one auditable rule. Consumers always get a
/// usable `WeightConfig`: thin samples, stats timeouts and storage failures
/// all degrade to last-known or static baseline values, never to an error.
pub struct WeightEngine {
    ledger: PredictionLedger,
    cache: RwLock<Option<CachedWeights>>,
    refreshing: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl WeightEngine {
    pub fn new(ledger: PredictionLedger) -> Self {
        Self::with_clock(ledger, Arc::new(SystemClock))
    }

    pub fn with_clock(ledger: PredictionLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            cache: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            clock,
        }
    }

    /// Return the current weights, recomputing only when the cached slot is
    /// empty or past its TTL.
    ///
    /// The warm path is a single read-lock clone. While one caller is
    /// recomputing, concurrent callers with an expired-but-present value are
    /// served that stale value instead of queueing behind the refresh; only
    /// the very first (cold) computation can make readers wait, and that
    /// wait is bounded by the stats timeout.
    pub async fn get_weights(&self) -> WeightConfig {
        let now = self.clock.now();

        let stale = {
            let guard = self.cache.read().await;
            match guard.as_ref() {
                Some(c) if now < c.valid_until => return c.config.clone(),
                Some(c) => Some(c.config.clone()),
                None => None,
            }
        };

        if self.refreshing.swap(true, Ordering::AcqRel) {
            if let Some(config) = stale {
                return config;
            }
            // Cold start with a refresh already in flight: compute anyway
            // so this call stays bounded by the stats timeout.
        }

        let computed = self.recompute(now).await;
        self.refreshing.store(false, Ordering::Release);

        match computed {
            Ok(config) => {
                let mut guard = self.cache.write().await;
                *guard = Some(CachedWeights {
                    config: config.clone(),
                    valid_until: now + chrono::Duration::seconds(WEIGHTS_TTL_SECS as i64),
                });
                config
            }
            Err(e) => {
                // Not cached: the next call retries instead of pinning a
                // failure for a full TTL.
                warn!("weight recomputation failed, serving fallback: {e}");
                stale.unwrap_or_else(WeightConfig::baseline)
            }
        }
    }

    async fn recompute(&self, now: DateTime<Utc>) -> Result<WeightConfig> {
        let stats = match tokio::time::timeout(
            Duration::from_secs(STATS_TIMEOUT_SECS),
            compute_stats(&self.ledger, StatsPeriod::All, now),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => return Err(AppError::StatsTimeout(STATS_TIMEOUT_SECS)),
        };

        if stats.total < MIN_SAMPLE_SIZE {
            debug!(
                total = stats.total,
                threshold = MIN_SAMPLE_SIZE,
                "sample below calibration threshold, serving baseline weights"
            );
            return Ok(WeightConfig::baseline());
        }

        Ok(derive_weights(&stats, now))
    }
}

/// Three-regime step adjustment over the historical win rate.
///
/// Hot (win rate at or above `HOT`): the market has been agreeing with our
/// odds-derived signal, so shift mass toward it. Cold (at or below `COLD`):
/// the odds signal has been misleading, lean on recent form and nudge the
/// motivational factor. In between, keep the baseline split. Every output
/// carries the sample size and timestamp it was derived from.
pub fn derive_weights(stats: &WindowedStats, now: DateTime<Utc>) -> WeightConfig {
    let mut config = if stats.win_rate >= win_rate_thresholds::HOT {
        WeightConfig {
            market_odds: 0.45,
            recent_form: 0.22,
            head_to_head: 0.18,
            motivation: 0.15,
            version: "odds-lean".to_string(),
            data_points: 0,
            optimized_at: None,
        }
    } else if stats.win_rate <= win_rate_thresholds::COLD {
        WeightConfig {
            market_odds: 0.30,
            recent_form: 0.33,
            head_to_head: 0.18,
            motivation: 0.19,
            version: "form-lean".to_string(),
            data_points: 0,
            optimized_at: None,
        }
    } else {
        WeightConfig {
            version: "hold".to_string(),
            ..WeightConfig::baseline()
        }
    };
    config.data_points = stats.total;
    config.optimized_at = Some(now);
    config
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Pick, Prediction};
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::AtomicI64;

    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn at(secs: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(secs)))
        }

        fn advance(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(self.0.load(Ordering::SeqCst), 0).unwrap()
        }
    }

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

    fn prediction(match_id: &str, predicted: Pick) -> Prediction {
        Prediction {
            match_id: match_id.to_string(),
            home_team: format!("{match_id}-home"),
            away_team: format!("{match_id}-away"),
            league: "L".to_string(),
            sport: "football".to_string(),
            kickoff_at: Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap(),
            predicted,
            confidence: 70.0,
            rationale: String::new(),
            home_odds: Some(2.0),
            away_odds: Some(2.0),
            draw_odds: Some(3.0),
        }
    }

    /// Seed `wins` winning and `losses` losing resolved predictions under
    /// distinct match ids.
    async fn seed(ledger: &PredictionLedger, prefix: &str, wins: usize, losses: usize) {
        for i in 0..wins {
            let id = format!("{prefix}-w{i}");
            ledger.record(&prediction(&id, Pick::Home)).await.unwrap();
            ledger.resolve(&id, Pick::Home, 2, 0).await.unwrap();
        }
        for i in 0..losses {
            let id = format!("{prefix}-l{i}");
            ledger.record(&prediction(&id, Pick::Home)).await.unwrap();
            ledger.resolve(&id, Pick::Away, 0, 2).await.unwrap();
        }
    }

    fn stats_with_win_rate(total: i64, win_rate: f64) -> WindowedStats {
        let mut s = WindowedStats::empty(StatsPeriod::All);
        s.total = total;
        s.win_rate = win_rate;
        s
    }

    #[test]
    fn derive_weights_three_regimes() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let hot = derive_weights(&stats_with_win_rate(50, 58.0), now);
        assert_eq!(hot.version, "odds-lean");
        assert!(hot.market_odds > WeightConfig::baseline().market_odds);

        let cold = derive_weights(&stats_with_win_rate(50, 45.0), now);
        assert_eq!(cold.version, "form-lean");
        assert!(cold.recent_form > WeightConfig::baseline().recent_form);
        assert!(cold.motivation > WeightConfig::baseline().motivation);

        let hold = derive_weights(&stats_with_win_rate(50, 50.0), now);
        assert_eq!(hold.version, "hold");
        assert_eq!(hold.market_odds, WeightConfig::baseline().market_odds);

        assert_eq!(hot.data_points, 50);
        assert_eq!(hot.optimized_at, Some(now));
    }

    #[tokio::test]
    async fn thin_sample_serves_baseline_regardless_of_win_rate() {
        let ledger = test_ledger().await;
        // 10 straight wins: a perfect win rate, but far below MIN_SAMPLE_SIZE.
        seed(&ledger, "thin", 10, 0).await;

        let engine = WeightEngine::new(ledger);
        let w = engine.get_weights().await;
        assert_eq!(w.version, "static");
        assert_eq!(w.data_points, 0);
        assert_eq!(w.optimized_at, None);
    }

    #[tokio::test]
    async fn sufficient_sample_produces_calibrated_weights() {
        let ledger = test_ledger().await;
        // 24/40 = 60% win rate, above the hot threshold.
        seed(&ledger, "hot", 24, 16).await;

        let engine = WeightEngine::new(ledger);
        let w = engine.get_weights().await;
        assert_eq!(w.version, "odds-lean");
        assert_eq!(w.data_points, 40);
        assert!(w.optimized_at.is_some());
    }

    #[tokio::test]
    async fn cache_hit_skips_recomputation_until_ttl_expires() {
        let ledger = test_ledger().await;
        seed(&ledger, "warm", 24, 16).await;

        let clock = ManualClock::at(1_700_000_000);
        let engine = WeightEngine::with_clock(ledger.clone(), clock.clone());

        let first = engine.get_weights().await;
        assert_eq!(first.version, "odds-lean");

        // New settlements flip the regime, but the cache is still warm.
        seed(&ledger, "slump", 0, 30).await;
        clock.advance(WEIGHTS_TTL_SECS as i64 - 1);
        let cached = engine.get_weights().await;
        assert_eq!(cached.optimized_at, first.optimized_at);
        assert_eq!(cached.version, "odds-lean");

        // Past the TTL the new losing run is picked up.
        clock.advance(2);
        let refreshed = engine.get_weights().await;
        assert_eq!(refreshed.version, "form-lean");
        assert_eq!(refreshed.data_points, 70);
        assert_ne!(refreshed.optimized_at, first.optimized_at);
    }
}
