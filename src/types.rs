use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::confidence_tiers;

// ---------------------------------------------------------------------------
// Picks and lifecycle status
// ---------------------------------------------------------------------------

/// The side a prediction commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Pick {
    Home,
    Away,
    Draw,
}

impl std::fmt::Display for Pick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Pick::Home => "home",
            Pick::Away => "away",
            Pick::Draw => "draw",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle of a ledger row: `pending` until settled, then terminal.
/// A resolved row is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PredictionStatus {
    Pending,
    Won,
    Lost,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PredictionStatus::Won | PredictionStatus::Lost)
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PredictionStatus::Pending => "pending",
            PredictionStatus::Won => "won",
            PredictionStatus::Lost => "lost",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Inbound prediction payload
// ---------------------------------------------------------------------------

/// A prediction as submitted by the owning application, before the event
/// starts. Odds are the moneyline values quoted at prediction time; they are
/// optional and get normalized at the ledger boundary (see
/// [`sanitize_odds`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub sport: String,
    pub kickoff_at: DateTime<Utc>,
    pub predicted: Pick,
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
    pub home_odds: Option<f64>,
    pub away_odds: Option<f64>,
    pub draw_odds: Option<f64>,
}

/// Drop odds values that would poison profit arithmetic: non-finite numbers
/// and quotes at or below 1.0 (no payout). Settlement falls back to
/// [`crate::config::FALLBACK_ODDS`] when the recorded value is absent.
pub fn sanitize_odds(odds: Option<f64>) -> Option<f64> {
    odds.filter(|v| v.is_finite() && *v > 1.0)
}

// ---------------------------------------------------------------------------
// Provider shape
// ---------------------------------------------------------------------------

/// A finished event as reported by the external results provider. The
/// identifier is optional; name-based matching must still work without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedEvent {
    pub id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i64,
    pub away_score: i64,
}

impl FinishedEvent {
    /// Higher score wins; equal scores settle as a draw.
    pub fn winner(&self) -> Pick {
        match self.home_score.cmp(&self.away_score) {
            std::cmp::Ordering::Greater => Pick::Home,
            std::cmp::Ordering::Less => Pick::Away,
            std::cmp::Ordering::Equal => Pick::Draw,
        }
    }
}

// ---------------------------------------------------------------------------
// Confidence tiers
// ---------------------------------------------------------------------------

/// Stratification bucket for accuracy reporting. Lower edge of each bucket
/// is inclusive: confidence 75.0 is `High`, 74.9 is `Mid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Mid,
    Low,
}

impl ConfidenceTier {
    pub fn of(confidence: f64) -> Self {
        if confidence >= confidence_tiers::HIGH_MIN {
            ConfidenceTier::High
        } else if confidence >= confidence_tiers::MID_MIN {
            ConfidenceTier::Mid
        } else {
            ConfidenceTier::Low
        }
    }
}

// ---------------------------------------------------------------------------
// Windowed statistics
// ---------------------------------------------------------------------------

/// Reporting window for aggregated stats. `cutoff` maps each period to the
/// lower-bound timestamp a record's `resolved_at` must reach to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Today,
    Week,
    Month,
    All,
}

impl StatsPeriod {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            StatsPeriod::Today => {
                let midnight = now.timestamp() - now.timestamp().rem_euclid(86_400);
                Utc.timestamp_opt(midnight, 0)
                    .single()
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            }
            StatsPeriod::Week => now - chrono::Duration::days(7),
            StatsPeriod::Month => now - chrono::Duration::days(30),
            StatsPeriod::All => DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl std::fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatsPeriod::Today => "today",
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
            StatsPeriod::All => "all",
        };
        write!(f, "{s}")
    }
}

/// Per-bucket accuracy over one confidence tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub total: i64,
    pub wins: i64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub high: TierStats,
    pub mid: TierStats,
    pub low: TierStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakKind {
    Win,
    Loss,
    None,
}

/// Current unbroken run of same-outcome settlements, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Streak {
    pub kind: StreakKind,
    pub count: u32,
}

impl Streak {
    pub fn none() -> Self {
        Self { kind: StreakKind::None, count: 0 }
    }
}

/// Derived view over the resolved records inside one reporting window.
/// Never persisted; recomputed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowedStats {
    pub period: StatsPeriod,
    pub total: i64,
    pub wins: i64,
    pub losses: i64,
    /// Percent, one decimal. Zero when the window is empty.
    pub win_rate: f64,
    pub total_profit: f64,
    /// Percent return over total staked, one decimal.
    pub roi_pct: f64,
    pub tiers: TierBreakdown,
    pub streak: Streak,
}

impl WindowedStats {
    pub fn empty(period: StatsPeriod) -> Self {
        Self {
            period,
            total: 0,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            total_profit: 0.0,
            roi_pct: 0.0,
            tiers: TierBreakdown::default(),
            streak: Streak::none(),
        }
    }
}

// ---------------------------------------------------------------------------
// Calibration weights
// ---------------------------------------------------------------------------

/// Named multipliers biasing the downstream scoring formula. Relative
/// magnitudes matter; the fields are not required to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub market_odds: f64,
    pub recent_form: f64,
    pub head_to_head: f64,
    pub motivation: f64,
    /// Which regime produced this set ("static" = no optimization ran).
    pub version: String,
    /// Resolved predictions the weights were derived from.
    pub data_points: i64,
    pub optimized_at: Option<DateTime<Utc>>,
}

impl WeightConfig {
    /// Static defaults served whenever calibration has not run or cannot be
    /// trusted (cold cache, thin sample, stats failure).
    pub fn baseline() -> Self {
        Self {
            market_odds: 0.38,
            recent_form: 0.27,
            head_to_head: 0.20,
            motivation: 0.15,
            version: "static".to_string(),
            data_points: 0,
            optimized_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
