use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{Pick, PredictionStatus};

/// Row model for the `predictions` table. One row per predicted event,
/// keyed by the external match id; settlement columns are NULL until the
/// resolver moves the row out of `pending`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PredictionRow {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub sport: String,
    pub kickoff_at: DateTime<Utc>,
    pub predicted: Pick,
    pub confidence: f64,
    pub rationale: String,
    pub home_odds: Option<f64>,
    pub away_odds: Option<f64>,
    pub draw_odds: Option<f64>,
    pub status: PredictionStatus,
    pub actual_winner: Option<Pick>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub profit: Option<f64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRow {
    /// A row counts as resolved only when the status is terminal AND the
    /// full settlement payload is present.
    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
            && self.actual_winner.is_some()
            && self.profit.is_some()
            && self.resolved_at.is_some()
    }

    /// Moneyline odds recorded at prediction time for the given side.
    pub fn odds_for(&self, pick: Pick) -> Option<f64> {
        match pick {
            Pick::Home => self.home_odds,
            Pick::Away => self.away_odds,
            Pick::Draw => self.draw_odds,
        }
    }
}

/// Result of an upsert into the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub match_id: String,
    /// False when an existing row was updated (or left alone because it was
    /// already settled).
    pub is_new: bool,
}

/// Outcome attached to a prediction at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub match_id: String,
    pub status: PredictionStatus,
    pub actual_winner: Pick,
    pub home_score: i64,
    pub away_score: i64,
    /// Signed, against the flat stake.
    pub profit: f64,
    pub resolved_at: DateTime<Utc>,
    /// True when this call replayed a previously stored settlement.
    pub already_resolved: bool,
}
