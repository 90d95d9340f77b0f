use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::{FALLBACK_ODDS, FLAT_STAKE};
use crate::error::{AppError, Result};
use crate::ledger::models::{PredictionRow, RecordOutcome, Settlement};
use crate::types::{sanitize_odds, Pick, Prediction, PredictionStatus};

/// Durable, keyed store of prediction records backed by SQLite.
///
/// All writes go through two statements: an upsert keyed on `match_id`
/// (`record`) and a guarded pending→terminal transition (`resolve`).
/// Concurrent writers for the same match converge at the storage layer.
#[derive(Clone)]
pub struct PredictionLedger {
    pool: SqlitePool,
}

impl PredictionLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-update by `match_id`. A new row starts as `pending`; an
    /// existing pending row has its prediction payload replaced in place.
    /// Settled rows are immutable and left untouched.
    pub async fn record(&self, p: &Prediction) -> Result<RecordOutcome> {
        let existing: Option<PredictionStatus> =
            sqlx::query_scalar("SELECT status FROM predictions WHERE match_id = ?")
                .bind(&p.match_id)
                .fetch_optional(&self.pool)
                .await?;

        if matches!(existing, Some(s) if s.is_terminal()) {
            debug!(match_id = %p.match_id, "record skipped: prediction already settled");
            return Ok(RecordOutcome { match_id: p.match_id.clone(), is_new: false });
        }
        let is_new = existing.is_none();

        // Normalize the payload at the boundary: malformed odds become NULL
        // (settlement falls back to FALLBACK_ODDS), confidence is clamped
        // into 0..100.
        let confidence = if p.confidence.is_finite() {
            p.confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };

        sqlx::query(
            "INSERT INTO predictions \
             (match_id, home_team, away_team, league, sport, kickoff_at, predicted, \
              confidence, rationale, home_odds, away_odds, draw_odds, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(match_id) DO UPDATE SET \
                home_team = excluded.home_team, \
                away_team = excluded.away_team, \
                league = excluded.league, \
                sport = excluded.sport, \
                kickoff_at = excluded.kickoff_at, \
                predicted = excluded.predicted, \
                confidence = excluded.confidence, \
                rationale = excluded.rationale, \
                home_odds = excluded.home_odds, \
                away_odds = excluded.away_odds, \
                draw_odds = excluded.draw_odds \
             WHERE predictions.status = 'pending'",
        )
        .bind(&p.match_id)
        .bind(&p.home_team)
        .bind(&p.away_team)
        .bind(&p.league)
        .bind(&p.sport)
        .bind(p.kickoff_at)
        .bind(p.predicted)
        .bind(confidence)
        .bind(&p.rationale)
        .bind(sanitize_odds(p.home_odds))
        .bind(sanitize_odds(p.away_odds))
        .bind(sanitize_odds(p.draw_odds))
        .bind(PredictionStatus::Pending)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(RecordOutcome { match_id: p.match_id.clone(), is_new })
    }

    /// Attach the real-world outcome to a recorded prediction.
    ///
    /// Signals `PredictionNotFound` for unknown ids (no implicit creation).
    /// Resolving an already-settled row replays the stored settlement
    /// without touching the row, so redundant reconcile sweeps never
    /// double-count profit.
    pub async fn resolve(
        &self,
        match_id: &str,
        actual_winner: Pick,
        home_score: i64,
        away_score: i64,
    ) -> Result<Settlement> {
        let row = self
            .fetch(match_id)
            .await?
            .ok_or_else(|| AppError::PredictionNotFound(match_id.to_string()))?;

        if row.status.is_terminal() {
            return Ok(stored_settlement(&row));
        }

        let is_win = row.predicted == actual_winner;
        let odds = sanitize_odds(row.odds_for(actual_winner)).unwrap_or(FALLBACK_ODDS);
        let profit = if is_win { FLAT_STAKE * (odds - 1.0) } else { -FLAT_STAKE };
        let status = if is_win { PredictionStatus::Won } else { PredictionStatus::Lost };
        let resolved_at = Utc::now();

        // The status guard makes the transition single-shot under
        // concurrent resolvers: exactly one UPDATE wins.
        let updated = sqlx::query(
            "UPDATE predictions \
             SET status = ?, actual_winner = ?, home_score = ?, away_score = ?, \
                 profit = ?, resolved_at = ? \
             WHERE match_id = ? AND status = 'pending'",
        )
        .bind(status)
        .bind(actual_winner)
        .bind(home_score)
        .bind(away_score)
        .bind(profit)
        .bind(resolved_at)
        .bind(match_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            let row = self
                .fetch(match_id)
                .await?
                .ok_or_else(|| AppError::PredictionNotFound(match_id.to_string()))?;
            return Ok(stored_settlement(&row));
        }

        Ok(Settlement {
            match_id: match_id.to_string(),
            status,
            actual_winner,
            home_score,
            away_score,
            profit,
            resolved_at,
            already_resolved: false,
        })
    }

    pub async fn fetch(&self, match_id: &str) -> Result<Option<PredictionRow>> {
        let row = sqlx::query_as::<_, PredictionRow>(
            "SELECT * FROM predictions WHERE match_id = ?",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Most recent predictions by scheduled start time, newest first.
    pub async fn fetch_recent(&self, limit: i64) -> Result<Vec<PredictionRow>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            "SELECT * FROM predictions ORDER BY kickoff_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All rows still awaiting an outcome, oldest kickoff first.
    pub async fn pending(&self) -> Result<Vec<PredictionRow>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            "SELECT * FROM predictions WHERE status = 'pending' ORDER BY kickoff_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Terminal rows settled at or after `cutoff`, newest settlement first.
    /// The ordering is what the streak scan in the aggregator relies on.
    pub async fn resolved_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<PredictionRow>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            "SELECT * FROM predictions \
             WHERE status != 'pending' AND resolved_at >= ? \
             ORDER BY resolved_at DESC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn stored_settlement(row: &PredictionRow) -> Settlement {
    Settlement {
        match_id: row.match_id.clone(),
        status: row.status,
        actual_winner: row.actual_winner.unwrap_or(row.predicted),
        home_score: row.home_score.unwrap_or(0),
        away_score: row.away_score.unwrap_or(0),
        profit: row.profit.unwrap_or(0.0),
        resolved_at: row.resolved_at.unwrap_or(row.created_at),
        already_resolved: true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
