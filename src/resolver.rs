use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::fetch_finished_events;
use crate::ledger::{PredictionLedger, PredictionRow, Settlement};
use crate::types::FinishedEvent;

/// Outcome of one reconcile sweep. `resolved_count` counts only the
/// transitions performed by this sweep; replays of already-settled rows are
/// not counted.
#[derive(Debug, Serialize)]
pub struct ReconcileOutcome {
    pub resolved_count: usize,
    pub total_pending: usize,
    pub resolved: Vec<Settlement>,
}

/// Bridges pending ledger rows to real-world results on a periodic cadence.
///
/// Redundant sweeps are harmless: settlement is idempotent at the ledger,
/// and pending rows with no finished counterpart yet simply wait for the
/// next sweep.
#[derive(Clone)]
pub struct Reconciler {
    cfg: Config,
    ledger: PredictionLedger,
    health: Arc<HealthState>,
}

impl Reconciler {
    pub fn new(cfg: Config, ledger: PredictionLedger, health: Arc<HealthState>) -> Self {
        Self { cfg, ledger, health }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.reconcile_interval_secs));
        ticker.tick().await; // consume immediate first tick

        loop {
            ticker.tick().await;
            match self.reconcile_pending().await {
                Ok(outcome) => {
                    info!(
                        resolved = outcome.resolved_count,
                        pending = outcome.total_pending,
                        "reconcile sweep complete"
                    );
                }
                Err(e) => error!("reconcile sweep failed: {e}"),
            }
        }
    }

    /// Fetch finished events from the provider and settle every pending
    /// prediction with a confident match.
    pub async fn reconcile_pending(&self) -> Result<ReconcileOutcome> {
        let events = fetch_finished_events(&self.cfg).await?;
        self.reconcile_with(&events).await
    }

    /// Settle pending rows against an already-fetched batch of finished
    /// events. Each row is handled in isolation: a failed settlement is
    /// logged and skipped, never aborting the rest of the batch.
    pub async fn reconcile_with(&self, events: &[FinishedEvent]) -> Result<ReconcileOutcome> {
        let pending = self.ledger.pending().await?;
        let total_pending = pending.len();
        let mut resolved = Vec::new();

        for row in &pending {
            let Some(event) = match_finished_event(row, events) else {
                // Not yet resolvable; the next sweep retries.
                continue;
            };
            let winner = event.winner();
            match self
                .ledger
                .resolve(&row.match_id, winner, event.home_score, event.away_score)
                .await
            {
                Ok(s) if s.already_resolved => {
                    debug!(match_id = %row.match_id, "settlement replayed, not counted");
                }
                Ok(s) => {
                    info!(
                        match_id = %s.match_id,
                        status = %s.status,
                        profit = s.profit,
                        "prediction settled: {} {}-{}",
                        s.actual_winner, s.home_score, s.away_score,
                    );
                    resolved.push(s);
                }
                Err(e) => {
                    warn!(match_id = %row.match_id, "failed to settle prediction: {e}");
                }
            }
        }

        self.health.record_reconcile(
            Utc::now().timestamp(),
            resolved.len() as u64,
            total_pending as u64,
        );

        Ok(ReconcileOutcome { resolved_count: resolved.len(), total_pending, resolved })
    }
}

/// Find the finished event for a pending prediction.
///
/// Exact external-id match wins outright. Without one, an exact
/// case-sensitive (home, away) name pair is accepted only when it is
/// unambiguous; two candidate events with the same pairing (doubleheaders)
/// are logged and skipped rather than guessed at.
pub fn match_finished_event<'a>(
    row: &PredictionRow,
    events: &'a [FinishedEvent],
) -> Option<&'a FinishedEvent> {
    if let Some(ev) = events
        .iter()
        .find(|e| e.id.as_deref() == Some(row.match_id.as_str()))
    {
        return Some(ev);
    }

    let mut by_name = events
        .iter()
        .filter(|e| e.home_team == row.home_team && e.away_team == row.away_team);
    let first = by_name.next()?;
    if by_name.next().is_some() {
        warn!(
            match_id = %row.match_id,
            home = %row.home_team,
            away = %row.away_team,
            "ambiguous name match, leaving prediction pending"
        );
        return None;
    }
    Some(first)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
