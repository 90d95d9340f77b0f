use chrono::{DateTime, Utc};

use crate::config::FLAT_STAKE;
use crate::error::Result;
use crate::ledger::{PredictionLedger, PredictionRow};
use crate::types::{
    ConfidenceTier, PredictionStatus, StatsPeriod, Streak, StreakKind, WindowedStats,
};

/// Aggregate accuracy, profitability, tier breakdown and streak over the
/// records resolved inside `period`.
pub async fn compute_stats(
    ledger: &PredictionLedger,
    period: StatsPeriod,
    now: DateTime<Utc>,
) -> Result<WindowedStats> {
    let rows = ledger.resolved_since(period.cutoff(now)).await?;
    Ok(summarize(period, &rows))
}

/// Fold a window of resolved rows, newest settlement first, into stats.
///
/// Zero-result windows report all zeros — no division happens on empty
/// input. Rounding is to one decimal on the percentage fields.
pub fn summarize(period: StatsPeriod, rows: &[PredictionRow]) -> WindowedStats {
    if rows.is_empty() {
        return WindowedStats::empty(period);
    }

    let total = rows.len() as i64;
    let wins = rows.iter().filter(|r| r.status == PredictionStatus::Won).count() as i64;
    let losses = total - wins;
    let total_profit: f64 = rows.iter().filter_map(|r| r.profit).sum();
    let roi_pct = round1(total_profit / (total as f64 * FLAT_STAKE) * 100.0);

    let mut stats = WindowedStats {
        period,
        total,
        wins,
        losses,
        win_rate: percent(wins, total),
        total_profit,
        roi_pct,
        tiers: Default::default(),
        streak: streak(rows),
    };

    for row in rows {
        let bucket = match ConfidenceTier::of(row.confidence) {
            ConfidenceTier::High => &mut stats.tiers.high,
            ConfidenceTier::Mid => &mut stats.tiers.mid,
            ConfidenceTier::Low => &mut stats.tiers.low,
        };
        bucket.total += 1;
        if row.status == PredictionStatus::Won {
            bucket.wins += 1;
        }
    }
    for bucket in [&mut stats.tiers.high, &mut stats.tiers.mid, &mut stats.tiers.low] {
        bucket.win_rate = percent(bucket.wins, bucket.total);
    }

    stats
}

/// Current run of same-outcome settlements. `rows` must be ordered by
/// `resolved_at` descending; the run's type is the newest row's status.
fn streak(rows: &[PredictionRow]) -> Streak {
    let Some(first) = rows.first() else {
        return Streak::none();
    };
    let kind = match first.status {
        PredictionStatus::Won => StreakKind::Win,
        PredictionStatus::Lost => StreakKind::Loss,
        PredictionStatus::Pending => return Streak::none(),
    };
    let count = rows
        .iter()
        .take_while(|r| r.status == first.status)
        .count() as u32;
    Streak { kind, count }
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(100.0 * part as f64 / whole as f64)
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
