use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::config::{Config, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::FinishedEvent;

/// Fetch finished events from the results provider over the configured
/// lookback window.
///
/// The provider contract per event: an identifier (optional — its absence
/// must not block name-based matching), home/away team names, final scores
/// and a completion flag. Events that are not finished or are missing
/// scores are skipped, not errors.
pub async fn fetch_finished_events(cfg: &Config) -> Result<Vec<FinishedEvent>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;

    let to = Utc::now();
    let from = to - chrono::Duration::hours(cfg.results_lookback_hours as i64);
    let url = format!(
        "{}/matches?status=finished&from={}&to={}",
        cfg.results_api_url,
        from.timestamp(),
        to.timestamp(),
    );

    let resp: serde_json::Value = client.get(&url).send().await?.json().await?;

    // Some deployments wrap the list in a "matches" envelope.
    let items = match resp.as_array() {
        Some(a) => a.clone(),
        None => match resp.get("matches").and_then(|m| m.as_array()) {
            Some(a) => a.clone(),
            None => {
                return Err(AppError::Provider(
                    "results response was not an array".to_string(),
                ))
            }
        },
    };

    let mut events = Vec::new();
    let mut skipped = 0usize;
    for item in &items {
        match parse_finished_event(item) {
            Some(ev) => events.push(ev),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, total = items.len(), "skipped provider events without usable results");
    }

    Ok(events)
}

/// Parse a single provider event. Returns None for events that are not
/// usable for settlement (not finished, missing names or scores).
pub fn parse_finished_event(v: &serde_json::Value) -> Option<FinishedEvent> {
    let finished = v
        .get("finished")
        .and_then(|f| f.as_bool())
        .or_else(|| {
            v.get("status").and_then(|s| s.as_str()).map(|s| {
                s.eq_ignore_ascii_case("finished")
                    || s.eq_ignore_ascii_case("ft")
                    || s.eq_ignore_ascii_case("completed")
            })
        })
        .unwrap_or(false);
    if !finished {
        return None;
    }

    let home_team = v.get("homeTeam").and_then(|s| s.as_str())?.to_string();
    let away_team = v.get("awayTeam").and_then(|s| s.as_str())?.to_string();
    let home_score = score_field(v, "homeScore")?;
    let away_score = score_field(v, "awayScore")?;

    // Identifiers come back as strings or numbers depending on the feed;
    // absence is preserved, not rejected.
    let id = v.get("id").and_then(|x| {
        x.as_str()
            .map(str::to_string)
            .or_else(|| x.as_i64().map(|n| n.to_string()))
    });

    Some(FinishedEvent { id, home_team, away_team, home_score, away_score })
}

fn score_field(v: &serde_json::Value, key: &str) -> Option<i64> {
    v.get(key)
        .and_then(|x| x.as_i64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
