// [apps/controller/src/services/daily_reset.rs]
//! Daily reset (C7, §4.3 `ZeroPending`). Runs once a day at the configured
//! local hour and bulk-moves any still-`pending` task to the `zero`
//! tombstone, discarding stale carry-over while preserving history. Distinct
//! from the admin-only `reset_failed` path (§9 open question on reset
//! semantics).

use std::time::Duration;

use chrono::{Local, NaiveTime, Timelike};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::state::AppState;

pub fn spawn_daily_reset(state: AppState) {
    tokio::spawn(async move {
        info!(hour = state.config.daily_reset_hour, "daily reset: loop starting");

        loop {
            sleep(duration_until_next_run(state.config.daily_reset_hour)).await;

            if let Err(error) = run_daily_reset(&state).await {
                warn!(%error, "daily reset: tick failed");
            }
        }
    });
}

#[instrument(skip(state))]
async fn run_daily_reset(state: &AppState) -> anyhow::Result<()> {
    let zeroed = state.tasks.zero_pending().await?;
    info!(zeroed, "daily reset: pending tasks moved to zero");
    Ok(())
}

/// Seconds from now until the next occurrence of `hour:00:00` local time,
/// rolling over to tomorrow when that boundary has already passed today.
fn duration_until_next_run(hour: u32) -> Duration {
    let hour = hour.min(23);
    let now = Local::now();
    let target_time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());

    let mut target = now.date_naive().and_time(target_time);
    if now.time() >= target_time {
        target += chrono::Duration::days(1);
    }

    let target_local = target
        .and_local_timezone(now.timezone())
        .single()
        .unwrap_or_else(|| now + chrono::Duration::days(1));

    let wait = target_local.signed_duration_since(now);
    wait.to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_less_than_a_day() {
        let wait = duration_until_next_run(Local::now().hour());
        assert!(wait.as_secs() <= 24 * 3600);
    }
}
