use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::ScheduleConfig;
use crate::model::chart::SprintKey;
use crate::storage::Storage;
use crate::timeline::current_points;
use crate::tracker::SprintSource;

/// When scheduled snapshots are allowed to run.
#[derive(Debug, Clone)]
pub struct SnapshotWindow {
    pub weekdays_only: bool,
    pub start_hour: u32,
    pub end_hour: u32,
    pub offset: FixedOffset,
}

impl SnapshotWindow {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600)
            .with_context(|| format!("Invalid schedule.utc_offset_hours {}", config.utc_offset_hours))?;
        if config.start_hour > 23 || config.end_hour > 23 {
            anyhow::bail!(
                "schedule.start_hour and schedule.end_hour must be between 0 and 23, got {} and {}",
                config.start_hour,
                config.end_hour
            );
        }
        Ok(Self {
            weekdays_only: config.weekdays_only,
            start_hour: config.start_hour,
            end_hour: config.end_hour,
            offset,
        })
    }

    /// Hours are inclusive and read in the window's own offset.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.offset);
        if self.weekdays_only && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        (self.start_hour..=self.end_hour).contains(&local.hour())
    }
}

/// Fetches the current sprint and appends one point per column to storage.
/// Returns the key the points were written under.
pub async fn persist_snapshot(
    source: &dyn SprintSource,
    storage: &dyn Storage,
    now: DateTime<Utc>,
) -> Result<SprintKey> {
    log::info!("[{}] Fetching sprint data for storage", now.to_rfc3339());

    let summary = source
        .sprint_summary(None)
        .await
        .with_context(|| format!("Fetching current sprint from {}", source.name()))?;
    let key = SprintKey::new(source.organization(), summary.id);
    let points = current_points(&summary, now);

    storage
        .set(&key, &points)
        .await
        .with_context(|| format!("Storing snapshot for sprint {key}"))?;

    log::info!("Stored {} points for sprint {key} in {}", points.len(), storage.name());
    Ok(key)
}

/// Runs `persist_snapshot` on every tick inside the window. Failed runs are
/// logged and the loop keeps going.
pub async fn run_schedule(
    source: &dyn SprintSource,
    storage: &dyn Storage,
    config: &ScheduleConfig,
) -> Result<()> {
    let window = SnapshotWindow::from_config(config)?;
    let minutes = config.interval_minutes.max(1);
    let mut ticker = interval(Duration::from_secs(minutes * 60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!(
        "Snapshot schedule started: every {minutes} min, hours {}-{} at UTC{}, weekdays only: {}",
        window.start_hour,
        window.end_hour,
        window.offset,
        window.weekdays_only
    );

    loop {
        ticker.tick().await;
        let now = Utc::now();
        if !window.contains(now) {
            log::debug!("Outside snapshot window, skipping run at {}", now.to_rfc3339());
            continue;
        }
        if let Err(e) = persist_snapshot(source, storage, now).await {
            log::error!("Error fetching sprint data: {e:#}");
        }
    }
}
