use chrono::{DateTime, Utc};

use crate::model::chart::{ChartPoint, ChartPointCollection, SprintKey};
use crate::model::sprint::SprintSummary;
use crate::storage::{Storage, StorageError};

/// One point per board column at `now`, in column order.
pub fn current_points(summary: &SprintSummary, now: DateTime<Utc>) -> Vec<ChartPoint> {
    summary
        .column_totals()
        .map(|(name, points)| ChartPoint::new(now, points, name))
        .collect()
}

/// End-of-sprint projection: everything has landed in the last column.
///
/// Empty once the sprint has ended; `end_date == now` counts as ended.
pub fn projection_points(summary: &SprintSummary, now: DateTime<Utc>) -> Vec<ChartPoint> {
    if now >= summary.end_date {
        return Vec::new();
    }

    let last = summary.columns.len().saturating_sub(1);
    summary
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let y = if i == last { summary.story_points } else { 0 };
            ChartPoint::new(summary.end_date, y, col.name.as_str())
        })
        .collect()
}

/// Stored points in retrieval order, stable-sorted by timestamp.
pub fn sorted_history(history: ChartPointCollection) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = history.into_values().collect();
    points.sort_by_key(|p| p.x);
    points
}

/// History, then the current snapshot, then the projection. Only the history
/// part is sorted; the rest keeps column order.
pub fn merge_timeline(
    history: ChartPointCollection,
    summary: &SprintSummary,
    now: DateTime<Utc>,
) -> Vec<ChartPoint> {
    let mut timeline = sorted_history(history);
    timeline.extend(current_points(summary, now));
    timeline.extend(projection_points(summary, now));
    timeline
}

pub async fn build_timeline(
    storage: &dyn Storage,
    sprint: &SprintKey,
    summary: &SprintSummary,
    now: DateTime<Utc>,
) -> Result<Vec<ChartPoint>, StorageError> {
    let history = match storage.get(sprint).await? {
        Some(history) => history,
        None => {
            log::warn!("No history available for sprint {sprint}, charting current data only");
            ChartPointCollection::new()
        }
    };

    Ok(merge_timeline(history, summary, now))
}
