pub mod github;

use async_trait::async_trait;

use crate::error::PublicError;
use crate::model::sprint::SprintSummary;

/// The issue tracker that knows which sprint is running and how many story
/// points sit in each board column.
#[async_trait]
pub trait SprintSource: Send + Sync {
    fn name(&self) -> &str;

    /// Organisation/board identifier used in sprint keys.
    fn organization(&self) -> &str;

    /// Summary of the sprint numbered `sprint_id`, or of the earliest-ending
    /// active sprint when `None`.
    async fn sprint_summary(&self, sprint_id: Option<u64>) -> Result<SprintSummary, PublicError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::model::sprint::{SprintCard, SprintColumn};

    /// Returns a fixed summary and counts calls.
    pub struct StaticSource {
        pub summary: Option<SprintSummary>,
        pub calls: AtomicUsize,
    }

    impl StaticSource {
        pub fn new(end_date: DateTime<Utc>, columns: &[(&str, u32)]) -> Self {
            let columns = columns
                .iter()
                .map(|(name, points)| {
                    SprintColumn::new(
                        *name,
                        vec![SprintCard {
                            issue_number: None,
                            story_points: *points,
                        }],
                    )
                })
                .collect();
            Self {
                summary: Some(SprintSummary::new(9, end_date, columns)),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn empty() -> Self {
            Self {
                summary: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SprintSource for StaticSource {
        fn name(&self) -> &str {
            "Static"
        }

        fn organization(&self) -> &str {
            "acme"
        }

        async fn sprint_summary(&self, _sprint_id: Option<u64>) -> Result<SprintSummary, PublicError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.summary
                .clone()
                .ok_or_else(|| PublicError::not_found("No active sprints were found"))
        }
    }
}
