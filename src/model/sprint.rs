use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Story-point summary of one sprint board, as reported by the issue tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintSummary {
    pub id: u64,
    pub end_date: DateTime<Utc>,
    pub story_points: u32,
    /// Board columns in board order. The last one is the "done" column.
    #[serde(serialize_with = "serialize_column_totals")]
    pub columns: Vec<SprintColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SprintColumn {
    pub name: String,
    pub story_points: u32,
    pub cards: Vec<SprintCard>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SprintCard {
    pub issue_number: Option<u64>,
    pub story_points: u32,
}

impl SprintColumn {
    pub fn new(name: impl Into<String>, cards: Vec<SprintCard>) -> Self {
        let story_points = cards.iter().map(|c| c.story_points).sum();
        Self {
            name: name.into(),
            story_points,
            cards,
        }
    }
}

impl SprintSummary {
    pub fn new(id: u64, end_date: DateTime<Utc>, columns: Vec<SprintColumn>) -> Self {
        let story_points = columns.iter().map(|c| c.story_points).sum();
        Self {
            id,
            end_date,
            story_points,
            columns,
        }
    }

    pub fn column_totals(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.columns
            .iter()
            .map(|col| (col.name.as_str(), col.story_points))
    }
}

fn serialize_column_totals<S: Serializer>(
    columns: &[SprintColumn],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(columns.len()))?;
    for col in columns {
        map.serialize_entry(&col.name, &col.story_points)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn card(points: u32) -> SprintCard {
        SprintCard {
            issue_number: Some(1),
            story_points: points,
        }
    }

    #[test]
    fn totals_are_summed_from_cards() {
        let end = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let summary = SprintSummary::new(
            7,
            end,
            vec![
                SprintColumn::new("To Do", vec![card(3), card(2)]),
                SprintColumn::new("Done", vec![card(8)]),
            ],
        );
        assert_eq!(summary.story_points, 13);
        let totals: Vec<_> = summary.column_totals().collect();
        assert_eq!(totals, vec![("To Do", 5), ("Done", 8)]);
    }

    #[test]
    fn serializes_columns_as_ordered_totals() {
        let end = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let summary = SprintSummary::new(
            7,
            end,
            vec![
                SprintColumn::new("Zebra", vec![card(1)]),
                SprintColumn::new("Alpha", vec![card(2)]),
            ],
        );
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains(r#""columns":{"Zebra":1,"Alpha":2}"#), "{json}");
        assert!(json.contains(r#""storyPoints":3"#));
        assert!(json.contains(r#""endDate":"2024-03-15T00:00:00Z""#));
    }
}
