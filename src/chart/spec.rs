use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::colors::{column_colors, MAX_DISTINCT_COLUMNS};
use crate::model::chart::{ChartDimensions, ChartPoint};

pub const COLOR_SCALE: &str = "sprintcolumn";
pub const RULE_DASH: [u32; 2] = [10, 5];

/// Declarative description of a stacked-area burndown chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub width: u32,
    pub height: u32,
    /// Input rows with their stacked bounds, in input order.
    pub table: Vec<StackedPoint>,
    pub scales: Scales,
    pub axes: Vec<Axis>,
    pub legend: Legend,
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedPoint {
    pub x: DateTime<Utc>,
    pub y: u32,
    pub c: String,
    pub y0: u32,
    pub y1: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scales {
    pub x: TimeScale,
    pub y: LinearScale,
    pub color: OrdinalScale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeScale {
    /// `[min x, max x]`; `None` when there is no data.
    pub domain: Option<[DateTime<Utc>; 2]>,
    pub range: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearScale {
    /// `[0, max stacked y1]`.
    pub domain: [u32; 2],
    pub zero: bool,
    pub nice: bool,
    pub nice_max: u32,
    pub range: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrdinalScale {
    pub name: String,
    /// Distinct categories in first-seen order.
    pub domain: Vec<String>,
    pub range: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orient {
    Bottom,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickInterval {
    Week,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub scale: &'static str,
    pub orient: Orient,
    pub grid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_count: Option<TickInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub fill: String,
    /// Reversed domain so entries line up with the stacked areas beside them.
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaPoint {
    pub x: DateTime<Utc>,
    pub y0: u32,
    pub y1: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mark {
    Area {
        category: String,
        fill: String,
        points: Vec<AreaPoint>,
    },
    #[serde(rename_all = "camelCase")]
    Rule {
        x: DateTime<Utc>,
        y: u32,
        y2: u32,
        stroke_dash: [u32; 2],
    },
}

impl ChartSpec {
    pub fn color_of(&self, category: &str) -> Option<&str> {
        let color = &self.scales.color;
        color
            .domain
            .iter()
            .position(|c| c == category)
            .and_then(|i| color.range.get(i))
            .map(String::as_str)
    }

    pub fn areas(&self) -> impl Iterator<Item = (&str, &str, &[AreaPoint])> {
        self.marks.iter().filter_map(|mark| match mark {
            Mark::Area {
                category,
                fill,
                points,
            } => Some((category.as_str(), fill.as_str(), points.as_slice())),
            Mark::Rule { .. } => None,
        })
    }

    pub fn rule(&self) -> Option<(DateTime<Utc>, u32, u32)> {
        self.marks.iter().find_map(|mark| match mark {
            Mark::Rule { x, y, y2, .. } => Some((*x, *y, *y2)),
            Mark::Area { .. } => None,
        })
    }
}

/// Distinct categories in the order they first appear.
pub fn categories(points: &[ChartPoint]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for p in points {
        if !seen.iter().any(|c| c == &p.c) {
            seen.push(p.c.clone());
        }
    }
    seen
}

/// Groups rows by `x` and accumulates `y` within each group in category
/// order, producing `y0`/`y1` bounds. Output keeps input order.
pub fn stack(points: &[ChartPoint], categories: &[String]) -> Vec<StackedPoint> {
    let rank: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut groups: HashMap<DateTime<Utc>, Vec<usize>> = HashMap::new();
    for (i, p) in points.iter().enumerate() {
        groups.entry(p.x).or_default().push(i);
    }

    let mut bounds = vec![(0u32, 0u32); points.len()];
    for members in groups.values_mut() {
        members.sort_by_key(|&i| rank.get(points[i].c.as_str()).copied().unwrap_or(usize::MAX));
        let mut running = 0u32;
        for &i in members.iter() {
            let y0 = running;
            running = running.saturating_add(points[i].y);
            bounds[i] = (y0, running);
        }
    }

    points
        .iter()
        .zip(bounds)
        .map(|(p, (y0, y1))| StackedPoint {
            x: p.x,
            y: p.y,
            c: p.c.clone(),
            y0,
            y1,
        })
        .collect()
}

/// Tick step for about ten ticks over `[0, max]`: 1, 2 or 5 × 10^k.
/// Steps below 1 are reported as 1 since the axis is integral.
fn tick_step(max: u64) -> u64 {
    let raw = max as f64 / 10.0;
    let power = raw.log10().floor();
    if power < 0.0 {
        return 1;
    }
    let error = raw / 10f64.powf(power);
    let factor = if error >= 50f64.sqrt() {
        10
    } else if error >= 10f64.sqrt() {
        5
    } else if error >= 2f64.sqrt() {
        2
    } else {
        1
    };
    factor * 10u64.pow(power as u32)
}

/// Extends `max` to the next multiple of its tick step, repeating until the
/// step settles.
pub fn nice_ceiling(max: u32) -> u32 {
    let mut stop = max as u64;
    if stop == 0 {
        return 0;
    }
    let mut previous = 0;
    for _ in 0..10 {
        let step = tick_step(stop);
        if step == previous {
            break;
        }
        stop = stop.div_ceil(step) * step;
        previous = step;
    }
    stop.min(u32::MAX as u64) as u32
}

pub fn synthesize(points: &[ChartPoint], dimensions: ChartDimensions, now: DateTime<Utc>) -> ChartSpec {
    let categories = categories(points);
    if categories.len() > MAX_DISTINCT_COLUMNS {
        log::warn!(
            "{} columns exceed the {MAX_DISTINCT_COLUMNS} distinct column colors, some will repeat",
            categories.len()
        );
    }
    let colors = column_colors(categories.len());
    let table = stack(points, &categories);

    let x_domain = match (
        points.iter().map(|p| p.x).min(),
        points.iter().map(|p| p.x).max(),
    ) {
        (Some(min), Some(max)) => Some([min, max]),
        _ => None,
    };
    let y_max = table.iter().map(|row| row.y1).max().unwrap_or(0);

    let areas = categories.iter().zip(&colors).map(|(category, fill)| {
        let mut area_points: Vec<AreaPoint> = table
            .iter()
            .filter(|row| &row.c == category)
            .map(|row| AreaPoint {
                x: row.x,
                y0: row.y0,
                y1: row.y1,
            })
            .collect();
        area_points.sort_by_key(|p| p.x);
        Mark::Area {
            category: category.clone(),
            fill: fill.clone(),
            points: area_points,
        }
    });

    let mut marks: Vec<Mark> = areas.collect();
    marks.push(Mark::Rule {
        x: now,
        y: 0,
        y2: dimensions.height,
        stroke_dash: RULE_DASH,
    });

    ChartSpec {
        width: dimensions.width,
        height: dimensions.height,
        scales: Scales {
            x: TimeScale {
                domain: x_domain,
                range: dimensions.width,
            },
            y: LinearScale {
                domain: [0, y_max],
                zero: true,
                nice: true,
                nice_max: nice_ceiling(y_max),
                range: dimensions.height,
            },
            color: OrdinalScale {
                name: COLOR_SCALE.to_string(),
                domain: categories.clone(),
                range: colors,
            },
        },
        axes: vec![
            Axis {
                scale: "x",
                orient: Orient::Bottom,
                grid: true,
                tick_count: Some(TickInterval::Week),
                grid_opacity: None,
            },
            Axis {
                scale: "y",
                orient: Orient::Left,
                grid: true,
                tick_count: None,
                grid_opacity: Some(0.25),
            },
        ],
        legend: Legend {
            fill: COLOR_SCALE.to_string(),
            values: categories.into_iter().rev().collect(),
        },
        table,
        marks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn dims(width: u32, height: u32) -> ChartDimensions {
        ChartDimensions { width, height }
    }

    #[test]
    fn table_keeps_input_points() {
        let points = vec![ChartPoint::new(t(1), 0, "To Do"), ChartPoint::new(t(1), 10, "Done")];
        let spec = synthesize(&points, dims(100, 100), t(1));

        let rows: Vec<(DateTime<Utc>, u32, &str)> =
            spec.table.iter().map(|r| (r.x, r.y, r.c.as_str())).collect();
        assert_eq!(rows, vec![(t(1), 0, "To Do"), (t(1), 10, "Done")]);
    }

    #[test]
    fn two_categories_color_range_is_red_then_blue() {
        let points = vec![ChartPoint::new(t(1), 3, "To Do"), ChartPoint::new(t(1), 1, "Done")];
        let spec = synthesize(&points, dims(100, 100), t(1));

        assert_eq!(spec.scales.color.name, "sprintcolumn");
        assert_eq!(spec.scales.color.domain, vec!["To Do", "Done"]);
        assert_eq!(spec.scales.color.range, vec!["#EE4949", "#347D9D"]);
        assert_eq!(spec.color_of("Done"), Some("#347D9D"));
    }

    #[test]
    fn categories_are_first_seen_order() {
        let points = vec![
            ChartPoint::new(t(1), 1, "B"),
            ChartPoint::new(t(1), 1, "A"),
            ChartPoint::new(t(2), 1, "B"),
            ChartPoint::new(t(2), 1, "C"),
        ];
        assert_eq!(categories(&points), vec!["B", "A", "C"]);
    }

    #[test]
    fn stacking_accumulates_within_timestamp_in_category_order() {
        let points = vec![
            ChartPoint::new(t(1), 5, "A"),
            ChartPoint::new(t(1), 10, "B"),
            ChartPoint::new(t(2), 25, "Z"),
            ChartPoint::new(t(1), 25, "Z"),
            ChartPoint::new(t(2), 4, "A"),
        ];
        let cats = categories(&points);
        let stacked = stack(&points, &cats);

        let bounds: Vec<(u32, u32)> = stacked.iter().map(|r| (r.y0, r.y1)).collect();
        assert_eq!(bounds, vec![(0, 5), (5, 15), (4, 29), (15, 40), (0, 4)]);
    }

    #[test]
    fn y_domain_uses_stacked_maximum_and_zero() {
        let points = vec![
            ChartPoint::new(t(1), 30, "A"),
            ChartPoint::new(t(1), 30, "B"),
            ChartPoint::new(t(2), 45, "A"),
        ];
        let spec = synthesize(&points, dims(100, 100), t(2));
        assert_eq!(spec.scales.y.domain, [0, 60]);
        assert!(spec.scales.y.zero);
        assert_eq!(spec.scales.y.nice_max, 60);
    }

    #[test]
    fn x_domain_spans_all_points() {
        let points = vec![
            ChartPoint::new(t(3), 1, "A"),
            ChartPoint::new(t(1), 1, "A"),
            ChartPoint::new(t(9), 1, "A"),
        ];
        let spec = synthesize(&points, dims(100, 100), t(3));
        assert_eq!(spec.scales.x.domain, Some([t(1), t(9)]));
    }

    #[test]
    fn one_area_per_category_plus_rule() {
        let points = vec![
            ChartPoint::new(t(2), 1, "A"),
            ChartPoint::new(t(1), 2, "A"),
            ChartPoint::new(t(1), 3, "B"),
        ];
        let spec = synthesize(&points, dims(100, 100), t(2));

        let areas: Vec<_> = spec.areas().collect();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].0, "A");
        assert_eq!(areas[0].1, "#EE4949");
        let xs: Vec<_> = areas[0].2.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![t(1), t(2)]);
        assert_eq!(spec.marks.len(), 3);
    }

    #[test]
    fn rule_marks_now_across_full_height() {
        let now = t(5) + Duration::minutes(7);
        let spec = synthesize(&[], dims(100, 151), now);

        assert_eq!(spec.rule(), Some((now, 0, 151)));
        let json = serde_json::to_value(&spec).unwrap();
        let rule = json["marks"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["type"] == "rule")
            .unwrap();
        assert_eq!(rule["strokeDash"], serde_json::json!([10, 5]));
        assert_eq!(rule["y"], 0);
        assert_eq!(rule["y2"], 151);
    }

    #[test]
    fn dimensions_carry_into_spec() {
        let spec = synthesize(&[], dims(250, 300), t(1));
        assert_eq!((spec.width, spec.height), (250, 300));
        assert_eq!(spec.scales.x.domain, None);
        assert_eq!(spec.scales.y.domain, [0, 0]);
    }

    #[test]
    fn legend_is_reversed_domain() {
        let points = vec![
            ChartPoint::new(t(1), 1, "To Do"),
            ChartPoint::new(t(1), 1, "Doing"),
            ChartPoint::new(t(1), 1, "Done"),
        ];
        let spec = synthesize(&points, dims(100, 100), t(1));
        assert_eq!(spec.legend.fill, "sprintcolumn");
        assert_eq!(spec.legend.values, vec!["Done", "Doing", "To Do"]);
    }

    #[test]
    fn axes_have_weekly_and_dim_grids() {
        let spec = synthesize(&[], dims(100, 100), t(1));
        let json = serde_json::to_value(&spec.axes).unwrap();
        assert_eq!(json[0]["orient"], "bottom");
        assert_eq!(json[0]["tickCount"], "week");
        assert_eq!(json[1]["orient"], "left");
        assert_eq!(json[1]["gridOpacity"], 0.25);
    }

    #[test]
    fn nice_ceiling_rounds_up_to_tick_step() {
        assert_eq!(nice_ceiling(0), 0);
        assert_eq!(nice_ceiling(1), 1);
        assert_eq!(nice_ceiling(3), 3);
        assert_eq!(nice_ceiling(7), 7);
        assert_eq!(nice_ceiling(11), 11);
        assert_eq!(nice_ceiling(60), 60);
        assert_eq!(nice_ceiling(61), 65);
        assert_eq!(nice_ceiling(75), 80);
        assert_eq!(nice_ceiling(99), 100);
        assert_eq!(nice_ceiling(200), 200);
        assert_eq!(nice_ceiling(1234), 1300);
    }
}
