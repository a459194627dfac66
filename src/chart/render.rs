use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use super::spec::{synthesize, ChartSpec, RULE_DASH};
use crate::model::chart::{ChartDimensions, ChartPoint};

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid color \"{0}\"")]
    Color(String),
    #[error("failed to draw chart: {0}")]
    Drawing(String),
}

fn drawing<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Drawing(e.to_string())
}

/// Builds the spec for `points` and renders it to an SVG document.
pub fn create_chart(
    points: &[ChartPoint],
    dimensions: ChartDimensions,
    now: DateTime<Utc>,
) -> Result<String, RenderError> {
    render(&synthesize(points, dimensions, now))
}

pub fn parse_hex_color(hex: &str) -> Result<RGBColor, RenderError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(RenderError::Color(hex.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| RenderError::Color(hex.to_string()))
    };
    Ok(RGBColor(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Time range to draw. An empty or single-instant domain is widened by a
/// day on each side so the axis has extent.
fn time_bounds(spec: &ChartSpec, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    match spec.scales.x.domain {
        Some([start, end]) if start < end => (start, end),
        Some([instant, _]) => (instant - Duration::days(1), instant + Duration::days(1)),
        None => (now - Duration::days(1), now + Duration::days(1)),
    }
}

/// Draws the spec with the SVG backend and returns the document text.
pub fn render(spec: &ChartSpec) -> Result<String, RenderError> {
    let now = spec.rule().map(|(x, _, _)| x).unwrap_or_else(Utc::now);
    let (x_start, x_end) = time_bounds(spec, now);
    let y_max = spec.scales.y.nice_max.max(1);

    let mut areas = Vec::new();
    for (category, fill, points) in spec.areas() {
        let fill = spec.color_of(category).unwrap_or(fill);
        areas.push((category, parse_hex_color(fill)?, points));
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (spec.width, spec.height)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(8)
            .x_label_area_size(24)
            .y_label_area_size(32)
            .build_cartesian_2d(x_start..x_end, 0u32..y_max)
            .map_err(drawing)?;

        chart
            .configure_mesh()
            .x_labels(5)
            .y_labels(5)
            .light_line_style(ShapeStyle::from(&BLACK.mix(0.05)).stroke_width(1))
            .bold_line_style(ShapeStyle::from(&BLACK.mix(0.25)).stroke_width(1))
            .x_label_formatter(&|d: &DateTime<Utc>| d.format("%m/%d").to_string())
            .draw()
            .map_err(drawing)?;

        // Legend entries follow draw order, so draw top of the stack first.
        for category in &spec.legend.values {
            let Some((name, color, points)) = areas.iter().find(|(c, _, _)| *c == category.as_str()) else {
                continue;
            };
            let color = *color;

            let mut outline: Vec<(DateTime<Utc>, u32)> =
                points.iter().map(|p| (p.x, p.y1)).collect();
            outline.extend(points.iter().rev().map(|p| (p.x, p.y0)));

            chart
                .draw_series(std::iter::once(Polygon::new(outline, color.filled())))
                .map_err(drawing)?
                .label(name.to_string())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        if now >= x_start && now <= x_end {
            let [dash, gap] = RULE_DASH;
            chart
                .draw_series(DashedLineSeries::new(
                    vec![(now, 0), (now, y_max)],
                    dash,
                    gap,
                    BLACK.stroke_width(1),
                ))
                .map_err(drawing)?;
        }

        if !areas.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK.mix(0.4))
                .draw()
                .map_err(drawing)?;
        }

        root.present().map_err(drawing)?;
    }

    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn sample_points() -> Vec<ChartPoint> {
        vec![
            ChartPoint::new(t(1), 20, "To Do"),
            ChartPoint::new(t(1), 5, "In Progress"),
            ChartPoint::new(t(1), 0, "Done"),
            ChartPoint::new(t(4), 10, "To Do"),
            ChartPoint::new(t(4), 8, "In Progress"),
            ChartPoint::new(t(4), 7, "Done"),
            ChartPoint::new(t(8), 0, "To Do"),
            ChartPoint::new(t(8), 0, "In Progress"),
            ChartPoint::new(t(8), 25, "Done"),
        ]
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#347D9D").unwrap(), RGBColor(0x34, 0x7D, 0x9D));
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
    }

    #[test]
    fn renders_svg_document() {
        let svg = create_chart(&sample_points(), ChartDimensions::default(), t(4)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("width=\"500\""));
        assert!(svg.contains("height=\"200\""));
    }

    #[test]
    fn svg_uses_column_colors() {
        let svg = create_chart(&sample_points(), ChartDimensions::default(), t(4)).unwrap();
        let upper = svg.to_uppercase();
        for color in ["#EE4949", "#49EE49", "#347D9D"] {
            assert!(upper.contains(color), "missing {color}");
        }
    }

    #[test]
    fn legend_names_every_column() {
        let svg = create_chart(&sample_points(), ChartDimensions::default(), t(4)).unwrap();
        for name in ["To Do", "In Progress", "Done"] {
            assert!(svg.contains(name), "missing legend entry {name}");
        }
    }

    #[test]
    fn area_fill_comes_from_color_scale() {
        let mut spec = synthesize(&sample_points(), ChartDimensions::default(), t(4));
        for mark in &mut spec.marks {
            if let crate::chart::spec::Mark::Area { fill, .. } = mark {
                *fill = "#010203".to_string();
            }
        }

        let svg = render(&spec).unwrap().to_uppercase();
        assert!(!svg.contains("#010203"));
        assert!(svg.contains("#EE4949"));
    }

    fn stroke_count(svg: &str) -> usize {
        svg.matches("<polyline").count() + svg.matches("<line").count()
    }

    #[test]
    fn now_rule_is_drawn_as_dashes() {
        let inside = create_chart(&sample_points(), ChartDimensions::default(), t(4)).unwrap();
        let outside = create_chart(&sample_points(), ChartDimensions::default(), t(20)).unwrap();

        // about 150px of plot height at 10px dashes with 5px gaps
        let dashes = stroke_count(&inside) - stroke_count(&outside);
        assert!(dashes >= 5, "expected dashed rule segments, got {dashes}");
    }

    #[test]
    fn empty_data_still_renders() {
        let svg = create_chart(&[], ChartDimensions { width: 100, height: 100 }, t(1)).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn single_instant_domain_is_widened() {
        let spec = synthesize(&[ChartPoint::new(t(2), 3, "A")], ChartDimensions::default(), t(2));
        let (start, end) = time_bounds(&spec, t(2));
        assert_eq!(start, t(1));
        assert_eq!(end, t(3));
    }
}
