use crate::models::Sample;
use crate::utils::format_usd;
use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

pub const CHART_WIDTH: u32 = 1200;
pub const CHART_HEIGHT: u32 = 700;

/// Plot coordinates. Sample timestamps are local wall-clock values; they are
/// placed on a UTC axis unchanged so the labels show the same local time.
fn to_points(samples: &[Sample]) -> Vec<(DateTime<Utc>, f64)> {
    samples
        .iter()
        .map(|s| (DateTime::<Utc>::from_naive_utc_and_offset(s.timestamp, Utc), s.price))
        .collect()
}

/// Axis ranges with 10% price padding. A single sample gets a two-minute
/// time span and a flat series a small price band so neither range is empty.
pub fn axis_ranges(samples: &[Sample]) -> Option<(Range<DateTime<Utc>>, Range<f64>)> {
    let points = to_points(samples);
    let first = points.first()?;
    let last = points.last()?;

    let (mut x_min, mut x_max) = (first.0, last.0);
    if x_min >= x_max {
        x_min -= Duration::minutes(1);
        x_max = first.0 + Duration::minutes(1);
    }

    let min_price = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_price = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let price_range = (max_price - min_price)
        .max(max_price.abs() * 1e-3)
        .max(1e-8);
    let padding = price_range * 0.1;
    let y_min = (min_price - padding).max(0.0);
    let y_max = max_price + padding;

    Some((x_min..x_max, y_min..y_max))
}

/// Render samples as a PNG line chart at `path`, replacing any previous chart
pub fn render_price_chart(
    samples: &[Sample],
    path: &Path,
    asset_name: &str,
    width: u32,
    height: u32,
) -> Result<(), String> {
    let (x_range, y_range) =
        axis_ranges(samples).ok_or("No price data to generate chart.".to_string())?;
    let points = to_points(samples);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }

    let date_str = samples[0].timestamp.format("%d/%m/%Y");

    let backend = BitMapBackend::new(path, (width, height));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| format!("Failed to fill canvas: {}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} Spot Price - {}", asset_name, date_str),
            ("sans-serif", 32.0).into_font(),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| format!("Failed to build chart: {}", e))?;

    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc("Price (USD)")
        .x_label_formatter(&|t: &DateTime<Utc>| t.format("%H:%M").to_string())
        .y_label_formatter(&|p: &f64| format_usd(*p))
        .draw()
        .map_err(|e| format!("Failed to draw mesh: {}", e))?;

    let line_color = RGBColor(0x00, 0x56, 0xb3);

    chart
        .draw_series(LineSeries::new(points.iter().copied(), &line_color))
        .map_err(|e| format!("Failed to draw line: {}", e))?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&(t, price)| Circle::new((t, price), 3, line_color.filled())),
        )
        .map_err(|e| format!("Failed to draw points: {}", e))?;

    root.present()
        .map_err(|e| format!("Failed to render chart: {}", e))?;

    Ok(())
}
