//! SVG chart rendering with plotters.

use anyhow::{anyhow, ensure};
use chrono::NaiveDate;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

use crate::data::{CorrelationMatrix, MarketFrame};

const FONT: &str = "sans-serif";

// Seaborn "crest" end points
const CREST_LOW: RGBColor = RGBColor(165, 205, 144);
const CREST_HIGH: RGBColor = RGBColor(44, 49, 114);
const MISSING: RGBColor = RGBColor(225, 225, 225);

/// Display settings for one frame column.
#[derive(Clone)]
pub struct SeriesStyle {
    pub column: String,
    pub label: String,
    pub color: RGBColor,
}

/// One stacked panel of the trend chart.
pub struct TrendPanel<'a> {
    pub title: &'a str,
    pub y_label: &'a str,
    pub frame: &'a MarketFrame,
}

/// Stacked line panels sharing one date axis; legend on the top panel.
pub fn draw_trend_panels(
    path: &Path,
    title: &str,
    panels: &[TrendPanel<'_>],
    series: &[SeriesStyle],
) -> anyhow::Result<()> {
    let (start, end) = date_bounds(panels.iter().flat_map(|p| p.frame.dates().iter().copied()))
        .ok_or_else(|| anyhow!("no rows to plot"))?;

    let root = SVGBackend::new(path, (1400, 400 * panels.len().max(1) as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, (FONT, 26))?;
    let areas = root.split_evenly((panels.len(), 1));

    for (i, (area, panel)) in areas.iter().zip(panels).enumerate() {
        let last = i + 1 == panels.len();
        let mut chart = ChartBuilder::on(area)
            .caption(panel.title, (FONT, 20))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(60)
            .build_cartesian_2d(start..end, 0f64..100f64)?;

        chart
            .configure_mesh()
            .x_labels(12)
            .x_label_formatter(&|d| d.format("%Y-%m").to_string())
            .y_desc(panel.y_label)
            .x_desc(if last { "Date" } else { "" })
            .draw()?;

        for style in series {
            let color = style.color;
            chart
                .draw_series(LineSeries::new(panel.frame.points(&style.column), &color))?
                .label(style.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        if i == 0 {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }
    }

    root.present()?;
    Ok(())
}

/// Annotated correlation matrix. Row 0 is drawn at the top.
pub fn draw_heatmap(
    path: &Path,
    title: &str,
    labels: &[String],
    matrix: &CorrelationMatrix,
) -> anyhow::Result<()> {
    ensure!(
        labels.len() == matrix.values.len(),
        "{} labels for a {}x{} matrix",
        labels.len(),
        matrix.values.len(),
        matrix.values.len()
    );
    let n = labels.len() as f64;

    let root = SVGBackend::new(path, (1000, 850)).into_drawing_area();
    root.fill(&WHITE)?;

    // Cells occupy [0, n) on both axes; the negative strip holds the labels
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .build_cartesian_2d(-1.8f64..n, -0.6f64..n)?;

    let cells = matrix.values.iter().enumerate().flat_map(|(i, row)| {
        let y = n - 1.0 - i as f64;
        row.iter().enumerate().map(move |(j, value)| {
            let x = j as f64;
            Rectangle::new([(x, y), (x + 1.0, y + 1.0)], crest(*value).filled())
        })
    });
    chart.draw_series(cells)?;

    let grid = matrix.values.iter().enumerate().flat_map(|(i, row)| {
        let y = n - 1.0 - i as f64;
        row.iter().enumerate().map(move |(j, _)| {
            let x = j as f64;
            Rectangle::new([(x, y), (x + 1.0, y + 1.0)], WHITE.stroke_width(2))
        })
    });
    chart.draw_series(grid)?;

    let annotations = matrix.values.iter().enumerate().flat_map(|(i, row)| {
        let y = n - 0.5 - i as f64;
        row.iter().enumerate().map(move |(j, value)| {
            let (text, color) = match value {
                Some(v) if (v + 1.0) / 2.0 > 0.55 => (format!("{:.2}", v), WHITE),
                Some(v) => (format!("{:.2}", v), BLACK),
                None => ("n/a".to_string(), BLACK),
            };
            let style = (FONT, 18)
                .into_font()
                .color(&color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            Text::new(text, (j as f64 + 0.5, y), style)
        })
    });
    chart.draw_series(annotations)?;

    let row_style = (FONT, 16)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Right, VPos::Center));
    let col_style = (FONT, 16)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    let axis_labels = labels.iter().enumerate().flat_map(|(i, label)| {
        let offset = i as f64 + 0.5;
        [
            Text::new(label.clone(), (-0.1, n - offset), row_style.clone()),
            Text::new(label.clone(), (offset, -0.3), col_style.clone()),
        ]
    });
    chart.draw_series(axis_labels)?;

    root.present()?;
    Ok(())
}

/// Single-series line with the area down to its minimum shaded and the
/// series label next to the last point.
pub fn draw_recent_volatility(
    path: &Path,
    title: &str,
    style: &SeriesStyle,
    points: &[(NaiveDate, f64)],
) -> anyhow::Result<()> {
    let (start, end) = date_bounds(points.iter().map(|p| p.0))
        .ok_or_else(|| anyhow!("no volatility values to plot"))?;

    let min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((max - min) * 0.15).max(0.05);
    let color = style.color;

    let root = SVGBackend::new(path, (1400, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(start..end, (min - pad)..(max + pad))?;

    chart
        .configure_mesh()
        .x_labels(points.len())
        .x_label_formatter(&|d| d.format("%Y-%m-%d").to_string())
        .y_desc("Volatility: (std of value)")
        .x_desc("Date")
        .draw()?;

    chart.draw_series(AreaSeries::new(points.iter().copied(), min, color.mix(0.1)))?;
    chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?;

    if let Some(&(x, y)) = points.last() {
        let label_style = (FONT, 16)
            .into_font()
            .color(&color)
            .pos(Pos::new(HPos::Right, VPos::Bottom));
        chart.draw_series(std::iter::once(Text::new(
            style.label.clone(),
            (x, y + 0.02),
            label_style,
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Earliest and latest date, widened to at least one day.
fn date_bounds(dates: impl Iterator<Item = NaiveDate>) -> Option<(NaiveDate, NaiveDate)> {
    let (min, max) = dates.fold(None, |acc: Option<(NaiveDate, NaiveDate)>, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })?;
    if min == max {
        return Some((min, max.succ_opt().unwrap_or(max)));
    }
    Some((min, max))
}

/// Maps a correlation in [-1, 1] onto the crest palette.
fn crest(value: Option<f64>) -> RGBColor {
    let Some(v) = value else { return MISSING };
    let t = ((v + 1.0) / 2.0).clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(
        lerp(CREST_LOW.0, CREST_HIGH.0),
        lerp(CREST_LOW.1, CREST_HIGH.1),
        lerp(CREST_LOW.2, CREST_HIGH.2),
    )
}
