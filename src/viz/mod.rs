//! Comparative charts over the stored indicators.

pub mod charts;

use chrono::{Datelike, NaiveDate};
use plotters::style::BLACK;
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{CorrelationMatrix, Indicator, MarketFrame, TimeSeries};
use crate::error::{MarketDataError, Result};
use crate::store::MarketStore;
use charts::{SeriesStyle, TrendPanel};

pub const NORMALIZE_FACTOR: f64 = 100.0;
pub const WEEKLY_WINDOW: usize = 7;
pub const MONTHLY_WINDOW: usize = 30;
/// Window of the rolling std fed into the volatility heatmap.
pub const VOLATILITY_WINDOW: usize = 30;
/// Window of the rolling std in the recent volatility chart.
pub const RECENT_VOLATILITY_WINDOW: usize = 20;
pub const RECENT_VOLATILITY_DAYS: usize = 7;

pub const TREND_CHART: &str = "long_term_trend.svg";
pub const CORRELATION_CHART: &str = "correlation_heatmap.svg";
pub const VOLATILITY_CHART: &str = "volatility_heatmap.svg";
pub const RECENT_VOLATILITY_CHART: &str = "recent_volatility.svg";

/// Combined, gap-filled view of every stored indicator.
///
/// The normalized frame and both rolling averages are computed once up front;
/// every chart reads from them.
pub struct MarketView {
    combined: MarketFrame,
    normalized: MarketFrame,
    rolling_weekly: MarketFrame,
    rolling_monthly: MarketFrame,
    styles: Vec<SeriesStyle>,
}

impl MarketView {
    /// Loads all tables from the store.
    ///
    /// # Errors
    /// Returns an error if the store is missing or unreadable, or holds no rows
    pub fn load(store: &MarketStore) -> Result<Self> {
        Self::from_tables(store.load_all()?)
    }

    /// Builds the view from `(table name, table)` pairs in display order.
    ///
    /// # Errors
    /// Returns `NoData` if there are no tables or none of them has a row
    pub fn from_tables(tables: Vec<(String, TimeSeries)>) -> Result<Self> {
        if tables.is_empty() {
            return Err(MarketDataError::NoData);
        }

        let styles = tables
            .iter()
            .map(|(name, table)| {
                let indicator = Indicator::from_table_name(name)
                    .or_else(|| Indicator::from_column(&table.column));
                SeriesStyle {
                    column: table.column.clone(),
                    label: indicator.map_or_else(|| name.clone(), |i| i.label().to_string()),
                    color: indicator.map_or(BLACK, |i| i.color()),
                }
            })
            .collect();

        let series: Vec<TimeSeries> = tables.into_iter().map(|(_, table)| table).collect();
        let combined = MarketFrame::combine(&series)?;
        if combined.is_empty() {
            return Err(MarketDataError::NoData);
        }
        let normalized = combined.normalize(NORMALIZE_FACTOR);

        tracing::debug!(
            rows = combined.len(),
            columns = combined.columns().len(),
            "market frame combined"
        );

        let mut view = Self {
            rolling_weekly: normalized.clone(),
            rolling_monthly: normalized.clone(),
            combined,
            normalized,
            styles,
        };
        view.rolling_weekly = view.rolling_average(WEEKLY_WINDOW, true);
        view.rolling_monthly = view.rolling_average(MONTHLY_WINDOW, true);
        Ok(view)
    }

    pub fn combined(&self) -> &MarketFrame {
        &self.combined
    }

    pub fn normalized(&self) -> &MarketFrame {
        &self.normalized
    }

    pub fn labels(&self) -> Vec<String> {
        self.styles.iter().map(|s| s.label.clone()).collect()
    }

    /// Rolling mean of the normalized or raw frame.
    pub fn rolling_average(&self, window: usize, normalized: bool) -> MarketFrame {
        if normalized {
            self.normalized.rolling_mean(window)
        } else {
            self.combined.rolling_mean(window)
        }
    }

    /// Daily, weekly and monthly frames for the trend chart.
    ///
    /// With `ytd` only rows from Jan 1 of `today`'s year are kept.
    pub fn trend_frames(&self, ytd: bool, today: NaiveDate) -> [MarketFrame; 3] {
        let frames = [
            self.normalized().clone(),
            self.rolling_weekly.clone(),
            self.rolling_monthly.clone(),
        ];
        if !ytd {
            return frames;
        }

        match NaiveDate::from_ymd_opt(today.year(), 1, 1) {
            Some(jan_first) => frames.map(|f| f.since(jan_first)),
            None => frames,
        }
    }

    /// Correlation of price levels.
    pub fn correlation(&self) -> CorrelationMatrix {
        self.combined().correlation()
    }

    /// Correlation of the rolling volatility of daily returns.
    pub fn volatility_correlation(&self) -> CorrelationMatrix {
        self.combined()
            .pct_change()
            .rolling_std(VOLATILITY_WINDOW)
            .correlation()
    }

    /// Brent crude rolling volatility over the last week, in percent.
    ///
    /// Each value is the std of daily % changes over the previous 20 days.
    ///
    /// # Errors
    /// Returns a parse error if no Brent crude table was loaded
    pub fn recent_volatility_series(&self) -> Result<Vec<(NaiveDate, f64)>> {
        let column = Indicator::Brent.column();
        let volatility = self
            .combined()
            .pct_change()
            .rolling_std(RECENT_VOLATILITY_WINDOW)
            .drop_missing(column)
            .ok_or_else(|| {
                MarketDataError::parse("market frame", format!("column {} not loaded", column))
            })?;

        Ok(volatility
            .tail(RECENT_VOLATILITY_DAYS)
            .scale(100.0)
            .points(column))
    }

    /// Three stacked panels of normalized trends, written to `long_term_trend.svg`.
    ///
    /// # Arguments
    /// * `ytd`: Only plot rows from Jan 1 of `today`'s year
    /// * `today`: Reference date for the year-to-date cut
    /// * `out_dir`: Chart directory, created if missing
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the chart cannot be drawn
    pub fn long_term_trend(&self, ytd: bool, today: NaiveDate, out_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = prepare(out_dir, TREND_CHART)?;
        let [daily, weekly, monthly] = self.trend_frames(ytd, today);
        let span = if ytd { "year to date" } else { "2Y" };

        let panels = [
            TrendPanel { title: "Daily Values", y_label: "Daily Normalized Value", frame: &daily },
            TrendPanel { title: "Weekly Rolling Average", y_label: "Weekly Value", frame: &weekly },
            TrendPanel { title: "Monthly Rolling Average", y_label: "Monthly Value", frame: &monthly },
        ];
        charts::draw_trend_panels(
            &path,
            &format!("Brent Crude and related indexes value development over {}, Normalized", span),
            &panels,
            &self.styles,
        )?;

        tracing::info!(path = %path.display(), "trend chart written");
        Ok(path)
    }

    /// Annotated price-level correlation matrix, written to `correlation_heatmap.svg`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the chart cannot be drawn
    pub fn correlation_heatmap(&self, out_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = prepare(out_dir, CORRELATION_CHART)?;
        let matrix = self.correlation();
        charts::draw_heatmap(&path, "Indexes Correlation Heatmap", &self.labels(), &matrix)?;
        tracing::info!(
            path = %path.display(),
            brent_vs_futures = ?matrix.get(Indicator::Brent.column(), Indicator::BzFutures.column()),
            "correlation heatmap written"
        );
        Ok(path)
    }

    /// Correlation of 30-day rolling volatility, written to `volatility_heatmap.svg`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the chart cannot be drawn
    pub fn volatility_heatmap(&self, out_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = prepare(out_dir, VOLATILITY_CHART)?;
        charts::draw_heatmap(
            &path,
            "Indexes Rolling Volatility Correlation Heatmap",
            &self.labels(),
            &self.volatility_correlation(),
        )?;
        tracing::info!(path = %path.display(), "volatility heatmap written");
        Ok(path)
    }

    /// Brent crude volatility over the last week, written to `recent_volatility.svg`.
    ///
    /// # Errors
    /// Returns an error if Brent crude is not loaded, has too few rows for the
    /// 20-day window, or the chart cannot be written
    pub fn recent_volatility(&self, out_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = prepare(out_dir, RECENT_VOLATILITY_CHART)?;
        let points = self.recent_volatility_series()?;
        let style = SeriesStyle {
            column: Indicator::Brent.column().to_string(),
            label: Indicator::Brent.label().to_string(),
            color: Indicator::Brent.color(),
        };

        charts::draw_recent_volatility(
            &path,
            "Brent Crude Rolling Volatility: Daily % change in last 7 Days compared to 20 days window",
            &style,
            &points,
        )?;
        tracing::info!(path = %path.display(), "recent volatility chart written");
        Ok(path)
    }
}

fn prepare(out_dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    Ok(out_dir.join(file_name))
}
