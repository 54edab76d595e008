use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::series::TimeSeries;
use crate::error::{MarketDataError, Result};

/// Several indicator columns aligned on one ascending date axis.
///
/// Every column has exactly one slot per date; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFrame {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

/// Pairwise correlations between the columns of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == row)?;
        let j = self.columns.iter().position(|c| c == col)?;
        self.values[i][j]
    }
}

impl MarketFrame {
    /// Builds a frame, checking every column matches the date axis.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if columns.len() != values.len() || values.iter().any(|v| v.len() != dates.len()) {
            return Err(MarketDataError::parse(
                "market frame",
                "column lengths do not match the date axis",
            ));
        }
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    /// Outer-joins the tables on date, then fills the gaps.
    ///
    /// The result is sorted ascending. Each column is forward-filled and then
    /// back-filled, so a column is only left with `None` if it has no values
    /// at all.
    pub fn combine(tables: &[TimeSeries]) -> Result<Self> {
        if tables.is_empty() {
            return Err(MarketDataError::NoData);
        }

        let dates: Vec<NaiveDate> = tables
            .iter()
            .flat_map(|t| t.observations.iter().map(|o| o.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let values = tables
            .iter()
            .map(|table| {
                let mut column = vec![None; dates.len()];
                // First row wins for repeated dates, matching the store's dedup
                for obs in table.observations.iter().rev() {
                    if let Ok(idx) = dates.binary_search(&obs.date) {
                        column[idx] = obs.value;
                    }
                }
                column
            })
            .collect();

        let columns = tables.iter().map(|t| t.column.clone()).collect();
        let mut frame = Self::new(dates, columns, values)?;
        frame.forward_fill();
        frame.back_fill();
        Ok(frame)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[idx])
    }

    /// `(date, value)` pairs of a column, skipping missing values.
    pub fn points(&self, name: &str) -> Vec<(NaiveDate, f64)> {
        self.column(name)
            .map(|values| {
                self.dates
                    .iter()
                    .zip(values)
                    .filter_map(|(d, v)| v.map(|v| (*d, v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Carries the last seen value forward over gaps.
    pub fn forward_fill(&mut self) {
        for column in &mut self.values {
            let mut last = None;
            for slot in column.iter_mut() {
                match slot {
                    Some(v) => last = Some(*v),
                    None => *slot = last,
                }
            }
        }
    }

    /// Fills leading gaps with the next seen value.
    pub fn back_fill(&mut self) {
        for column in &mut self.values {
            let mut next = None;
            for slot in column.iter_mut().rev() {
                match slot {
                    Some(v) => next = Some(*v),
                    None => *slot = next,
                }
            }
        }
    }

    /// Min-max scales every column to `0..=factor`.
    ///
    /// A column without range (constant or empty) has nothing to scale and
    /// becomes all `None`.
    pub fn normalize(&self, factor: f64) -> Self {
        self.map_columns(|values| {
            let present = values.iter().flatten();
            let min = present.clone().copied().fold(f64::INFINITY, f64::min);
            let max = present.copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;

            values
                .iter()
                .map(|v| {
                    v.and_then(|v| {
                        if range > 0.0 && range.is_finite() {
                            Some((v - min) / range * factor)
                        } else {
                            None
                        }
                    })
                })
                .collect()
        })
    }

    /// Simple moving average over the trailing `window` rows.
    ///
    /// `None` until the window is full, or while any value in it is missing.
    pub fn rolling_mean(&self, window: usize) -> Self {
        self.map_columns(|values| {
            rolling(values, window, |w| Some(w.iter().sum::<f64>() / w.len() as f64))
        })
    }

    /// Sample standard deviation (n - 1) over the trailing `window` rows.
    pub fn rolling_std(&self, window: usize) -> Self {
        self.map_columns(|values| rolling(values, window, sample_std))
    }

    /// Relative change from the previous row.
    pub fn pct_change(&self) -> Self {
        self.map_columns(|values| {
            let mut out = Vec::with_capacity(values.len());
            out.push(None);
            for pair in values.windows(2) {
                out.push(match (pair[0], pair[1]) {
                    (Some(prev), Some(curr)) if prev != 0.0 => Some(curr / prev - 1.0),
                    _ => None,
                });
            }
            out.truncate(values.len());
            out
        })
    }

    /// Pearson correlation for every column pair over rows where both are present.
    pub fn correlation(&self) -> CorrelationMatrix {
        let n = self.columns.len();
        let mut values = vec![vec![None; n]; n];

        for i in 0..n {
            for j in i..n {
                let r = pearson(&self.values[i], &self.values[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        CorrelationMatrix {
            columns: self.columns.clone(),
            values,
        }
    }

    /// Rows dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> Self {
        let from = self.dates.partition_point(|d| *d < start);
        Self {
            dates: self.dates[from..].to_vec(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|v| v[from..].to_vec()).collect(),
        }
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        let from = self.len().saturating_sub(n);
        Self {
            dates: self.dates[from..].to_vec(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|v| v[from..].to_vec()).collect(),
        }
    }

    /// Keeps only the named column and drops rows where it is missing.
    pub fn drop_missing(&self, name: &str) -> Option<Self> {
        let idx = self.columns.iter().position(|c| c == name)?;
        let (dates, values): (Vec<_>, Vec<_>) = self
            .dates
            .iter()
            .zip(&self.values[idx])
            .filter(|(_, v)| v.is_some())
            .map(|(d, v)| (*d, *v))
            .unzip();

        Some(Self {
            dates,
            columns: vec![name.to_string()],
            values: vec![values],
        })
    }

    /// Multiplies every present value by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        self.map_columns(|values| values.iter().map(|v| v.map(|v| v * factor)).collect())
    }

    fn map_columns<F>(&self, f: F) -> Self
    where
        F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        Self {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|v| f(v)).collect(),
        }
    }
}

fn rolling<F>(values: &[Option<f64>], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if window == 0 {
        return vec![None; values.len()];
    }

    let mut out = vec![None; values.len()];
    for end in window..=values.len() {
        let slice = &values[end - window..end];
        let full: Option<Vec<f64>> = slice.iter().copied().collect();
        out[end - 1] = full.and_then(|w| stat(&w));
    }
    out
}

fn sample_std(window: &[f64]) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let variance = window
        .iter()
        .map(|&v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (window.len() - 1) as f64;
    Some(variance.sqrt())
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::Observation;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn table(column: &str, rows: &[(u32, Option<f64>)]) -> TimeSeries {
        TimeSeries::new(
            column,
            rows.iter().map(|(d, v)| Observation::new(day(*d), *v)).collect(),
        )
    }

    fn frame(values: Vec<Option<f64>>) -> MarketFrame {
        let dates = (1..=values.len() as u32).map(day).collect();
        MarketFrame::new(dates, vec!["x".into()], vec![values]).unwrap()
    }

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_combine_outer_joins_and_fills() {
        // Newest-first input, as stored
        let brent = table("brent_value", &[(4, Some(64.0)), (2, Some(62.0))]);
        let usd = table("usd_value", &[(3, Some(1.10)), (1, None)]);

        let combined = MarketFrame::combine(&[brent, usd]).unwrap();

        assert_eq!(combined.dates(), &[day(1), day(2), day(3), day(4)]);
        // Leading gap back-filled, inner gap forward-filled
        assert_eq!(
            combined.column("brent_value").unwrap(),
            &[Some(62.0), Some(62.0), Some(62.0), Some(64.0)]
        );
        assert_eq!(
            combined.column("usd_value").unwrap(),
            &[Some(1.10), Some(1.10), Some(1.10), Some(1.10)]
        );
    }

    #[test]
    fn test_combine_prefers_first_row_for_duplicate_dates() {
        let vix = table("close_^VIX", &[(2, Some(20.0)), (2, Some(99.0)), (1, Some(18.0))]);
        let combined = MarketFrame::combine(&[vix]).unwrap();
        assert_eq!(combined.column("close_^VIX").unwrap(), &[Some(18.0), Some(20.0)]);
    }

    #[test]
    fn test_combine_requires_tables() {
        assert!(matches!(MarketFrame::combine(&[]), Err(MarketDataError::NoData)));
    }

    #[test]
    fn test_normalize_scales_to_factor() {
        let normalized = frame(vec![Some(10.0), Some(15.0), Some(20.0)]).normalize(100.0);
        assert_eq!(
            normalized.column("x").unwrap(),
            &[Some(0.0), Some(50.0), Some(100.0)]
        );

        let flat = frame(vec![Some(3.0), Some(3.0)]).normalize(100.0);
        assert_eq!(flat.column("x").unwrap(), &[None, None]);
    }

    #[test]
    fn test_rolling_mean_needs_full_window() {
        let rolled = frame(vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0), Some(6.0)])
            .rolling_mean(2);
        assert_eq!(
            rolled.column("x").unwrap(),
            &[None, Some(1.5), Some(2.5), None, None, Some(5.5)]
        );
    }

    #[test]
    fn test_pct_change_and_rolling_std() {
        let changes = frame(vec![Some(100.0), Some(110.0), Some(99.0)]).pct_change();
        let col = changes.column("x").unwrap();
        assert_eq!(col[0], None);
        assert!(approx(col[1], 0.10));
        assert!(approx(col[2], -0.10));

        let std = frame(vec![Some(2.0), Some(4.0), Some(4.0), Some(4.0), Some(5.0)]).rolling_std(5);
        // Sample std of [2, 4, 4, 4, 5]
        assert!(approx(std.column("x").unwrap()[4], 1.0954451150103321));
        assert_eq!(std.column("x").unwrap()[3], None);
    }

    #[test]
    fn test_correlation_matrix() {
        let dates: Vec<_> = (1..=4).map(day).collect();
        let frame = MarketFrame::new(
            dates,
            vec!["a".into(), "b".into(), "c".into(), "flat".into()],
            vec![
                vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
                vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0)],
                vec![Some(4.0), Some(3.0), None, Some(1.0)],
                vec![Some(1.0), Some(1.0), Some(1.0), Some(1.0)],
            ],
        )
        .unwrap();

        let corr = frame.correlation();
        assert!(approx(corr.get("a", "b"), 1.0));
        assert!(approx(corr.get("a", "c"), -1.0));
        assert!(approx(corr.get("c", "c"), 1.0));
        assert_eq!(corr.get("a", "flat"), None);
        assert_eq!(corr.get("a", "b"), corr.get("b", "a"));
    }

    #[test]
    fn test_since_tail_and_drop_missing() {
        let f = frame(vec![None, Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(f.since(day(3)).dates(), &[day(3), day(4)]);
        assert_eq!(f.tail(2).column("x").unwrap(), &[Some(3.0), Some(4.0)]);

        let dense = f.drop_missing("x").unwrap();
        assert_eq!(dense.len(), 3);
        assert_eq!(dense.points("x")[0], (day(2), 2.0));
        assert!(f.drop_missing("y").is_none());
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = MarketFrame::new(vec![day(1)], vec!["x".into()], vec![vec![]]);
        assert!(result.is_err());
    }
}
