use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single dated value of one indicator.
///
/// `value` is `None` when the source reported a missing or non-numeric
/// quote for the day (Alpha Vantage uses `"."`, Yahoo uses `null`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }
}

/// One stored table: a named value column indexed by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub column: String,
    pub observations: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(column: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            column: column.into(),
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Sorts newest first. The sort is stable so same-day rows keep their order.
    pub fn sort_descending(&mut self) {
        self.observations.sort_by(|a, b| b.date.cmp(&a.date));
    }

    /// Drops repeated dates, keeping the first row seen for each.
    pub fn dedup_dates(&mut self) {
        let mut seen = HashSet::with_capacity(self.observations.len());
        self.observations.retain(|obs| seen.insert(obs.date));
    }

    /// Keeps rows dated on or after `start`.
    pub fn since(mut self, start: NaiveDate) -> Self {
        self.observations.retain(|obs| obs.date >= start);
        self
    }

    pub fn head(&self, n: usize) -> &[Observation] {
        &self.observations[..n.min(self.observations.len())]
    }

    /// Most recent observation regardless of row order.
    pub fn latest(&self) -> Option<&Observation> {
        self.observations.iter().max_by_key(|obs| obs.date)
    }
}

/// Current calendar date in UTC, shared by the collectors and the charts.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Start of the two-year history window. Feb 29 clamps to Feb 28.
pub fn two_years_before(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_months(Months::new(24))
        .unwrap_or(NaiveDate::MIN)
}
