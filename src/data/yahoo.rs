//! Yahoo Finance chart API collector
//!
//! Daily closes for the Brent futures contract (`BZ=F`) and the VIX index
//! (`^VIX`) from Yahoo Finance's unofficial chart endpoint.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use super::ingestion::{CollectMode, Collector};
use super::series::{today, two_years_before, Observation, TimeSeries};
use super::Indicator;
use crate::error::{MarketDataError, Result};

const PROVIDER: &str = "Yahoo Finance";

/// Daily close collector for one Yahoo ticker.
pub struct YahooCollector {
    client: reqwest::Client,
    base_url: String,
    indicator: Indicator,
}

impl YahooCollector {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, indicator: Indicator) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            indicator,
        }
    }

    pub fn bz_futures(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self::new(client, base_url, Indicator::BzFutures)
    }

    pub fn vix(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self::new(client, base_url, Indicator::Vix)
    }

    pub fn ticker(&self) -> &'static str {
        ticker_for(self.indicator)
    }

    async fn fetch_chart(&self, mode: CollectMode, today: NaiveDate) -> Result<ChartResponse> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            encode_ticker(self.ticker())
        );

        let mut params = vec![("interval", "1d".to_string())];
        match mode {
            CollectMode::Historical => {
                params.push(("period1", day_start_timestamp(two_years_before(today)).to_string()));
                params.push(("period2", day_start_timestamp(today).to_string()));
            }
            CollectMode::Current => params.push(("range", "1d".to_string())),
        }

        let response = self.client.get(&url).query(&params).send().await?;

        // Yahoo reports unknown tickers as 404 with a JSON error body
        let status = response.status();
        let body = response.text().await?;
        serde_json::from_str::<ChartResponse>(&body).map_err(|e| {
            if status.is_success() {
                MarketDataError::parse("Yahoo chart response", e.to_string())
            } else {
                MarketDataError::api(PROVIDER, format!("HTTP {}", status))
            }
        })
    }
}

#[async_trait]
impl Collector for YahooCollector {
    fn indicator(&self) -> Indicator {
        self.indicator
    }

    async fn collect(&self, mode: CollectMode) -> Result<TimeSeries> {
        let chart = self.fetch_chart(mode, today()).await?;
        let mut series = chart_to_series(chart, self.indicator.column())?;

        if mode == CollectMode::Current {
            // `range=1d` can return the previous session as well, and an
            // open session may not have a close yet
            let latest = *series
                .observations
                .iter()
                .find(|obs| obs.value.is_some())
                .ok_or(MarketDataError::Empty(PROVIDER))?;
            series.observations = vec![latest];
        }

        tracing::debug!(
            ticker = self.ticker(),
            rows = series.len(),
            "Yahoo chart data received"
        );
        Ok(series)
    }
}

fn ticker_for(indicator: Indicator) -> &'static str {
    match indicator {
        Indicator::Vix => "^VIX",
        _ => "BZ=F",
    }
}

/// `^` is not a valid URI path character.
fn encode_ticker(ticker: &str) -> String {
    ticker.replace('^', "%5E")
}

fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp())
        .unwrap_or_default()
}

/// Converts a chart response into a newest-first table.
///
/// Timestamps are shifted by the exchange GMT offset so each row carries the
/// local trading date.
fn chart_to_series(chart: ChartResponse, column: &str) -> Result<TimeSeries> {
    if let Some(error) = chart.chart.error {
        return Err(MarketDataError::api(
            PROVIDER,
            format!("{}: {}", error.code, error.description),
        ));
    }

    let result = chart
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or(MarketDataError::Empty(PROVIDER))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();
    let offset = result.meta.gmtoffset.unwrap_or(0);

    let mut observations = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + offset, 0)
            .ok_or_else(|| MarketDataError::parse("Yahoo chart response", format!("bad timestamp {}", ts)))?
            .date_naive();
        let close = closes.get(i).copied().flatten().filter(|v| v.is_finite());
        observations.push(Observation::new(date, close));
    }

    let mut series = TimeSeries::new(column, observations);
    if series.is_empty() {
        return Err(MarketDataError::Empty(PROVIDER));
    }

    series.sort_descending();
    series.dedup_dates();
    Ok(series)
}

// Yahoo Finance chart API response structures

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
