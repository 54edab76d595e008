use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::ingestion::{CollectMode, Collector};
use super::series::{today, two_years_before, Observation, TimeSeries};
use super::Indicator;
use crate::error::{MarketDataError, Result};

const PROVIDER: &str = "Alpha Vantage";

/// Row of the commodity endpoint. Values are strings; missing days are `"."`.
#[derive(Debug, Deserialize)]
struct CommodityRow {
    date: String,
    value: String,
}

/// Fetches Brent crude spot prices from the Alpha Vantage `BRENT` function.
///
/// The endpoint always returns the full daily history, newest first. In
/// historical mode it is cut to the last two years; in current mode only the
/// most recent row is kept.
pub struct BrentCollector {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl BrentCollector {
    /// Creates a new `BrentCollector`.
    ///
    /// # Errors
    /// Returns a configuration error if the API key is empty
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MarketDataError::Config(
                "ALPHA_VANTAGE_API_KEY must be set in environment".into(),
            ));
        }

        Ok(Self {
            api_key,
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_quotes(&self) -> Result<serde_json::Value> {
        let url = format!("{}/query", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "BRENT"),
                ("interval", "daily"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        Ok(response)
    }
}

#[async_trait]
impl Collector for BrentCollector {
    fn indicator(&self) -> Indicator {
        Indicator::Brent
    }

    async fn collect(&self, mode: CollectMode) -> Result<TimeSeries> {
        let response = self.fetch_quotes().await?;
        parse_brent_response(&response, mode, today())
    }
}

/// Turns a `BRENT` response into the `brent_value` table.
///
/// # Errors
/// Returns an error if:
/// - the API answered with an error, rate-limit or information message
/// - the `data` array is missing or empty
/// - a date cannot be parsed
/// - in current mode, the latest value is not numeric
pub fn parse_brent_response(
    response: &serde_json::Value,
    mode: CollectMode,
    today: NaiveDate,
) -> Result<TimeSeries> {
    if let Some(error_message) = response.get("Error Message") {
        return Err(MarketDataError::api(
            PROVIDER,
            error_message.as_str().unwrap_or("Unknown error"),
        ));
    }

    let data = match response.get("data") {
        Some(data) => data,
        None => {
            if let Some(note) = response.get("Note") {
                return Err(MarketDataError::api(
                    PROVIDER,
                    format!("rate limit: {}", note.as_str().unwrap_or("Unknown rate limit message")),
                ));
            }
            if let Some(info) = response.get("Information") {
                return Err(MarketDataError::api(
                    PROVIDER,
                    info.as_str().unwrap_or("Unknown information message"),
                ));
            }
            return Err(MarketDataError::parse(
                "Alpha Vantage response",
                "`data` not found; check the API key or rate limits",
            ));
        }
    };

    // A note next to real data is only a warning
    if let Some(note) = response.get("Note") {
        tracing::warn!(note = note.as_str().unwrap_or(""), "Alpha Vantage API note");
    }

    let rows: Vec<CommodityRow> = serde_json::from_value(data.clone())
        .map_err(|e| MarketDataError::parse("Alpha Vantage response", e.to_string()))?;

    let column = Indicator::Brent.column();
    let mut series = match mode {
        CollectMode::Historical => {
            let observations = rows
                .iter()
                .map(|row| Ok(Observation::new(parse_date(&row.date)?, coerce_value(&row.value))))
                .collect::<Result<Vec<_>>>()?;
            TimeSeries::new(column, observations).since(two_years_before(today))
        }
        CollectMode::Current => {
            let latest = rows.first().ok_or(MarketDataError::Empty(PROVIDER))?;
            let value = latest.value.trim().parse::<f64>().map_err(|e| {
                MarketDataError::parse(
                    "Alpha Vantage response",
                    format!("latest value {:?} is not numeric: {}", latest.value, e),
                )
            })?;
            TimeSeries::new(column, vec![Observation::new(parse_date(&latest.date)?, Some(value))])
        }
    };

    if series.is_empty() {
        return Err(MarketDataError::Empty(PROVIDER));
    }

    series.sort_descending();
    Ok(series)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        MarketDataError::parse("Alpha Vantage response", format!("bad date {:?}: {}", raw, e))
    })
}

/// Non-numeric quotes (`"."` on holidays) become missing values.
fn coerce_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_response() -> serde_json::Value {
        json!({
            "name": "Crude Oil Prices: Brent - Europe",
            "interval": "daily",
            "unit": "dollars per barrel",
            "data": [
                {"date": "2025-10-14", "value": "62.39"},
                {"date": "2025-10-13", "value": "."},
                {"date": "2025-10-10", "value": "63.57"},
                {"date": "2022-01-03", "value": "78.25"}
            ]
        })
    }

    #[test]
    fn test_historical_filters_window_and_coerces() {
        let ts =
            parse_brent_response(&sample_response(), CollectMode::Historical, date("2025-10-19"))
                .unwrap();

        assert_eq!(ts.column, "brent_value");
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.observations[0], Observation::new(date("2025-10-14"), Some(62.39)));
        assert_eq!(ts.observations[1].value, None);
    }

    #[test]
    fn test_current_keeps_latest_row() {
        let ts = parse_brent_response(&sample_response(), CollectMode::Current, date("2025-10-19"))
            .unwrap();
        assert_eq!(ts.len(), 1);
        assert_eq!(ts.observations[0].value, Some(62.39));
    }

    #[test]
    fn test_current_rejects_non_numeric_latest() {
        let response = json!({"data": [{"date": "2025-10-13", "value": "."}]});
        let result = parse_brent_response(&response, CollectMode::Current, date("2025-10-19"));
        assert!(matches!(result, Err(MarketDataError::Parse { .. })));
    }

    #[test]
    fn test_api_messages_become_errors() {
        let limited = json!({"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"});
        let err = parse_brent_response(&limited, CollectMode::Current, date("2025-10-19")).unwrap_err();
        assert!(err.to_string().contains("rate limit"));

        let invalid = json!({"Error Message": "Invalid API call"});
        let err = parse_brent_response(&invalid, CollectMode::Historical, date("2025-10-19")).unwrap_err();
        assert!(matches!(err, MarketDataError::Api { .. }));
    }

    #[test]
    fn test_note_next_to_data_is_only_a_warning() {
        let mut response = sample_response();
        response["Note"] = json!("Our standard API call frequency is 25 calls per day");

        let ts = parse_brent_response(&response, CollectMode::Current, date("2025-10-19")).unwrap();
        assert_eq!(ts.observations, vec![Observation::new(date("2025-10-14"), Some(62.39))]);
    }

    #[test]
    fn test_information_without_data_is_api_error() {
        let premium = json!({"Information": "This is a premium endpoint"});
        let err = parse_brent_response(&premium, CollectMode::Historical, date("2025-10-19")).unwrap_err();
        assert!(matches!(err, MarketDataError::Api { .. }));
        assert!(err.to_string().contains("premium"));

        let no_rows = json!({"data": []});
        let err = parse_brent_response(&no_rows, CollectMode::Historical, date("2025-10-19")).unwrap_err();
        assert!(matches!(err, MarketDataError::Empty(_)));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let result = BrentCollector::new(reqwest::Client::new(), "http://localhost", "  ");
        assert!(matches!(result, Err(MarketDataError::Config(_))));
    }

    #[tokio::test]
    async fn test_collect_sends_function_and_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("function".into(), "BRENT".into()),
                mockito::Matcher::UrlEncoded("interval".into(), "daily".into()),
                mockito::Matcher::UrlEncoded("apikey".into(), "demo".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(sample_response().to_string())
            .create_async()
            .await;

        let collector = BrentCollector::new(reqwest::Client::new(), server.url(), "demo").unwrap();
        let ts = collector.collect(CollectMode::Current).await.unwrap();

        mock.assert_async().await;
        assert_eq!(ts.observations[0].date, date("2025-10-14"));
    }
}
