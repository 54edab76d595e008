//! ECB euro reference rate scrapers.
//!
//! Two fixed-shape sources on the ECB site:
//! - the daily reference rate page (HTML), for the current EUR/USD spot
//! - the USD history feed (SDMX XML), for the two-year history

use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Selector};

use super::ingestion::{CollectMode, Collector};
use super::series::{today, two_years_before, Observation, TimeSeries};
use super::Indicator;
use crate::error::{MarketDataError, Result};

const DAILY_PATH: &str =
    "/stats/policy_and_exchange_rates/euro_reference_exchange_rates/html/index.en.html";
const HISTORY_PATH: &str =
    "/stats/policy_and_exchange_rates/euro_reference_exchange_rates/html/usd.xml";

/// Collects the EUR/USD reference rate from the ECB website.
pub struct EcbCollector {
    client: reqwest::Client,
    base_url: String,
}

impl EcbCollector {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        tracing::debug!(%url, "fetching ECB page");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Collector for EcbCollector {
    fn indicator(&self) -> Indicator {
        Indicator::Currency
    }

    async fn collect(&self, mode: CollectMode) -> Result<TimeSeries> {
        let mut series = match mode {
            CollectMode::Current => {
                let html = self.fetch_text(DAILY_PATH).await?;
                TimeSeries::new(self.indicator().column(), vec![parse_daily_page(&html)?])
            }
            CollectMode::Historical => {
                let xml = self.fetch_text(HISTORY_PATH).await?;
                let start = two_years_before(today());
                TimeSeries::new(self.indicator().column(), parse_history_feed(&xml)?).since(start)
            }
        };

        if series.is_empty() {
            return Err(MarketDataError::Empty("ECB"));
        }

        series.sort_descending();
        Ok(series)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| MarketDataError::parse("CSS selector", e.to_string()))
}

/// Extracts the publication date and USD spot rate from the daily page.
///
/// HTML structure:
/// `<div class="content-box"><h3>17 October 2025</h3>` and a
/// `table.forextable` row `<td id="USD">..</td><td>..</td><td><span class="rate">1.1650</span></td>`.
pub fn parse_daily_page(html: &str) -> Result<Observation> {
    let document = Html::parse_document(html);

    let date_text = document
        .select(&selector("div.content-box h3")?)
        .next()
        .map(|h3| h3.text().collect::<String>())
        .ok_or_else(|| MarketDataError::parse("ECB daily page", "publication date not found"))?;
    let date = NaiveDate::parse_from_str(date_text.trim(), "%d %B %Y").map_err(|e| {
        MarketDataError::parse("ECB daily page", format!("bad date {:?}: {}", date_text.trim(), e))
    })?;

    let usd_cell = selector("td#USD")?;
    let rate = selector("td:nth-child(3) span.rate")?;

    let spot = document
        .select(&selector("table.forextable tbody tr")?)
        .find(|row| row.select(&usd_cell).next().is_some())
        .and_then(|row| row.select(&rate).next())
        .map(|span| span.text().collect::<String>())
        .ok_or_else(|| MarketDataError::parse("ECB daily page", "USD rate not found"))?;

    let value = spot
        .trim()
        .parse::<f64>()
        .map_err(|e| MarketDataError::parse("ECB daily page", format!("bad rate {:?}: {}", spot.trim(), e)))?;

    Ok(Observation::new(date, Some(value)))
}

/// Reads every `Obs` element of the USD history feed.
///
/// Observations keep feed order; non-numeric values become `None`.
pub fn parse_history_feed(xml: &str) -> Result<Vec<Observation>> {
    let mut reader = Reader::from_str(xml);
    let mut observations = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| MarketDataError::parse("ECB history feed", e.to_string()))?;

        match event {
            Event::Start(element) | Event::Empty(element) => {
                let mut period = None;
                let mut value = None;
                let mut attrs = Vec::new();

                for attr in element.attributes() {
                    let attr =
                        attr.map_err(|e| MarketDataError::parse("ECB history feed", e.to_string()))?;
                    let text = attr
                        .unescape_value()
                        .map_err(|e| MarketDataError::parse("ECB history feed", e.to_string()))?
                        .into_owned();
                    match attr.key.local_name().as_ref() {
                        b"TIME_PERIOD" => period = Some(text),
                        b"OBS_VALUE" => value = Some(text),
                        key => attrs.push(format!("{}={}", String::from_utf8_lossy(key), text)),
                    }
                }

                match element.local_name().as_ref() {
                    b"Group" => tracing::debug!(attributes = ?attrs, "ECB series group"),
                    b"Obs" => {
                        let Some(period) = period else { continue };
                        let date = NaiveDate::parse_from_str(&period, "%Y-%m-%d").map_err(|e| {
                            MarketDataError::parse("ECB history feed", format!("bad date {:?}: {}", period, e))
                        })?;
                        let value = value
                            .and_then(|v| v.trim().parse::<f64>().ok())
                            .filter(|v| v.is_finite());
                        observations.push(Observation::new(date, value));
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY_HTML: &str = r#"
<html><body>
  <div class="content-box">
    <h3>17 October 2025</h3>
    <table class="forextable">
      <thead><tr><th>Currency</th><th>Spot</th></tr></thead>
      <tbody>
        <tr>
          <td id="JPY" class="currency"><a>JPY</a></td>
          <td class="alignLeft"><a>Japanese yen</a></td>
          <td class="spot"><a><span class="rate">175.22</span></a></td>
        </tr>
        <tr>
          <td id="USD" class="currency"><a>USD</a></td>
          <td class="alignLeft"><a>US dollar</a></td>
          <td class="spot"><a><span class="rate"> 1.1681 </span></a></td>
        </tr>
      </tbody>
    </table>
  </div>
</body></html>"#;

    const HISTORY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<message:GenericData xmlns:message="http://www.SDMX.org/resources/SDMXML/schemas/v2_0/message">
  <message:DataSet>
    <exr:Group xmlns:exr="http://www.ecb.europa.eu/vocabulary/stats/exr/1" CURRENCY="USD" CURRENCY_DENOM="EUR" UNIT="USD">
      <exr:Series FREQ="D" CURRENCY="USD">
        <exr:Obs TIME_PERIOD="1999-01-04" OBS_VALUE="1.1789" OBS_STATUS="A"/>
        <exr:Obs TIME_PERIOD="2025-10-16" OBS_VALUE="1.1681" OBS_STATUS="A"/>
        <exr:Obs TIME_PERIOD="2025-10-17" OBS_VALUE="NaN" OBS_STATUS="A"/>
      </exr:Series>
    </exr:Group>
  </message:DataSet>
</message:GenericData>"#;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_daily_page_picks_usd_row() {
        let obs = parse_daily_page(DAILY_HTML).unwrap();
        assert_eq!(obs.date, date("2025-10-17"));
        assert_eq!(obs.value, Some(1.1681));
    }

    #[test]
    fn test_parse_daily_page_without_usd_row_fails() {
        let html = DAILY_HTML.replace("id=\"USD\"", "id=\"GBP\"");
        let err = parse_daily_page(&html).unwrap_err();
        assert!(err.to_string().contains("USD rate not found"));
    }

    #[test]
    fn test_parse_daily_page_with_bad_date_fails() {
        let html = DAILY_HTML.replace("17 October 2025", "yesterday");
        assert!(matches!(
            parse_daily_page(&html),
            Err(MarketDataError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_history_feed_reads_all_observations() {
        let obs = parse_history_feed(HISTORY_XML).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0], Observation::new(date("1999-01-04"), Some(1.1789)));
        assert_eq!(obs[1].value, Some(1.1681));
        assert_eq!(obs[2].value, None);
    }

    #[test]
    fn test_history_window_drops_old_rows() {
        let ts = TimeSeries::new("usd_value", parse_history_feed(HISTORY_XML).unwrap())
            .since(two_years_before(date("2025-10-19")));
        assert_eq!(ts.len(), 2);
        assert!(ts.observations.iter().all(|o| o.date.format("%Y").to_string() == "2025"));
    }

    #[tokio::test]
    async fn test_collect_current_from_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", DAILY_PATH)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(DAILY_HTML)
            .create_async()
            .await;

        let collector = EcbCollector::new(reqwest::Client::new(), server.url());
        let series = collector.collect(CollectMode::Current).await.unwrap();

        mock.assert_async().await;
        assert_eq!(series.column, "usd_value");
        assert_eq!(series.len(), 1);
        assert_eq!(series.observations[0].value, Some(1.1681));
    }

    #[tokio::test]
    async fn test_collect_history_keeps_two_years_newest_first() {
        let today = today();
        let old = today - chrono::Duration::days(3 * 365);
        let month_ago = today - chrono::Duration::days(30);
        let two_days_ago = today - chrono::Duration::days(2);
        let xml = HISTORY_XML
            .replace("1999-01-04", &old.to_string())
            .replace("2025-10-16", &month_ago.to_string())
            .replace("2025-10-17", &two_days_ago.to_string())
            .replace("\"NaN\"", "\"1.1702\"");

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", HISTORY_PATH)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(xml)
            .create_async()
            .await;

        let collector = EcbCollector::new(reqwest::Client::new(), server.url());
        let series = collector.collect(CollectMode::Historical).await.unwrap();

        mock.assert_async().await;
        assert_eq!(series.column, "usd_value");
        assert_eq!(
            series.observations,
            vec![
                Observation::new(two_days_ago, Some(1.1702)),
                Observation::new(month_ago, Some(1.1681)),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", HISTORY_PATH)
            .with_status(503)
            .create_async()
            .await;

        let collector = EcbCollector::new(reqwest::Client::new(), server.url());
        let err = collector.collect(CollectMode::Historical).await.unwrap_err();
        assert!(matches!(err, MarketDataError::Http(_)));
    }
}
