use async_trait::async_trait;
use std::time::{Duration, Instant};

use super::alpha_vantage::BrentCollector;
use super::ecb::EcbCollector;
use super::series::TimeSeries;
use super::yahoo::YahooCollector;
use super::Indicator;
use crate::config::AppConfig;
use crate::error::Result;
use crate::store::{MarketStore, SaveOutcome};

/// Whether to fetch the latest quote or the two-year history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectMode {
    Current,
    Historical,
}

impl CollectMode {
    pub fn from_hist_flag(hist: bool) -> Self {
        if hist {
            Self::Historical
        } else {
            Self::Current
        }
    }
}

impl std::fmt::Display for CollectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Historical => write!(f, "historical"),
        }
    }
}

/// A source of one indicator's table.
///
/// Implementations return rows newest first under the indicator's column
/// name, or an error if the source yields nothing usable.
#[async_trait]
pub trait Collector: Send + Sync {
    fn indicator(&self) -> Indicator;

    fn table_name(&self) -> &'static str {
        self.indicator().table_name()
    }

    async fn collect(&self, mode: CollectMode) -> Result<TimeSeries>;
}

/// Output of one collection step.
#[derive(Debug, Clone)]
pub struct CollectedTable {
    pub name: String,
    pub series: TimeSeries,
    pub elapsed: Duration,
}

/// Builds the four collectors in run order: ECB, Alpha Vantage, BZ futures, VIX.
///
/// # Errors
/// Returns a configuration error if the Alpha Vantage key is missing or the
/// HTTP client cannot be built
pub fn build_collectors(config: &AppConfig) -> Result<Vec<Box<dyn Collector>>> {
    let client = config.http_client()?;
    let api_key = config.require_api_key()?;

    Ok(vec![
        Box::new(EcbCollector::new(client.clone(), config.ecb_base_url.clone())),
        Box::new(BrentCollector::new(
            client.clone(),
            config.alpha_vantage_base_url.clone(),
            api_key,
        )?),
        Box::new(YahooCollector::bz_futures(
            client.clone(),
            config.yahoo_base_url.clone(),
        )),
        Box::new(YahooCollector::vix(client, config.yahoo_base_url.clone())),
    ])
}

/// Runs every collector in order, timing each step.
///
/// The first failing collector aborts the run.
pub async fn collect_all(
    collectors: &[Box<dyn Collector>],
    mode: CollectMode,
) -> Result<Vec<CollectedTable>> {
    let mut tables = Vec::with_capacity(collectors.len());

    for collector in collectors {
        let started = Instant::now();
        let series = collector.collect(mode).await?;
        let elapsed = started.elapsed();

        tracing::info!(
            table = collector.table_name(),
            %mode,
            rows = series.len(),
            elapsed = format!("{:.2}s", elapsed.as_secs_f64()),
            "collected"
        );

        tables.push(CollectedTable {
            name: collector.table_name().to_string(),
            series,
            elapsed,
        });
    }

    Ok(tables)
}

/// Collects all indicators and writes each table to the store.
pub async fn run_orchestrator(
    config: &AppConfig,
    store: &MarketStore,
    mode: CollectMode,
) -> Result<Vec<CollectedTable>> {
    let collectors = build_collectors(config)?;
    let tables = collect_all(&collectors, mode).await?;
    save_all(store, &tables, mode)?;
    Ok(tables)
}

/// Saves each collected table, returning the outcome per table.
pub fn save_all(
    store: &MarketStore,
    tables: &[CollectedTable],
    mode: CollectMode,
) -> Result<Vec<SaveOutcome>> {
    tables
        .iter()
        .map(|table| store.save(&table.name, &table.series, mode))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::Observation;
    use crate::error::MarketDataError;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedCollector {
        indicator: Indicator,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Collector for FixedCollector {
        fn indicator(&self) -> Indicator {
            self.indicator
        }

        async fn collect(&self, _mode: CollectMode) -> Result<TimeSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MarketDataError::Empty("fixture"));
            }
            let date = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
            Ok(TimeSeries::new(
                self.indicator.column(),
                vec![Observation::new(date, Some(1.0))],
            ))
        }
    }

    fn fixed(indicator: Indicator, calls: &Arc<AtomicUsize>, fail: bool) -> Box<dyn Collector> {
        Box::new(FixedCollector {
            indicator,
            calls: Arc::clone(calls),
            fail,
        })
    }

    #[tokio::test]
    async fn test_collect_all_keeps_collector_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let collectors = vec![
            fixed(Indicator::Currency, &calls, false),
            fixed(Indicator::Brent, &calls, false),
            fixed(Indicator::BzFutures, &calls, false),
            fixed(Indicator::Vix, &calls, false),
        ];

        let tables = collect_all(&collectors, CollectMode::Current).await.unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(names, vec!["currency", "brent", "BZ_oil", "vix"]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(tables[3].series.column, "close_^VIX");
    }

    #[tokio::test]
    async fn test_collect_all_stops_at_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let collectors = vec![
            fixed(Indicator::Currency, &calls, false),
            fixed(Indicator::Brent, &calls, true),
            fixed(Indicator::BzFutures, &calls, false),
        ];

        let result = collect_all(&collectors, CollectMode::Historical).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_build_collectors_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(
            build_collectors(&config),
            Err(MarketDataError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_run_orchestrator_against_mock_sources() {
        let mut server = mockito::Server::new_async().await;
        let ecb_html = r#"<div class="content-box"><h3>17 October 2025</h3>
            <table class="forextable"><tbody><tr>
              <td id="USD">USD</td><td>US dollar</td><td><span class="rate">1.1681</span></td>
            </tr></tbody></table></div>"#;
        let brent_json = r#"{"data": [{"date": "2025-10-14", "value": "62.39"}]}"#;
        let chart_json = r#"{"chart": {"result": [{
            "meta": {"gmtoffset": 0},
            "timestamp": [1760707800],
            "indicators": {"quote": [{"close": [61.29]}]}
        }], "error": null}}"#;

        server
            .mock("GET", mockito::Matcher::Regex(r"^/stats/.*index\.en\.html$".into()))
            .with_body(ecb_html)
            .create_async()
            .await;
        server
            .mock("GET", "/query")
            .match_query(mockito::Matcher::Any)
            .with_body(brent_json)
            .create_async()
            .await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/v8/finance/chart/".into()))
            .match_query(mockito::Matcher::Any)
            .with_body(chart_json)
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            alpha_vantage_api_key: Some("demo".into()),
            store_path: dir.path().join("market.json"),
            ecb_base_url: server.url(),
            alpha_vantage_base_url: server.url(),
            yahoo_base_url: server.url(),
            ..AppConfig::default()
        };
        let store = MarketStore::new(&config.store_path);

        // Daily collection before initialization writes nothing
        let tables = run_orchestrator(&config, &store, CollectMode::Current)
            .await
            .unwrap();
        assert_eq!(tables.len(), 4);
        assert!(!store.exists());

        // A historical run creates every table
        let outcomes = save_all(&store, &tables, CollectMode::Historical).unwrap();
        assert!(outcomes.iter().all(|o| *o == SaveOutcome::Created));
        assert_eq!(store.keys().unwrap(), vec!["BZ_oil", "brent", "currency", "vix"]);
    }
}
