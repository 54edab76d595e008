mod config;
mod data;
mod error;
mod store;
mod viz;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::AppConfig;
use data::series::today;
use data::{run_orchestrator, CollectMode, CollectedTable};
use store::MarketStore;
use viz::MarketView;

#[derive(Parser)]
#[command(name = "oil-market-watch")]
#[command(about = "Brent crude, EUR/USD and VIX collector with comparison charts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Table store path, overrides MARKET_STORE_PATH
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every indicator and save it to the store
    Collect {
        /// Fetch two years of history instead of the latest quote
        #[arg(long)]
        hist: bool,
    },

    /// Print the first rows of every stored table
    Show {
        #[arg(long, default_value_t = 15)]
        rows: usize,
    },

    /// Render comparison charts from the stored tables
    Visualize {
        #[arg(long, value_enum, default_value_t = ChartKind::All)]
        chart: ChartKind,

        /// Plot the full two-year trend instead of the current year
        #[arg(long)]
        full: bool,

        /// Output directory, overrides CHART_OUTPUT_DIR
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ChartKind {
    All,
    Trend,
    Correlation,
    Volatility,
    Recent,
}

/// Logs row counts and timing for each collected table.
fn log_summary(tables: &[CollectedTable], mode: CollectMode) {
    let total: f64 = tables.iter().map(|t| t.elapsed.as_secs_f64()).sum();
    for table in tables {
        let latest = table
            .series
            .latest()
            .map(|o| o.date.to_string())
            .unwrap_or_else(|| "-".into());
        tracing::info!(table = %table.name, rows = table.series.len(), latest = %latest, "table summary");
    }
    tracing::info!(
        %mode,
        tables = tables.len(),
        elapsed = format!("{:.2}s", total),
        "collection finished"
    );
}

/// Prints the first `rows` rows of every stored table.
///
/// # Errors
/// Returns an error if the store is missing or unreadable
fn show_tables(store: &MarketStore, rows: usize) -> anyhow::Result<()> {
    for name in store.keys()? {
        let Some(table) = store.load(&name)? else { continue };
        println!("\n{}:", name);
        println!("{:<12} {}", "date", table.column);
        for obs in table.head(rows) {
            match obs.value {
                Some(v) => println!("{:<12} {:.4}", obs.date, v),
                None => println!("{:<12} NaN", obs.date),
            }
        }
    }
    Ok(())
}

/// Renders the requested charts into `out_dir`.
///
/// # Errors
/// Returns an error if the store cannot be loaded or any chart fails to render
fn render_charts(store: &MarketStore, chart: ChartKind, ytd: bool, out_dir: &Path) -> anyhow::Result<()> {
    let view = MarketView::load(store)?;
    let today = today();
    tracing::info!(
        rows = view.combined().len(),
        columns = view.combined().columns().len(),
        ?chart,
        "rendering charts"
    );

    let written = match chart {
        ChartKind::Trend => vec![view.long_term_trend(ytd, today, out_dir)?],
        ChartKind::Correlation => vec![view.correlation_heatmap(out_dir)?],
        ChartKind::Volatility => vec![view.volatility_heatmap(out_dir)?],
        ChartKind::Recent => vec![view.recent_volatility(out_dir)?],
        ChartKind::All => vec![
            view.long_term_trend(ytd, today, out_dir)?,
            view.correlation_heatmap(out_dir)?,
            view.volatility_heatmap(out_dir)?,
            view.recent_volatility(out_dir)?,
        ],
    };

    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("oil_market_watch={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::from_env();
    if let Some(path) = cli.store {
        config.store_path = path;
    }
    let store = MarketStore::new(&config.store_path);
    tracing::debug!(store = %store.path().display(), "configuration loaded");

    match cli.command {
        Commands::Collect { hist } => {
            let mode = CollectMode::from_hist_flag(hist);
            tracing::info!(%mode, "collection started");
            let tables = run_orchestrator(&config, &store, mode).await?;
            log_summary(&tables, mode);
        }
        Commands::Show { rows } => show_tables(&store, rows)?,
        Commands::Visualize { chart, full, out } => {
            let out_dir = out.unwrap_or_else(|| config.chart_dir.clone());
            render_charts(&store, chart, !full, &out_dir)?;
        }
    }

    Ok(())
}
