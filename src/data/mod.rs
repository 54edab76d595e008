pub mod alpha_vantage;
pub mod ecb;
pub mod indicator;
pub mod ingestion;
pub mod processing;
pub mod series;
pub mod yahoo;

pub use indicator::Indicator;
pub use ingestion::{run_orchestrator, CollectMode, CollectedTable};
pub use processing::{CorrelationMatrix, MarketFrame};
pub use series::TimeSeries;
