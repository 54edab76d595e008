use plotters::style::{RGBColor, BLUE, GREEN, MAGENTA, RED};

/// The four tracked market indicators, in store-key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Indicator {
    /// Brent crude front-month futures close (Yahoo `BZ=F`)
    BzFutures,
    /// Brent crude spot price (Alpha Vantage)
    Brent,
    /// EUR/USD reference rate (ECB)
    Currency,
    /// CBOE volatility index (Yahoo `^VIX`)
    Vix,
}

impl Indicator {
    pub const ALL: [Indicator; 4] = [
        Indicator::BzFutures,
        Indicator::Brent,
        Indicator::Currency,
        Indicator::Vix,
    ];

    /// Key of the table in the store.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::BzFutures => "BZ_oil",
            Self::Brent => "brent",
            Self::Currency => "currency",
            Self::Vix => "vix",
        }
    }

    /// Name of the value column inside the table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::BzFutures => "close_BZ=F",
            Self::Brent => "brent_value",
            Self::Currency => "usd_value",
            Self::Vix => "close_^VIX",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BzFutures => "BZ Futures",
            Self::Brent => "Brent Crude",
            Self::Currency => "EUR/USD",
            Self::Vix => "VIX Index",
        }
    }

    pub fn color(&self) -> RGBColor {
        match self {
            Self::BzFutures => BLUE,
            Self::Brent => MAGENTA,
            Self::Currency => GREEN,
            Self::Vix => RED,
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.table_name() == name)
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.column() == column)
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
