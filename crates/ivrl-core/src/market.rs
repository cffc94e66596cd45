//! Market data records

use serde::{Deserialize, Serialize};

/// Risk-free rate used when a record does not carry one
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.05;

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[serde(
        alias = "Call",
        alias = "CALL",
        alias = "c",
        alias = "C",
        alias = "calls",
        alias = "Calls"
    )]
    Call,
    #[serde(
        alias = "Put",
        alias = "PUT",
        alias = "p",
        alias = "P",
        alias = "puts",
        alias = "Puts"
    )]
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// One row of the options dataset.
///
/// Field names follow the column headers of the source CSV
/// (`lastPrice`, `underlyingPrice`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    /// Last traded option price
    pub last_price: f64,
    pub underlying_price: f64,
    pub strike: f64,
    /// Expiration timestamp exactly as it appears in the file
    pub expiration_date: String,
    /// Implied volatility as a fraction (0.705 == 70.5%)
    pub implied_volatility: f64,
    pub option_type: OptionType,
    #[serde(default)]
    pub risk_free_rate: Option<f64>,
    #[serde(default)]
    pub context: Option<String>,
}

impl MarketRecord {
    /// Risk-free rate, falling back to [`DEFAULT_RISK_FREE_RATE`]
    pub fn risk_free_rate_or_default(&self) -> f64 {
        self.risk_free_rate.unwrap_or(DEFAULT_RISK_FREE_RATE)
    }

    /// Implied volatility as a percentage string with one decimal ("70.5")
    pub fn expected_answer(&self) -> String {
        format!("{:.1}", self.implied_volatility * 100.0)
    }
}
