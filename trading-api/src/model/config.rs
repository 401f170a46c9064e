use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_check_interval() -> u64 {
    60
}

fn default_risk_per_trade() -> f64 {
    0.02
}

fn default_max_positions() -> usize {
    3
}

/// Reasons a [`TradingConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("at least one symbol is required")]
    NoSymbols,
    #[error("initial capital must be positive, got {0}")]
    NonPositiveCapital(f64),
    #[error("risk per trade must be in (0, 1], got {0}")]
    RiskOutOfRange(f64),
    #[error("max positions must be at least 1")]
    NoPositionSlots,
    #[error("model identifier is empty")]
    EmptyModel,
}

/// Configuration snapshot of one trading instance.
///
/// Taken once at creation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    pub symbols: Vec<String>,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Fraction of total portfolio value committed to a newly opened position.
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: f64,
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    pub model_id: String,
    #[serde(default)]
    pub use_ai_signals: bool,
}

impl TradingConfig {
    pub fn new(symbols: Vec<String>, model_id: impl Into<String>) -> Self {
        Self {
            symbols,
            initial_capital: default_initial_capital(),
            check_interval_secs: default_check_interval(),
            risk_per_trade: default_risk_per_trade(),
            max_positions: default_max_positions(),
            model_id: model_id.into(),
            use_ai_signals: false,
        }
    }

    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_ai_signals(mut self, enabled: bool) -> Self {
        self.use_ai_signals = enabled;
        self
    }

    pub fn with_risk_per_trade(mut self, risk: f64) -> Self {
        self.risk_per_trade = risk;
        self
    }

    pub fn with_max_positions(mut self, max_positions: usize) -> Self {
        self.max_positions = max_positions;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::NoSymbols);
        }
        if !(self.initial_capital > 0.0) {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if !(self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0) {
            return Err(ConfigError::RiskOutOfRange(self.risk_per_trade));
        }
        if self.max_positions == 0 {
            return Err(ConfigError::NoPositionSlots);
        }
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        Ok(())
    }
}
