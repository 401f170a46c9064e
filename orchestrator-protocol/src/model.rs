use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trading::TradingConfig;

use crate::ProtocolError;

/// Display format used for chart rows and notification times.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A request to start trading in a session, one instance per model.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TradingRequest {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub initial_capital: Option<f64>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub use_ai_signals: Option<bool>,
}

impl TradingRequest {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            ..Default::default()
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_capital = Some(capital);
        self
    }

    pub fn with_ai_signals(mut self, enabled: bool) -> Self {
        self.use_ai_signals = Some(enabled);
        self
    }

    /// Expands the request into one validated config per model.
    ///
    /// # Arguments
    ///
    /// * `default_model` - Used when the request names no model.
    /// * `default_capital` - Used when the request names no capital.
    ///
    /// # Returns
    ///
    /// * `Err(ProtocolError)` if any resulting config is invalid; no partial
    ///   result is returned.
    pub fn into_configs(
        self,
        default_model: &str,
        default_capital: f64,
    ) -> Result<Vec<TradingConfig>, ProtocolError> {
        let symbols: Vec<String> = self
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let models = if self.models.is_empty() {
            vec![default_model.to_string()]
        } else {
            self.models
        };

        let mut configs = Vec::with_capacity(models.len());
        for model in models {
            let config = TradingConfig::new(symbols.clone(), model.trim())
                .with_capital(self.initial_capital.unwrap_or(default_capital))
                .with_ai_signals(self.use_ai_signals.unwrap_or(false));
            config.validate()?;
            configs.push(config);
        }
        Ok(configs)
    }
}

/// A user-facing card produced by an instance during a cycle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationRecord {
    pub title: String,
    pub body: String,
    /// Tags the front end filters on, usually the model identifier.
    pub filters: Vec<String>,
    #[serde(default)]
    pub table_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(title: impl Into<String>, body: impl Into<String>, filters: Vec<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            filters,
            table_title: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_table_title(mut self, table_title: impl Into<String>) -> Self {
        self.table_title = Some(table_title.into());
        self
    }
}

/// One aligned row of a multi-series chart.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChartRow {
    pub timestamp: DateTime<Utc>,
    /// One value per series, in header order.
    pub values: Vec<f64>,
}

/// Time-aligned portfolio values of every instance in a session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChartPayload {
    pub title: String,
    pub series: Vec<String>,
    pub rows: Vec<ChartRow>,
}

impl ChartPayload {
    /// The tabular form charting front ends consume:
    /// a `["Time", series...]` header followed by `[time, values...]` rows.
    pub fn to_table(&self) -> Vec<Value> {
        let mut table = Vec::with_capacity(self.rows.len() + 1);

        let mut header = vec![Value::from("Time")];
        header.extend(self.series.iter().map(|s| Value::from(s.as_str())));
        table.push(Value::Array(header));

        for row in &self.rows {
            let mut cells = vec![Value::from(row.timestamp.format(TIME_FORMAT).to_string())];
            cells.extend(row.values.iter().map(|v| Value::from(*v)));
            table.push(Value::Array(cells));
        }
        table
    }
}

/// Read-only summary of one instance, as reported by the status command.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub model_id: String,
    pub symbols: Vec<String>,
    pub active: bool,
    pub portfolio_value: f64,
    pub total_pnl: f64,
    pub open_positions: usize,
    pub total_trades: usize,
    pub check_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_check: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_request_defaults_to_one_instance() {
        let configs = TradingRequest::new(vec![" btc-usd ".into()])
            .into_configs("default/model", 50_000.0)
            .unwrap();

        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].model_id, "default/model");
        assert_eq!(configs[0].symbols, vec!["BTC-USD".to_string()]);
        assert_eq!(configs[0].initial_capital, 50_000.0);
        assert!(!configs[0].use_ai_signals);
    }

    #[test]
    fn test_request_without_symbols_is_rejected() {
        let err = TradingRequest::new(vec!["  ".into()])
            .with_models(vec!["m1".into(), "m2".into()])
            .into_configs("default/model", 50_000.0)
            .unwrap_err();

        assert!(matches!(err, ProtocolError::Config(_)));
    }

    #[test]
    fn test_chart_table_layout() {
        let t = Utc.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();
        let chart = ChartPayload {
            title: "Portfolio".into(),
            series: vec!["m1".into(), "m2".into()],
            rows: vec![ChartRow {
                timestamp: t,
                values: vec![100.0, 50.0],
            }],
        };

        let table = chart.to_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0], serde_json::json!(["Time", "m1", "m2"]));
        assert_eq!(
            table[1],
            serde_json::json!(["2025-10-21 10:00:00", 100.0, 50.0])
        );
    }
}
