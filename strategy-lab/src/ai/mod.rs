pub mod client;
pub mod compat;

use anyhow::Result;
use async_trait::async_trait;
use client::{ChatMessage, LlmClient};
use log::{error, info, warn};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;
use trading::{
    AiSignal, AiSignalSource, ExitPlan, IndicatorBundle, PortfolioContext, TradeAction, TradeType,
};

const SYSTEM_PROMPT: &str = "You are an expert cryptocurrency trading analyst. \
    Only act on high-confidence setups and always answer with a single JSON object.";

const DEFAULT_CONFIDENCE: f64 = 75.0;

#[derive(Deserialize)]
struct RawSignal {
    action: String,
    #[serde(rename = "type", default)]
    trade_type: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    exit_plan: Option<ExitPlan>,
}

/// Asks a language model for a trading decision on one symbol.
pub struct AiSignalGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl AiSignalGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn fmt_opt(value: Option<f64>, precision: usize) -> String {
        value
            .map(|v| format!("{:.*}", precision, v))
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn build_prompt(indicators: &IndicatorBundle, portfolio: &PortfolioContext) -> String {
        let mut p = String::new();
        let _ = writeln!(p, "Provide a trading decision for {}.", indicators.symbol);
        let _ = writeln!(p);
        let _ = writeln!(p, "Market data:");
        let _ = writeln!(p, "- Current price: {:.2}", indicators.close_price);
        let _ = writeln!(p, "- Volume: {:.0}", indicators.volume);

        if !indicators.historical_prices.is_empty() {
            let _ = writeln!(p, "Historical closes (oldest to newest):");
            let n = indicators.historical_prices.len();
            for (i, price) in indicators.historical_prices.iter().enumerate() {
                let bars_ago = n - i - 1;
                if bars_ago == 0 {
                    let _ = writeln!(p, "- current: {:.2}", price);
                } else {
                    let _ = writeln!(p, "- {} bars ago: {:.2}", bars_ago, price);
                }
            }
        }

        let _ = writeln!(p, "Indicators:");
        let _ = writeln!(p, "- MACD: {}", Self::fmt_opt(indicators.macd, 4));
        let _ = writeln!(p, "- MACD signal: {}", Self::fmt_opt(indicators.macd_signal, 4));
        let _ = writeln!(p, "- MACD histogram: {}", Self::fmt_opt(indicators.macd_histogram, 4));
        let _ = writeln!(p, "- RSI(14): {}", Self::fmt_opt(indicators.rsi, 2));
        let _ = writeln!(p, "- EMA 12/26/50: {} / {} / {}",
            Self::fmt_opt(indicators.ema_12, 2),
            Self::fmt_opt(indicators.ema_26, 2),
            Self::fmt_opt(indicators.ema_50, 2));
        let _ = writeln!(p, "- Bollinger upper/middle/lower: {} / {} / {}",
            Self::fmt_opt(indicators.bb_upper, 2),
            Self::fmt_opt(indicators.bb_middle, 2),
            Self::fmt_opt(indicators.bb_lower, 2));

        let _ = writeln!(p, "Portfolio:");
        let _ = writeln!(p, "- Total value: {:.2}", portfolio.total_value);
        let _ = writeln!(p, "- Available cash: {:.2}", portfolio.cash);
        if let Some(pos) = portfolio.position(&indicators.symbol) {
            let _ = writeln!(
                p,
                "- Current position: {} {:.4} @ {:.2} (unrealized P&L {:.2})",
                pos.trade_type.as_str().to_uppercase(),
                pos.quantity,
                pos.entry_price,
                pos.unrealized_pnl(indicators.close_price)
            );
        }

        let _ = writeln!(p);
        p.push_str(
            "Respond in JSON with keys: action (BUY|SELL|HOLD), type (LONG|SHORT), \
             confidence (0-100), reasoning, exit_plan {profit_target_pct, stop_loss_pct, \
             invalidation_condition}.",
        );
        p
    }

    /// Extracts the JSON body from a reply that may be wrapped in code fences.
    fn strip_fences(content: &str) -> &str {
        let content = content.trim();
        let body = if let Some((_, rest)) = content.split_once("```json") {
            rest
        } else if let Some((_, rest)) = content.split_once("```") {
            rest
        } else {
            return content;
        };
        body.split("```").next().unwrap_or(body).trim()
    }

    /// # Returns
    ///
    /// * `None` if the reply is not a well-formed decision.
    pub fn parse_signal(content: &str) -> Option<AiSignal> {
        let raw: RawSignal = match serde_json::from_str(Self::strip_fences(content)) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to parse AI response as JSON: {}", e);
                return None;
            }
        };

        let action: TradeAction = match raw.action.parse() {
            Ok(a) => a,
            Err(e) => {
                warn!("AI response rejected: {}", e);
                return None;
            }
        };
        let trade_type: TradeType = match raw.trade_type.as_deref().unwrap_or("long").parse() {
            Ok(t) => t,
            Err(e) => {
                warn!("AI response rejected: {}", e);
                return None;
            }
        };

        Some(AiSignal {
            action,
            trade_type,
            reasoning: raw.reasoning,
            confidence: raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 100.0),
            exit_plan: raw.exit_plan,
        })
    }
}

#[async_trait]
impl AiSignalSource for AiSignalGenerator {
    async fn ai_signal(
        &self,
        indicators: &IndicatorBundle,
        portfolio: &PortfolioContext,
    ) -> Result<Option<AiSignal>> {
        let messages = vec![
            ChatMessage::new("developer", SYSTEM_PROMPT),
            ChatMessage::user(Self::build_prompt(indicators, portfolio)),
        ];
        let reply = self.client.complete(&self.model, messages).await?;

        let signal = Self::parse_signal(&reply);
        if let Some(s) = &signal {
            info!(
                "AI signal for {}: {} {} (confidence: {:.0}%)",
                indicators.symbol, s.action, s.trade_type, s.confidence
            );
        }
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedClient {
        reply: String,
        seen: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String> {
            self.seen.lock().unwrap().push((model.to_string(), messages));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"action\":\"BUY\",\"type\":\"LONG\",\"confidence\":82,\
            \"reasoning\":\"trend\",\"exit_plan\":{\"profit_target_pct\":2.5,\"stop_loss_pct\":1.5}}\n```";
        let signal = AiSignalGenerator::parse_signal(reply).unwrap();

        assert_eq!(signal.action, TradeAction::Buy);
        assert_eq!(signal.trade_type, TradeType::Long);
        assert_eq!(signal.confidence, 82.0);
        let plan = signal.exit_plan.unwrap();
        assert_eq!(plan.profit_target_pct, Some(2.5));
        assert_eq!(plan.invalidation_condition, None);
    }

    #[test]
    fn test_parse_defaults_and_rejections() {
        let signal = AiSignalGenerator::parse_signal(r#"{"action":"hold","reasoning":"flat"}"#).unwrap();
        assert_eq!(signal.trade_type, TradeType::Long);
        assert_eq!(signal.confidence, DEFAULT_CONFIDENCE);

        assert!(AiSignalGenerator::parse_signal("not json").is_none());
        assert!(AiSignalGenerator::parse_signal(r#"{"action":"moon"}"#).is_none());
    }

    #[tokio::test]
    async fn test_ai_signal_uses_configured_model() {
        let client = Arc::new(CannedClient {
            reply: r#"{"action":"sell","type":"short","confidence":70,"reasoning":"weak"}"#.into(),
            seen: Mutex::new(Vec::new()),
        });
        let generator = AiSignalGenerator::new(client.clone(), "m1");

        let bundle = IndicatorBundle::from_price("BTC-USD", 100.0);
        let signal = generator
            .ai_signal(&bundle, &PortfolioContext::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.action, TradeAction::Sell);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].0, "m1");
        assert!(seen[0].1[1].content.contains("BTC-USD"));
    }
}
