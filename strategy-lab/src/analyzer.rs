use crate::feed::MarketDataProvider;
use crate::indicators;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use trading::{IndicatorBundle, SignalSource, TradeAction, TradeType};

const OVERBOUGHT: f64 = 75.0;
const OVERSOLD: f64 = 25.0;
const TREND_RSI_CEILING: f64 = 70.0;
const TREND_RSI_FLOOR: f64 = 30.0;

/// Rule-based signal source over a market data provider.
pub struct TechnicalAnalyzer {
    provider: Arc<dyn MarketDataProvider>,
    lookback: usize,
}

impl TechnicalAnalyzer {
    pub fn new(provider: Arc<dyn MarketDataProvider>, lookback: usize) -> Self {
        Self { provider, lookback }
    }

    /// The technical rule set.
    ///
    /// Exhaustion levels take priority over trend following: an overbought
    /// RSI takes profit on longs, an oversold RSI covers shorts.
    pub fn generate_signal(indicators: &IndicatorBundle) -> (TradeAction, TradeType) {
        let (Some(hist), Some(rsi), Some(ema_50)) =
            (indicators.macd_histogram, indicators.rsi, indicators.ema_50)
        else {
            return (TradeAction::Hold, TradeType::Long);
        };
        let close = indicators.close_price;

        if rsi > OVERBOUGHT {
            (TradeAction::Sell, TradeType::Long)
        } else if rsi < OVERSOLD {
            (TradeAction::Buy, TradeType::Short)
        } else if hist > 0.0 && rsi < TREND_RSI_CEILING && close > ema_50 {
            (TradeAction::Buy, TradeType::Long)
        } else if hist < 0.0 && rsi > TREND_RSI_FLOOR && close < ema_50 {
            (TradeAction::Sell, TradeType::Short)
        } else {
            (TradeAction::Hold, TradeType::Long)
        }
    }
}

#[async_trait]
impl SignalSource for TechnicalAnalyzer {
    async fn analyze(&self, symbol: &str) -> Result<Option<IndicatorBundle>> {
        let candles = self
            .provider
            .candles(symbol, self.lookback)
            .await
            .with_context(|| format!("failed to fetch candles for {}", symbol))?;

        let bundle = indicators::compute(symbol, &candles);
        if bundle.is_none() {
            debug!(
                "TechnicalAnalyzer: {} has {} candles, need {}",
                symbol,
                candles.len(),
                indicators::MIN_CANDLES
            );
        }
        Ok(bundle)
    }

    fn signal(&self, indicators: &IndicatorBundle) -> (TradeAction, TradeType) {
        Self::generate_signal(indicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SyntheticFeed;

    fn bundle(close: f64, hist: f64, rsi: f64, ema_50: f64) -> IndicatorBundle {
        IndicatorBundle {
            macd_histogram: Some(hist),
            rsi: Some(rsi),
            ema_50: Some(ema_50),
            ..IndicatorBundle::from_price("A", close)
        }
    }

    #[test]
    fn test_signal_rules() {
        use TradeAction::*;
        use TradeType::*;

        assert_eq!(TechnicalAnalyzer::generate_signal(&bundle(100.0, 1.0, 80.0, 90.0)), (Sell, Long));
        assert_eq!(TechnicalAnalyzer::generate_signal(&bundle(100.0, -1.0, 20.0, 90.0)), (Buy, Short));
        assert_eq!(TechnicalAnalyzer::generate_signal(&bundle(100.0, 1.0, 55.0, 90.0)), (Buy, Long));
        assert_eq!(TechnicalAnalyzer::generate_signal(&bundle(80.0, -1.0, 45.0, 90.0)), (Sell, Short));
        // Momentum against trend
        assert_eq!(TechnicalAnalyzer::generate_signal(&bundle(80.0, 1.0, 55.0, 90.0)), (Hold, Long));
        // Missing indicators
        assert_eq!(
            TechnicalAnalyzer::generate_signal(&IndicatorBundle::from_price("A", 1.0)),
            (Hold, Long)
        );
    }

    #[tokio::test]
    async fn test_analyze_over_feed() {
        let short_history = TechnicalAnalyzer::new(Arc::new(SyntheticFeed::new(30, 0.01)), 100);
        assert!(short_history.analyze("ETH-USD").await.unwrap().is_none());

        let analyzer = TechnicalAnalyzer::new(Arc::new(SyntheticFeed::new(120, 0.01)), 100);
        let bundle = analyzer.analyze("ETH-USD").await.unwrap().unwrap();
        assert_eq!(bundle.symbol, "ETH-USD");
        assert!(bundle.rsi.is_some());
    }
}
