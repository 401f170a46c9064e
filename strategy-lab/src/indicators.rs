//! Indicator math over closing prices.

use trading::{Candle, IndicatorBundle};

/// Fewer candles than this produce no indicator bundle.
pub const MIN_CANDLES: usize = 50;
/// Closes and volumes carried in the bundle for prompt context.
pub const HISTORY_WINDOW: usize = 20;

/// Exponential moving average series, seeded with the first value.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Latest MACD line, signal line and histogram.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<(f64, f64, f64)> {
    if closes.len() < slow {
        return None;
    }
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);

    let m = *line.last()?;
    let s = *signal_line.last()?;
    Some((m, s, m - s))
}

/// Relative strength index over the last `period` price changes (simple averages).
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }
    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Upper, middle and lower Bollinger bands (sample standard deviation).
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Option<(f64, f64, f64)> {
    if period < 2 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
    let sd = var.sqrt();
    Some((mean + width * sd, mean, mean - width * sd))
}

/// Builds the full bundle for a symbol, or `None` with too little history.
pub fn compute(symbol: &str, candles: &[Candle]) -> Option<IndicatorBundle> {
    if candles.len() < MIN_CANDLES {
        return None;
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let last = candles.last()?;
    let tail = closes.len().saturating_sub(HISTORY_WINDOW);

    let (macd, macd_signal, macd_histogram) = match macd(&closes, 12, 26, 9) {
        Some((m, s, h)) => (Some(m), Some(s), Some(h)),
        None => (None, None, None),
    };
    let (bb_upper, bb_middle, bb_lower) = match bollinger(&closes, 20, 2.0) {
        Some((u, m, l)) => (Some(u), Some(m), Some(l)),
        None => (None, None, None),
    };

    Some(IndicatorBundle {
        symbol: symbol.to_string(),
        close_price: last.close,
        volume: last.volume,
        historical_prices: closes[tail..].to_vec(),
        historical_volumes: volumes[tail..].to_vec(),
        macd,
        macd_signal,
        macd_histogram,
        rsi: rsi(&closes, 14),
        ema_12: ema(&closes, 12).last().copied(),
        ema_26: ema(&closes, 26).last().copied(),
        ema_50: ema(&closes, 50).last().copied(),
        bb_upper,
        bb_middle,
        bb_lower,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&c| Candle::new(Utc::now(), c, c, c, c, 1.0))
            .collect()
    }

    #[test]
    fn test_ema_of_constant_is_constant() {
        let out = ema(&[5.0; 30], 12);
        assert!(out.iter().all(|v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..30).map(|i| i as f64).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));

        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        assert!(rsi(&falling, 14).unwrap() < 1e-9);

        assert_eq!(rsi(&[1.0; 10], 14), None);
    }

    #[test]
    fn test_bollinger_band_width() {
        let (upper, middle, lower) = bollinger(&[1.0, 3.0], 2, 2.0).unwrap();
        assert_eq!(middle, 2.0);
        // sample sd of [1, 3] is sqrt(2)
        assert!((upper - (2.0 + 2.0 * 2f64.sqrt())).abs() < 1e-12);
        assert!((lower - (2.0 - 2.0 * 2f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_compute_requires_history() {
        assert!(compute("A", &candles(&[1.0; 49])).is_none());

        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let bundle = compute("A", &candles(&closes)).unwrap();
        assert_eq!(bundle.close_price, 159.0);
        assert_eq!(bundle.historical_prices.len(), 20);
        assert_eq!(bundle.historical_prices.last(), Some(&159.0));
        assert!(bundle.macd_histogram.is_some());
        assert!(bundle.ema_50.unwrap() < 159.0);
    }
}
