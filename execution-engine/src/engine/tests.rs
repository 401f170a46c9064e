use super::*;
use chrono::TimeZone;

fn create_test_executor() -> PaperExecutor {
    let _ = env_logger::builder().is_test(true).try_init();
    // 10bps fee, 10% of value per trade, two slots
    let config = TradingConfig::new(vec!["A".into(), "B".into(), "C".into()], "m1")
        .with_capital(10_000.0)
        .with_risk_per_trade(0.1)
        .with_max_positions(2);
    PaperExecutor::with_fee_rate(&config, 0.001)
}

fn market(symbol: &str, price: f64) -> IndicatorBundle {
    IndicatorBundle::from_price(symbol, price)
}

#[test]
fn test_open_and_close_long() {
    let mut ex = create_test_executor();

    let open = ex
        .execute_trade("A", TradeAction::Buy, TradeType::Long, &market("A", 100.0))
        .expect("long should open");
    assert!((open.notional - 1_000.0).abs() < 1e-6);
    assert!((open.quantity - 10.0).abs() < 1e-6);
    assert!((open.fee - 1.0).abs() < 1e-6);
    assert!((ex.current_capital() - 8_999.0).abs() < 1e-6);
    assert_eq!(ex.positions().len(), 1);

    ex.mark_price("A", 110.0);
    assert!((ex.portfolio_value() - (8_999.0 + 1_100.0)).abs() < 1e-6);

    let close = ex
        .execute_trade("A", TradeAction::Sell, TradeType::Long, &market("A", 110.0))
        .expect("long should close");
    // 100 gross minus the 1.1 closing fee
    assert!((close.pnl.unwrap() - 98.9).abs() < 1e-6);
    assert!(ex.positions().is_empty());
    assert!((ex.current_capital() - (8_999.0 + 1_100.0 - 1.1)).abs() < 1e-6);
    assert_eq!(ex.trade_history().len(), 2);
}

#[test]
fn test_short_profits_when_price_falls() {
    let mut ex = create_test_executor();

    ex.execute_trade("B", TradeAction::Sell, TradeType::Short, &market("B", 50.0))
        .expect("short should open");
    assert!((ex.current_capital() - 8_999.0).abs() < 1e-6);

    let close = ex
        .execute_trade("B", TradeAction::Buy, TradeType::Short, &market("B", 40.0))
        .expect("short should close");
    // 20 units, 10 per unit gained, 0.8 fee on 800 notional
    assert!((close.pnl.unwrap() - (200.0 - 0.8)).abs() < 1e-6);
    assert!((ex.current_capital() - (8_999.0 + 1_200.0 - 0.8)).abs() < 1e-6);
}

#[test]
fn test_invalid_trades_are_absent() {
    let mut ex = create_test_executor();

    // Hold never trades
    assert!(ex
        .execute_trade("A", TradeAction::Hold, TradeType::Long, &market("A", 100.0))
        .is_none());
    // Nothing to close
    assert!(ex
        .execute_trade("A", TradeAction::Sell, TradeType::Long, &market("A", 100.0))
        .is_none());
    // No price known
    assert!(ex
        .execute_trade("C", TradeAction::Buy, TradeType::Long, &market("C", 0.0))
        .is_none());

    // Limit reached after two positions
    assert!(ex
        .execute_trade("A", TradeAction::Buy, TradeType::Long, &market("A", 100.0))
        .is_some());
    assert!(ex
        .execute_trade("B", TradeAction::Sell, TradeType::Short, &market("B", 50.0))
        .is_some());
    assert!(ex
        .execute_trade("C", TradeAction::Buy, TradeType::Long, &market("C", 10.0))
        .is_none());

    // A short close does not close a long
    assert!(ex
        .execute_trade("A", TradeAction::Buy, TradeType::Short, &market("A", 100.0))
        .is_none());
    assert_eq!(ex.trade_history().len(), 2);
}

#[test]
fn test_snapshots_use_given_timestamp() {
    let mut ex = create_test_executor();
    let t = Utc.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();

    ex.execute_trade("A", TradeAction::Buy, TradeType::Long, &market("A", 100.0));
    ex.mark_price("A", 90.0);
    ex.snapshot_positions(t);
    ex.snapshot_portfolio(t);

    let snap = &ex.portfolio_history()[0];
    assert_eq!(snap.timestamp, t);
    assert_eq!(snap.positions_count, 1);
    assert!((snap.positions_value - 900.0).abs() < 1e-6);
    assert!((snap.total_pnl - (snap.total_value - 10_000.0)).abs() < 1e-9);

    let pos = &ex.position_history()[0];
    assert_eq!(pos.timestamp, t);
    assert_eq!(pos.current_price, 90.0);
    assert!((pos.unrealized_pnl + 100.0).abs() < 1e-6);
}
