//! Domain model and collaborator contracts shared by the orchestrator and
//! the crates that plug into it.

pub mod model;
pub mod traits;

pub use model::action::{TradeAction, TradeIntent, TradeType};
pub use model::config::{ConfigError, TradingConfig};
pub use model::decision::{AiSignal, AssetAnalysis, ExitPlan, PortfolioDecision, TradeApproval};
pub use model::market_data::{Candle, IndicatorBundle};
pub use model::portfolio::{
    PortfolioContext, PortfolioSnapshot, Position, PositionBook, PositionSnapshot, TradeRecord,
};
pub use traits::coordinator::DecisionCoordinator;
pub use traits::executor::Executor;
pub use traits::signal_source::{AiSignalSource, SignalSource};
