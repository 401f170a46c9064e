//! Signal generation for trading instances: market data, indicator math,
//! the technical rule set and the LLM-backed signal adapter.

pub mod ai;
pub mod analyzer;
pub mod feed;
pub mod indicators;

pub use ai::{
    client::{ChatCompletionsClient, ChatMessage, LlmClient},
    compat::RoleCompat,
    AiSignalGenerator,
};
pub use analyzer::TechnicalAnalyzer;
pub use feed::{MarketDataProvider, SyntheticFeed};
