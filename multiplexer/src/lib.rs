//! Portfolio-level coordination of per-symbol signals.

pub mod decision_manager;

pub use decision_manager::{DecisionManagerConfig, PortfolioDecisionManager};
