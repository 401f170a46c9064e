//! In-memory paper trading: fills against a simulated exchange and keeps
//! the cash, positions and snapshot histories of one trading instance.

pub mod engine;
pub mod exchange;

pub use engine::PaperExecutor;
pub use exchange::{mock::MockExchange, Exchange, Fill};
