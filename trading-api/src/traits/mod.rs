pub mod coordinator;
pub mod executor;
pub mod signal_source;
