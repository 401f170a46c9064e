pub mod action;
pub mod config;
pub mod decision;
pub mod market_data;
pub mod portfolio;
