//! Trade intents.
//!
//! Actions and trade types are closed enums so every consumer matches them
//! exhaustively instead of probing strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a signal or decision wants to do with a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

/// Direction of the position an action refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Long,
    Short,
}

/// The effect an (action, trade type) pair has on a position book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeIntent {
    OpenLong,
    CloseLong,
    OpenShort,
    CloseShort,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Hold => "hold",
        }
    }

    /// Resolves the pair into the position change it describes.
    ///
    /// * `Buy` + `Long` opens a long, `Sell` + `Long` closes it.
    /// * `Sell` + `Short` opens a short, `Buy` + `Short` covers it.
    pub fn intent(self, trade_type: TradeType) -> TradeIntent {
        match (self, trade_type) {
            (TradeAction::Buy, TradeType::Long) => TradeIntent::OpenLong,
            (TradeAction::Sell, TradeType::Long) => TradeIntent::CloseLong,
            (TradeAction::Sell, TradeType::Short) => TradeIntent::OpenShort,
            (TradeAction::Buy, TradeType::Short) => TradeIntent::CloseShort,
            (TradeAction::Hold, _) => TradeIntent::Hold,
        }
    }
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Long => "long",
            TradeType::Short => "short",
        }
    }
}

impl TradeIntent {
    pub fn is_opening(&self) -> bool {
        matches!(self, TradeIntent::OpenLong | TradeIntent::OpenShort)
    }

    pub fn is_closing(&self) -> bool {
        matches!(self, TradeIntent::CloseLong | TradeIntent::CloseShort)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            "hold" => Ok(TradeAction::Hold),
            other => Err(format!("unknown trade action '{}'", other)),
        }
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(TradeType::Long),
            "short" => Ok(TradeType::Short),
            other => Err(format!("unknown trade type '{}'", other)),
        }
    }
}
