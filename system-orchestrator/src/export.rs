//! Read-side state export.
//!
//! One [`StateSnapshot`] of every session is handed to a [`StateExporter`]
//! after each cycle. Export is best effort: the scheduler logs a failure
//! and carries on.

use crate::decision::DecisionEntry;
use crate::error::{OrchestratorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trading::{PortfolioSnapshot, PositionSnapshot, TradeRecord, TradingConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceExport {
    pub instance_id: String,
    pub session_id: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_check: Option<DateTime<Utc>>,
    pub check_count: u64,
    pub config: TradingConfig,
    pub portfolio_history: Vec<PortfolioSnapshot>,
    pub trade_history: Vec<TradeRecord>,
    /// Positions open at the latest portfolio snapshot.
    pub position_history: Vec<PositionSnapshot>,
    pub decision_history: Vec<DecisionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub instances: Vec<InstanceExport>,
}

#[async_trait]
pub trait StateExporter: Send + Sync {
    async fn export(&self, snapshot: &StateSnapshot) -> Result<()>;
}

/// Writes the snapshot as pretty JSON.
///
/// The file is written next to the target and renamed into place, so
/// readers never observe a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileExporter {
    path: PathBuf,
}

impl JsonFileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateExporter for JsonFileExporter {
    async fn export(&self, snapshot: &StateSnapshot) -> Result<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            OrchestratorError::Export(format!("rename to {}: {}", self.path.display(), e))
        })?;

        debug!(
            "Export: wrote {} instance(s) to {}",
            snapshot.instances.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExporter;

#[async_trait]
impl StateExporter for NoopExporter {
    async fn export(&self, _snapshot: &StateSnapshot) -> Result<()> {
        Ok(())
    }
}
