use crate::args::Args;
use crate::error::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "orchestrator.toml";
const MIN_CHECK_INTERVAL_SECS: u64 = 1;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExportLimits {
    pub portfolio_snapshots: usize,
    pub trades: usize,
    pub decisions: usize,
}

impl Default for ExportLimits {
    fn default() -> Self {
        Self {
            portfolio_snapshots: 100,
            trades: 50,
            decisions: 100,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Append a JSON hint to prompts that do not mention JSON.
    pub json_hint: bool,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
            json_hint: true,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MarketSettings {
    /// Candles kept per symbol by the synthetic feed.
    pub history_len: usize,
    /// Maximum relative move per candle.
    pub volatility: f64,
    pub fee_rate: f64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            history_len: 120,
            volatility: 0.01,
            fee_rate: 0.001,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    pub server_port: u16,
    pub log_level: String,

    // Scheduling
    pub check_interval_secs: u64,
    pub max_concurrent_instances: usize,

    // Bounded buffers
    pub notification_cache_capacity: usize,
    pub decision_history_capacity: usize,

    // State export
    pub state_export_path: PathBuf,
    pub export_limits: ExportLimits,

    /// Sessions whose instances are all inactive are evicted after this long.
    /// `None` keeps every session for the lifetime of the process.
    pub session_ttl_secs: Option<u64>,

    // Request defaults
    pub default_model: String,
    pub default_initial_capital: f64,

    pub llm: LlmSettings,
    pub market: MarketSettings,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            log_level: "info".to_string(),

            check_interval_secs: 60,
            max_concurrent_instances: 10,

            notification_cache_capacity: 5000,
            decision_history_capacity: 500,

            state_export_path: PathBuf::from("/tmp/trading_orchestrator_state.json"),
            export_limits: ExportLimits::default(),

            session_ttl_secs: None,

            default_model: "deepseek/deepseek-chat".to_string(),
            default_initial_capital: 100_000.0,

            llm: LlmSettings::default(),
            market: MarketSettings::default(),
        }
    }
}

impl SystemConfig {
    /// Layers defaults, then the config file, then `ORCHESTRATOR_*` env vars.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(Config::try_from(&SystemConfig::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix("ORCHESTRATOR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SystemConfig = settings.try_deserialize()?;
        if config.check_interval_secs < MIN_CHECK_INTERVAL_SECS {
            return Err(ConfigError::Message(format!(
                "check_interval_secs must be at least {}",
                MIN_CHECK_INTERVAL_SECS
            ))
            .into());
        }
        Ok(config)
    }

    /// Command-line flags win over file and environment.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.server_port = port;
        }
        if let Some(secs) = args.check_interval {
            self.check_interval_secs = secs;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
    }

    /// Never shorter than one second, whatever was configured.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(MIN_CHECK_INTERVAL_SECS))
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.map(Duration::from_secs)
    }
}
