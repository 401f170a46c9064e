use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use multiplexer::PortfolioDecisionManager;
use std::sync::Arc;
use std::time::Duration;
use strategy_lab::{ChatCompletionsClient, LlmClient, RoleCompat, SyntheticFeed, TechnicalAnalyzer};
use system_orchestrator::api::{run_api_server, AppState};
use system_orchestrator::args::Args;
use system_orchestrator::{
    EventBus, JsonFileExporter, Orchestrator, PaperInstanceFactory, SystemConfig, TradingCycle,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = SystemConfig::load(args.config.as_deref()).context("loading configuration")?;
    config.apply_args(&args);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();
    info!("=== Trading Orchestrator Starting ===");
    info!(
        "Cycle every {}s, at most {} instances in flight",
        config.check_interval().as_secs(),
        config.max_concurrent_instances
    );

    // 1. Collaborators
    let feed = Arc::new(SyntheticFeed::new(
        config.market.history_len,
        config.market.volatility,
    ));
    let analyzer = Arc::new(TechnicalAnalyzer::new(feed, config.market.history_len));
    let coordinator = Arc::new(PortfolioDecisionManager::default());
    let processor = Arc::new(TradingCycle::new(analyzer, coordinator));

    // Built once and shared by every AI signal source
    let compat = Arc::new(RoleCompat::openai_compatible(config.llm.json_hint));
    let api_key = std::env::var(&config.llm.api_key_env).ok();
    if api_key.is_none() {
        warn!(
            "{} is not set, LLM requests go out unauthenticated",
            config.llm.api_key_env
        );
    }
    let llm: Arc<dyn LlmClient> = Arc::new(ChatCompletionsClient::new(
        config.llm.base_url.clone(),
        api_key,
        compat,
        Duration::from_secs(config.llm.request_timeout_secs),
    )?);
    let factory = Arc::new(PaperInstanceFactory::new(config.market.fee_rate, Some(llm)));

    // 2. Core
    let events = EventBus::new();
    let exporter = Arc::new(JsonFileExporter::new(config.state_export_path.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        factory,
        processor,
        Arc::new(events.clone()),
        exporter,
    ));

    let sweeper = config.session_ttl().map(|ttl| {
        info!("Idle sessions are evicted after {}s", ttl.as_secs());
        orchestrator.spawn_sweeper(ttl)
    });

    // 3. Control surface, until ctrl-c
    let state = AppState {
        orchestrator: orchestrator.clone(),
        events,
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown requested");
    };
    run_api_server(state, config.server_port, shutdown).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    orchestrator.shutdown().await;
    Ok(())
}
