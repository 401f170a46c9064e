mod common;

use common::{init_logger, RecordingSink, ScriptedProcessor};
use orchestrator_protocol::{ControlCommand, ControlResponse, StreamEvent, TradingRequest};
use std::sync::Arc;
use std::time::Duration;
use system_orchestrator::{
    NoopExporter, Orchestrator, OrchestratorError, PaperInstanceFactory, SystemConfig,
};

fn orchestrator() -> (Orchestrator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = Orchestrator::new(
        &SystemConfig::default(),
        Arc::new(PaperInstanceFactory::new(0.001, None)),
        Arc::new(ScriptedProcessor::default()),
        sink.clone(),
        Arc::new(NoopExporter),
    );
    (orchestrator, sink)
}

fn request(models: &[&str]) -> TradingRequest {
    TradingRequest::new(vec!["BTC-USD".into(), "ETH-USD".into()])
        .with_models(models.iter().map(|m| m.to_string()).collect())
}

#[tokio::test]
async fn test_setup_failure_creates_nothing() {
    init_logger();
    let (orchestrator, sink) = orchestrator();

    let err = orchestrator
        .start("S", TradingRequest::new(vec![]).with_models(vec!["m1".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidRequest(_)));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StreamEvent::Failed { .. }));
    assert!(!orchestrator.registry().contains_session("S"));
    assert!(!orchestrator.is_scheduling("S"));
}

#[tokio::test(start_paused = true)]
async fn test_start_runs_one_scheduler_per_session() {
    init_logger();
    let (orchestrator, sink) = orchestrator();

    let ids = orchestrator.start("S", request(&["m1", "m2"])).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(sink.texts().len(), 2);
    assert!(orchestrator.is_scheduling("S"));

    // First cycle flushes the initial snapshots with the cycle's own output
    tokio::time::sleep(Duration::from_secs(1)).await;
    let titles: Vec<String> = sink.notifications().into_iter().map(|r| r.title).collect();
    assert!(titles.contains(&"m1 Initial Portfolio".to_string()));
    assert!(titles.contains(&"m2 Initial Portfolio".to_string()));
    assert!(titles.contains(&"m1 Portfolio Status".to_string()));

    // A second request joins the running scheduler
    let more = orchestrator.start("S", request(&["m3"])).await.unwrap();
    assert!(!orchestrator.ensure_scheduler("S"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    let third = orchestrator.registry().get("S", &more[0]).unwrap();
    assert_eq!(third.check_count(), 1);
    assert_eq!(orchestrator.registry().get("S", &ids[0]).unwrap().check_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_then_restart_spawns_new_scheduler() {
    init_logger();
    let (orchestrator, _sink) = orchestrator();

    orchestrator.start("S", request(&["m1"])).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let resp = orchestrator.handle_query("S", "stop all trading").unwrap();
    assert!(matches!(resp, ControlResponse::StoppedAll { count: 1, .. }));

    // The scheduler notices on its next wake-up and exits
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!orchestrator.is_scheduling("S"));

    let ids = orchestrator.start("S", request(&["m2"])).await.unwrap();
    assert!(orchestrator.is_scheduling("S"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(orchestrator.registry().get("S", &ids[0]).unwrap().check_count(), 1);

    match orchestrator.handle_command("S", ControlCommand::Status) {
        ControlResponse::Status { instances, .. } => {
            assert_eq!(instances.len(), 2);
            assert_eq!(instances.iter().filter(|i| i.active).count(), 1);
        }
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_every_instance() {
    init_logger();
    let (orchestrator, _sink) = orchestrator();

    let a = orchestrator.start("S", request(&["m1"])).await.unwrap();
    let b = orchestrator.start("T", request(&["m2"])).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    orchestrator.shutdown().await;

    assert!(!orchestrator.registry().get("S", &a[0]).unwrap().is_active());
    assert!(!orchestrator.registry().get("T", &b[0]).unwrap().is_active());
    assert!(!orchestrator.is_scheduling("S"));
    assert!(!orchestrator.is_scheduling("T"));

    let decisions = orchestrator.recent_decisions("S", &a[0], 10).unwrap();
    assert_eq!(decisions.len(), 1);
}
