//! Lifecycle coordinator tests against in-memory and scripted stores.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smehub_core::{
    BusinessInfo, GenerationError, LifecycleCoordinator, LifecycleError, ReportGenerator,
    ReportRequest,
};
use smehub_storage::{
    MemoryStore, ReportRecord, ReportStatus, ReportStore, ReportUpdate, StoreError,
};

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn request(report_id: &str, user_id: &str) -> ReportRequest {
    ReportRequest {
        report_id: report_id.to_string(),
        user_id: user_id.to_string(),
        business_info: BusinessInfo {
            business_name: "Acme".to_string(),
            postal_code: "90210".to_string(),
            country: "US".to_string(),
            industry: "Tech".to_string(),
        },
        final_prompt: "analyze market".to_string(),
    }
}

fn returns(text: &'static str) -> Arc<dyn ReportGenerator> {
    Arc::new(move |_: &BusinessInfo, _: &str| -> Result<String, GenerationError> {
        Ok(text.to_string())
    })
}

fn fails(message: &'static str) -> Arc<dyn ReportGenerator> {
    Arc::new(move |_: &BusinessInfo, _: &str| -> Result<String, GenerationError> {
        Err(GenerationError::new(message))
    })
}

fn seeded(ids: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for id in ids {
        store.insert_pending(id);
    }
    store
}

fn coordinator(store: Arc<MemoryStore>, generator: Arc<dyn ReportGenerator>) -> LifecycleCoordinator {
    LifecycleCoordinator::new(Some(store as Arc<dyn ReportStore>), generator)
}

/// A store that records every update and fails the ones whose target status
/// is listed in `fail_on`.
#[derive(Default)]
struct ScriptedStore {
    fail_on: Vec<ReportStatus>,
    calls: Mutex<Vec<(String, Option<ReportStatus>)>>,
}

impl ScriptedStore {
    fn failing_on(statuses: &[ReportStatus]) -> Self {
        Self {
            fail_on: statuses.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn statuses(&self) -> Vec<Option<ReportStatus>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl ReportStore for ScriptedStore {
    async fn update(&self, report_id: &str, update: ReportUpdate) -> Result<(), StoreError> {
        let status = update.target_status();
        self.calls
            .lock()
            .unwrap()
            .push((report_id.to_string(), status));
        match status {
            Some(s) if self.fail_on.contains(&s) => {
                Err(StoreError::Unavailable(format!("scripted failure on {s}")))
            }
            _ => Ok(()),
        }
    }

    async fn get(&self, report_id: &str) -> Result<ReportRecord, StoreError> {
        Err(StoreError::NotFound {
            report_id: report_id.to_string(),
        })
    }

    fn backend(&self) -> &'static str {
        "scripted"
    }
}

// ──────────────────────────────────────────────
// Success path
// ──────────────────────────────────────────────

#[tokio::test]
async fn success_completes_record() {
    let store = seeded(&["r1"]);
    let coord = coordinator(store.clone(), returns("REPORT TEXT"));

    let response = coord.process_request(&request("r1", "u1")).await.unwrap();
    assert!(response.success);
    assert_eq!(response.message, "Report generated successfully");
    assert_eq!(response.report_id, "r1");

    let record = store.get("r1").await.unwrap();
    assert_eq!(record.status, ReportStatus::Completed);
    assert_eq!(record.generated_report.as_deref(), Some("REPORT TEXT"));
    assert_eq!(record.error, None);
    assert!(record.updated_at.is_some());
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn success_writes_processing_then_completed() {
    let store = Arc::new(ScriptedStore::default());
    let coord = LifecycleCoordinator::new(Some(store.clone()), returns("REPORT TEXT"));

    coord.process_request(&request("r1", "u1")).await.unwrap();
    assert_eq!(
        store.statuses(),
        vec![Some(ReportStatus::Processing), Some(ReportStatus::Completed)]
    );
}

// ──────────────────────────────────────────────
// Generation failure
// ──────────────────────────────────────────────

#[tokio::test]
async fn generator_error_fails_request_and_record() {
    let store = seeded(&["r1"]);
    let coord = coordinator(store.clone(), fails("model timeout"));

    let err = coord.process_request(&request("r1", "u1")).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Generation(_)));
    assert!(err.to_string().contains("model timeout"));

    let record = store.get("r1").await.unwrap();
    assert_eq!(record.status, ReportStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("model timeout"));
    assert_eq!(record.generated_report, None);
}

#[tokio::test]
async fn generator_panic_is_a_generation_failure() {
    let store = seeded(&["r1"]);
    let panicking: Arc<dyn ReportGenerator> =
        Arc::new(|_: &BusinessInfo, _: &str| -> Result<String, GenerationError> {
            panic!("generator bug")
        });
    let coord = coordinator(store.clone(), panicking);

    let err = coord.process_request(&request("r1", "u1")).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Generation(_)));

    let record = store.get("r1").await.unwrap();
    assert_eq!(record.status, ReportStatus::Failed);
    assert!(record.error.is_some());
}

// ──────────────────────────────────────────────
// Validation
// ──────────────────────────────────────────────

#[tokio::test]
async fn empty_report_id_writes_nothing() {
    let store = seeded(&[""]);
    let coord = coordinator(store.clone(), returns("REPORT TEXT"));

    let err = coord.process_request(&request("", "u1")).await.unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(store.update_calls(), 0);
}

#[tokio::test]
async fn empty_user_id_writes_nothing() {
    let store = seeded(&["r1"]);
    let coord = coordinator(store.clone(), returns("REPORT TEXT"));

    let err = coord.process_request(&request("r1", "")).await.unwrap_err();
    match err {
        LifecycleError::Validation { missing } => assert_eq!(missing, vec!["userId"]),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(store.update_calls(), 0);
    assert_eq!(store.get("r1").await.unwrap().status, ReportStatus::Pending);
}

#[tokio::test]
async fn validation_runs_before_generator() {
    let store = Arc::new(ScriptedStore::default());
    let coord = LifecycleCoordinator::new(
        Some(store.clone()),
        Arc::new(|_: &BusinessInfo, _: &str| -> Result<String, GenerationError> {
            panic!("generator must not run for invalid requests")
        }),
    );

    assert!(coord.process_request(&request("", "")).await.is_err());
    assert!(store.statuses().is_empty());
}

// ──────────────────────────────────────────────
// Store independence
// ──────────────────────────────────────────────

#[tokio::test]
async fn unavailable_store_still_returns_success() {
    let store = seeded(&["r1"]);
    store.set_unavailable(true);
    let coord = coordinator(store.clone(), returns("REPORT TEXT"));

    let response = coord.process_request(&request("r1", "u1")).await.unwrap();
    assert!(response.success);
    assert_eq!(store.update_calls(), 2);
}

#[tokio::test]
async fn unavailable_store_still_surfaces_generation_error() {
    let store = seeded(&["r1"]);
    store.set_unavailable(true);
    let coord = coordinator(store.clone(), fails("model timeout"));

    let err = coord.process_request(&request("r1", "u1")).await.unwrap_err();
    assert_eq!(err.to_string(), "model timeout");
    assert_eq!(store.update_calls(), 2);
}

#[tokio::test]
async fn processing_write_failure_does_not_block_completion() {
    let store = Arc::new(ScriptedStore::failing_on(&[ReportStatus::Processing]));
    let coord = LifecycleCoordinator::new(Some(store.clone()), returns("REPORT TEXT"));

    let response = coord.process_request(&request("r1", "u1")).await.unwrap();
    assert!(response.success);
    assert_eq!(
        store.statuses(),
        vec![Some(ReportStatus::Processing), Some(ReportStatus::Completed)]
    );
}

#[tokio::test]
async fn completed_write_failure_is_not_reported_to_caller() {
    let store = Arc::new(ScriptedStore::failing_on(&[ReportStatus::Completed]));
    let coord = LifecycleCoordinator::new(Some(store.clone()), returns("REPORT TEXT"));

    let response = coord.process_request(&request("r1", "u1")).await.unwrap();
    assert_eq!(response.report_id, "r1");
}

#[tokio::test]
async fn failed_write_failure_keeps_generation_message() {
    let store = Arc::new(ScriptedStore::failing_on(&[ReportStatus::Failed]));
    let coord = LifecycleCoordinator::new(Some(store.clone()), fails("model timeout"));

    let err = coord.process_request(&request("r1", "u1")).await.unwrap_err();
    assert_eq!(err.to_string(), "model timeout");
    assert_eq!(
        store.statuses(),
        vec![Some(ReportStatus::Processing), Some(ReportStatus::Failed)]
    );
}

#[tokio::test]
async fn missing_record_does_not_fail_request() {
    let store = seeded(&[]);
    let coord = coordinator(store.clone(), returns("REPORT TEXT"));

    let response = coord.process_request(&request("never-created", "u1")).await.unwrap();
    assert!(response.success);
    assert!(matches!(
        store.get("never-created").await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn no_store_runs_in_demo_mode() {
    let coord = LifecycleCoordinator::new(None, returns("REPORT TEXT"));
    assert!(!coord.store_connected());

    let response = coord.process_request(&request("r1", "u1")).await.unwrap();
    assert!(response.success);

    let coord = LifecycleCoordinator::new(None, fails("model timeout"));
    assert!(coord.process_request(&request("r1", "u1")).await.is_err());
}

// ──────────────────────────────────────────────
// Re-runs
// ──────────────────────────────────────────────

#[tokio::test]
async fn rerun_after_failure_overwrites_with_completed() {
    let store = seeded(&["r1"]);

    let failing = coordinator(store.clone(), fails("model timeout"));
    assert!(failing.process_request(&request("r1", "u1")).await.is_err());
    assert_eq!(store.get("r1").await.unwrap().status, ReportStatus::Failed);

    let working = coordinator(store.clone(), returns("REPORT TEXT"));
    working.process_request(&request("r1", "u1")).await.unwrap();

    let record = store.get("r1").await.unwrap();
    assert_eq!(record.status, ReportStatus::Completed);
    assert_eq!(record.generated_report.as_deref(), Some("REPORT TEXT"));
    assert_eq!(record.error, None);
}

#[tokio::test]
async fn rerun_after_completion_overwrites_with_failed() {
    let store = seeded(&["r1"]);

    coordinator(store.clone(), returns("REPORT TEXT"))
        .process_request(&request("r1", "u1"))
        .await
        .unwrap();
    let _ = coordinator(store.clone(), fails("quota exceeded"))
        .process_request(&request("r1", "u1"))
        .await;

    let record = store.get("r1").await.unwrap();
    assert_eq!(record.status, ReportStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("quota exceeded"));
    assert_eq!(record.generated_report, None);
    assert_eq!(record.completed_at, None);
}

#[tokio::test]
async fn concurrent_runs_for_different_reports_are_independent() {
    let ids: Vec<String> = (0..8).map(|i| format!("report-{i}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let store = seeded(&refs);
    let coord = Arc::new(coordinator(store.clone(), returns("REPORT TEXT")));

    let mut handles = Vec::new();
    for id in ids.clone() {
        let coord = coord.clone();
        handles.push(tokio::spawn(async move {
            coord.process_request(&request(&id, "u1")).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    for id in &ids {
        assert_eq!(store.get(id).await.unwrap().status, ReportStatus::Completed);
    }
}
