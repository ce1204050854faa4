use std::future::Future;

use super::{ids, TestResult};
use crate::{ReportStatus, ReportStore, ReportUpdate, StoreError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "get_nonexistent_is_not_found",
            get_nonexistent_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_nonexistent_is_not_found",
            update_nonexistent_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_nonexistent_does_not_create",
            update_nonexistent_does_not_create(factory).await,
        ),
        TestResult::from_result(
            "error",
            "not_found_leaves_other_records_alone",
            not_found_leaves_other_records_alone(factory).await,
        ),
    ]
}

async fn get_nonexistent_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(Vec::new()).await;
    match s.get("report-999").await {
        Err(StoreError::NotFound { report_id }) if report_id == "report-999" => Ok(()),
        other => Err(format!("expected NotFound(report-999), got {:?}", other)),
    }
}

async fn update_nonexistent_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(Vec::new()).await;
    match s.update("report-42", ReportUpdate::processing()).await {
        Err(StoreError::NotFound { report_id }) if report_id == "report-42" => Ok(()),
        other => Err(format!("expected NotFound(report-42), got {:?}", other)),
    }
}

async fn update_nonexistent_does_not_create<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(Vec::new()).await;
    let _ = s
        .update("report-7", ReportUpdate::completed("REPORT TEXT"))
        .await;
    match s.get("report-7").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("update created a record: {:?}", other)),
    }
}

async fn not_found_leaves_other_records_alone<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(ids(&["r1"])).await;
    let _ = s.update("r2", ReportUpdate::failed("boom")).await;
    let record = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if record.status != ReportStatus::Pending {
        return Err(format!("unrelated record moved to {}", record.status));
    }
    Ok(())
}
