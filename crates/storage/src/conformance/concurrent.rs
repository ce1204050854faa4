use std::future::Future;
use std::sync::Arc;

use super::TestResult;
use crate::{ReportStatus, ReportStore, ReportUpdate, StoreError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_lifecycles_different_reports_all_land",
            concurrent_lifecycles_different_reports_all_land(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_terminal_writes_same_report_stay_consistent",
            concurrent_terminal_writes_same_report_stay_consistent(factory).await,
        ),
    ]
}

// ── Independent reports: every lifecycle lands ───────────────────────────────

/// N tasks each drive a different report through processing → completed.
/// Every record must end completed with its own report text.
async fn concurrent_lifecycles_different_reports_all_land<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let ids: Vec<String> = (0..N).map(|i| format!("report-{i}")).collect();
    let storage = Arc::new(factory(ids.clone()).await);

    let mut handles = Vec::new();
    for id in ids.clone() {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.update(&id, ReportUpdate::processing()).await?;
            s.update(&id, ReportUpdate::completed(format!("text for {id}")))
                .await?;
            Ok::<_, StoreError>(())
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    for id in &ids {
        let record = storage.get(id).await.map_err(|e| format!("get {id}: {e}"))?;
        if record.status != ReportStatus::Completed {
            return Err(format!("{id}: expected completed, got {}", record.status));
        }
        let expected = format!("text for {id}");
        if record.generated_report.as_deref() != Some(expected.as_str()) {
            return Err(format!(
                "{id}: expected {:?}, got {:?}",
                expected, record.generated_report
            ));
        }
    }
    Ok(())
}

// ── Same report: last write wins, invariants still hold ──────────────────────

/// N tasks race terminal writes against one report, half completing and half
/// failing. No winner is guaranteed, but the surviving record must be one
/// whole transition: completed without error, or failed without report.
async fn concurrent_terminal_writes_same_report_stay_consistent<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory(vec!["shared".to_string()]).await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let update = if i % 2 == 0 {
                ReportUpdate::completed(format!("text-{i}"))
            } else {
                ReportUpdate::failed(format!("error-{i}"))
            };
            s.update("shared", update).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let record = storage
        .get("shared")
        .await
        .map_err(|e| format!("get: {e}"))?;
    match record.status {
        ReportStatus::Completed if record.generated_report.is_some() && record.error.is_none() => {
            Ok(())
        }
        ReportStatus::Failed if record.error.is_some() && record.generated_report.is_none() => {
            Ok(())
        }
        _ => Err(format!("record mixes transitions: {:?}", record)),
    }
}
