use std::future::Future;

use super::{ids, TestResult};
use crate::{ReportStatus, ReportStore, ReportUpdate};

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "seeded_record_is_pending",
            seeded_record_is_pending(factory).await,
        ),
        TestResult::from_result(
            "update",
            "processing_sets_status_and_updated_at",
            processing_sets_status_and_updated_at(factory).await,
        ),
        TestResult::from_result(
            "update",
            "completed_sets_report_and_timestamps",
            completed_sets_report_and_timestamps(factory).await,
        ),
        TestResult::from_result(
            "update",
            "failed_sets_error_without_report",
            failed_sets_error_without_report(factory).await,
        ),
        TestResult::from_result(
            "update",
            "rerun_after_failed_clears_error",
            rerun_after_failed_clears_error(factory).await,
        ),
        TestResult::from_result(
            "update",
            "partial_update_keeps_other_fields",
            partial_update_keeps_other_fields(factory).await,
        ),
    ]
}

async fn seeded_record_is_pending<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(ids(&["r1"])).await;
    let record = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if record.status != ReportStatus::Pending {
        return Err(format!("expected pending, got {}", record.status));
    }
    if record.generated_report.is_some() || record.error.is_some() {
        return Err(format!("fresh record carries result fields: {:?}", record));
    }
    Ok(())
}

async fn processing_sets_status_and_updated_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(ids(&["r1"])).await;
    s.update("r1", ReportUpdate::processing())
        .await
        .map_err(|e| format!("update: {e}"))?;
    let record = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if record.status != ReportStatus::Processing {
        return Err(format!("expected processing, got {}", record.status));
    }
    if record.updated_at.is_none() {
        return Err("updatedAt not set by server timestamp".to_string());
    }
    if record.completed_at.is_some() {
        return Err("completedAt set on a processing record".to_string());
    }
    Ok(())
}

async fn completed_sets_report_and_timestamps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(ids(&["r1"])).await;
    s.update("r1", ReportUpdate::processing())
        .await
        .map_err(|e| format!("processing: {e}"))?;
    s.update("r1", ReportUpdate::completed("REPORT TEXT"))
        .await
        .map_err(|e| format!("completed: {e}"))?;

    let record = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if record.status != ReportStatus::Completed {
        return Err(format!("expected completed, got {}", record.status));
    }
    if record.generated_report.as_deref() != Some("REPORT TEXT") {
        return Err(format!(
            "expected generatedReport \"REPORT TEXT\", got {:?}",
            record.generated_report
        ));
    }
    if record.error.is_some() {
        return Err(format!("completed record carries error {:?}", record.error));
    }
    match (record.updated_at, record.completed_at) {
        (Some(_), Some(_)) => Ok(()),
        other => Err(format!("expected both timestamps set, got {:?}", other)),
    }
}

async fn failed_sets_error_without_report<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(ids(&["r1"])).await;
    s.update("r1", ReportUpdate::failed("model timeout"))
        .await
        .map_err(|e| format!("update: {e}"))?;

    let record = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if record.status != ReportStatus::Failed {
        return Err(format!("expected failed, got {}", record.status));
    }
    if record.error.as_deref() != Some("model timeout") {
        return Err(format!("expected error \"model timeout\", got {:?}", record.error));
    }
    if record.generated_report.is_some() {
        return Err("failed record carries generatedReport".to_string());
    }
    Ok(())
}

/// A second lifecycle run over a failed record must end up with a clean
/// completed record: the old error may not survive the merge.
async fn rerun_after_failed_clears_error<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(ids(&["r1"])).await;
    for (label, update) in [
        ("processing", ReportUpdate::processing()),
        ("failed", ReportUpdate::failed("model timeout")),
        ("processing again", ReportUpdate::processing()),
    ] {
        s.update("r1", update)
            .await
            .map_err(|e| format!("{label}: {e}"))?;
    }

    let mid = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if mid.error.is_some() {
        return Err(format!("processing record still carries error {:?}", mid.error));
    }

    s.update("r1", ReportUpdate::completed("second try"))
        .await
        .map_err(|e| format!("completed: {e}"))?;
    let record = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if record.status != ReportStatus::Completed || record.error.is_some() {
        return Err(format!("expected clean completed record, got {:?}", record));
    }
    Ok(())
}

async fn partial_update_keeps_other_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(ids(&["r1"])).await;
    s.update("r1", ReportUpdate::completed("REPORT TEXT"))
        .await
        .map_err(|e| format!("completed: {e}"))?;
    s.update(
        "r1",
        ReportUpdate::new().server_timestamp(crate::fields::UPDATED_AT),
    )
    .await
    .map_err(|e| format!("touch: {e}"))?;

    let record = s.get("r1").await.map_err(|e| format!("get: {e}"))?;
    if record.status != ReportStatus::Completed {
        return Err(format!("status changed to {}", record.status));
    }
    if record.generated_report.as_deref() != Some("REPORT TEXT") {
        return Err(format!(
            "generatedReport lost by partial update: {:?}",
            record.generated_report
        ));
    }
    Ok(())
}
