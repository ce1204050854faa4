//! Report request lifecycle.
//!
//! One run drives one report document through
//!
//! ```text
//! pending --[mark processing]--> processing
//! processing --[generation succeeds]--> completed   (terminal)
//! processing --[generation fails]--> failed         (terminal)
//! ```
//!
//! Store writes are best-effort: a failed write is logged and the run goes on,
//! so a store outage never changes what the caller sees. Only a generator
//! failure fails the request. Nothing is retried and nothing times out; two
//! concurrent runs for the same report id are not coordinated.

use std::sync::Arc;

use smehub_storage::{ReportStatus, ReportStore, ReportUpdate, StoreError};
use tracing::{debug, error, info, warn};

use crate::generator::{GenerationError, ReportGenerator};
use crate::request::{ReportRequest, ReportResponse};

/// Why a lifecycle run did not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// `reportId` or `userId` is empty. Nothing was written to the store.
    #[error("Missing required fields: reportId or userId")]
    Validation { missing: Vec<&'static str> },

    /// The generator failed. A `failed` status was written on a best-effort basis.
    #[error("{0}")]
    Generation(#[from] GenerationError),
}

impl LifecycleError {
    /// True when the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, LifecycleError::Validation { .. })
    }
}

/// The only transitions a run performs.
pub fn is_lifecycle_transition(from: ReportStatus, to: ReportStatus) -> bool {
    matches!(
        (from, to),
        (ReportStatus::Pending, ReportStatus::Processing)
            | (ReportStatus::Processing, ReportStatus::Completed)
            | (ReportStatus::Processing, ReportStatus::Failed)
    )
}

/// Orchestrates status writes around one generator call.
///
/// Holds no per-request state; one coordinator serves all requests.
pub struct LifecycleCoordinator {
    /// `None` runs without persistence (demo mode).
    store: Option<Arc<dyn ReportStore>>,
    generator: Arc<dyn ReportGenerator>,
}

impl LifecycleCoordinator {
    pub fn new(store: Option<Arc<dyn ReportStore>>, generator: Arc<dyn ReportGenerator>) -> Self {
        Self { store, generator }
    }

    /// Whether a store backend was configured.
    pub fn store_connected(&self) -> bool {
        self.store.is_some()
    }

    /// Run one report through its lifecycle.
    ///
    /// Returns a success response whenever the generator produced a report,
    /// whether or not the result could be persisted.
    pub async fn process_request(
        &self,
        request: &ReportRequest,
    ) -> Result<ReportResponse, LifecycleError> {
        let report_id = request.report_id.as_str();
        info!(report_id, user_id = %request.user_id, "received report request");

        let missing = request.missing_fields();
        if !missing.is_empty() {
            warn!(report_id, ?missing, "rejecting report request");
            return Err(LifecycleError::Validation { missing });
        }

        let mut run = LifecycleRun::new(report_id);

        if let Err(e) = self.advance(&mut run, ReportUpdate::processing()).await {
            warn!(report_id, error = %e, "could not update status to processing");
        }

        info!(report_id, "starting report generation");
        match self.generate(request).await {
            Ok(report) => {
                info!(report_id, bytes = report.len(), "report generation completed");
                if let Err(e) = self.advance(&mut run, ReportUpdate::completed(report)).await {
                    error!(
                        report_id,
                        error = %e,
                        "report was generated but the store update failed"
                    );
                }
                Ok(ReportResponse::generated(report_id))
            }
            Err(e) => {
                error!(report_id, error = %e, "report generation failed");
                if let Err(store_err) = self
                    .advance(&mut run, ReportUpdate::failed(e.message()))
                    .await
                {
                    error!(
                        report_id,
                        error = %store_err,
                        "could not update status to failed"
                    );
                }
                Err(LifecycleError::Generation(e))
            }
        }
    }

    /// Move the run to the status `update` writes, then persist it.
    ///
    /// The run advances even when the write fails: its status tracks what
    /// this process did, not what the store saw.
    async fn advance(&self, run: &mut LifecycleRun, update: ReportUpdate) -> Result<(), StoreError> {
        if let Some(to) = update.target_status() {
            run.step(to);
        }

        let Some(store) = &self.store else {
            warn!(
                report_id = %run.report_id,
                status = %run.status,
                "store not configured - skipping database update"
            );
            return Ok(());
        };

        store.update(&run.report_id, update).await?;
        debug!(
            report_id = %run.report_id,
            status = %run.status,
            backend = store.backend(),
            "report record updated"
        );
        Ok(())
    }

    /// Call the generator on the blocking pool. A panic inside the generator
    /// is reported like any other generation failure.
    async fn generate(&self, request: &ReportRequest) -> Result<String, GenerationError> {
        let generator = Arc::clone(&self.generator);
        let business = request.business_info.clone();
        let prompt = request.final_prompt.clone();

        tokio::task::spawn_blocking(move || generator.generate(&business, &prompt))
            .await
            .unwrap_or_else(|e| {
                Err(GenerationError::new(format!(
                    "report generator task failed: {}",
                    e
                )))
            })
    }
}

/// Status of one report as seen by the run driving it.
struct LifecycleRun {
    report_id: String,
    status: ReportStatus,
}

impl LifecycleRun {
    /// Records reach this process already `pending`; the run does not read
    /// the store to confirm it.
    fn new(report_id: &str) -> Self {
        Self {
            report_id: report_id.to_string(),
            status: ReportStatus::Pending,
        }
    }

    fn step(&mut self, to: ReportStatus) {
        debug_assert!(
            is_lifecycle_transition(self.status, to),
            "illegal report transition {} -> {}",
            self.status,
            to
        );
        debug!(report_id = %self.report_id, from = %self.status, to = %to, "report transition");
        self.status = to;
    }
}
