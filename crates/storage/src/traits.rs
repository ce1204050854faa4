use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{ReportRecord, ReportUpdate};

/// The document store holding one record per report.
///
/// ## Write Semantics
///
/// `update` merges the named fields into an existing document. Fields the
/// update does not mention keep their current value; [`FieldValue::Delete`]
/// removes a field; [`FieldValue::ServerTimestamp`] is resolved by the backend
/// at write time. Updating a document that does not exist fails with
/// `StoreError::NotFound`: records are created upstream and never by this
/// crate's callers.
///
/// Writes to different fields of the same document are last-write-wins per
/// field. No cross-document or cross-call atomicity is provided.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single handle can be
/// shared (behind an `Arc`) across axum handlers and spawned tasks.
///
/// [`FieldValue::Delete`]: crate::FieldValue::Delete
/// [`FieldValue::ServerTimestamp`]: crate::FieldValue::ServerTimestamp
#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
    /// Merge `update` into the document for `report_id`.
    async fn update(&self, report_id: &str, update: ReportUpdate) -> Result<(), StoreError>;

    /// Read the document for `report_id`.
    ///
    /// Returns `Err(StoreError::NotFound)` if the document does not exist.
    async fn get(&self, report_id: &str) -> Result<ReportRecord, StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
