use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StoreError;

/// Document field names, as stored.
pub mod fields {
    pub const STATUS: &str = "status";
    pub const GENERATED_REPORT: &str = "generatedReport";
    pub const ERROR: &str = "error";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const COMPLETED_AT: &str = "completedAt";
}

/// Lifecycle status of a report document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Processing => "processing",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "processing" => Ok(ReportStatus::Processing),
            "completed" => Ok(ReportStatus::Completed),
            "failed" => Ok(ReportStatus::Failed),
            other => Err(StoreError::Decode(format!("unknown report status '{}'", other))),
        }
    }
}

/// A report document as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub report_id: String,
    pub status: ReportStatus,
    pub generated_report: Option<String>,
    pub error: Option<String>,
    pub updated_at: Option<OffsetDateTime>,
    pub completed_at: Option<OffsetDateTime>,
}

impl ReportRecord {
    /// A freshly created record, as the upstream collaborator writes it.
    pub fn pending(report_id: &str) -> Self {
        Self {
            report_id: report_id.to_string(),
            status: ReportStatus::Pending,
            generated_report: None,
            error: None,
            updated_at: None,
            completed_at: None,
        }
    }

    /// Merge a partial update into this record, resolving server timestamps to `now`.
    ///
    /// Fields not named in the update are left untouched.
    pub fn apply(&mut self, update: &ReportUpdate, now: OffsetDateTime) -> Result<(), StoreError> {
        for (field, value) in update.iter() {
            match field {
                fields::STATUS => match value {
                    FieldValue::Text(s) => self.status = s.parse()?,
                    other => {
                        return Err(StoreError::Decode(format!(
                            "status must be text, got {:?}",
                            other
                        )))
                    }
                },
                fields::GENERATED_REPORT => self.generated_report = value.as_text(),
                fields::ERROR => self.error = value.as_text(),
                fields::UPDATED_AT => self.updated_at = value.as_timestamp(now)?,
                fields::COMPLETED_AT => self.completed_at = value.as_timestamp(now)?,
                other => {
                    return Err(StoreError::Decode(format!("unknown report field '{}'", other)))
                }
            }
        }
        Ok(())
    }
}

/// Value written to a single document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Resolved by the backend to its own clock at write time.
    ServerTimestamp,
    /// Remove the field from the document.
    Delete,
}

impl FieldValue {
    fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn as_timestamp(&self, now: OffsetDateTime) -> Result<Option<OffsetDateTime>, StoreError> {
        match self {
            FieldValue::ServerTimestamp => Ok(Some(now)),
            FieldValue::Delete => Ok(None),
            FieldValue::Text(s) => Err(StoreError::Decode(format!(
                "timestamp fields only accept the server timestamp sentinel, got '{}'",
                s
            ))),
        }
    }
}

/// A partial update to one report document: field name → new value.
///
/// Each lifecycle transition has a constructor that writes the new status and
/// deletes the fields the new status must not carry, so a re-run over a
/// terminal record never leaves a stale `error` or `generatedReport` behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportUpdate {
    fields: BTreeMap<String, FieldValue>,
}

impl ReportUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{status: "processing", updatedAt: now}`.
    pub fn processing() -> Self {
        Self::new()
            .status(ReportStatus::Processing)
            .server_timestamp(fields::UPDATED_AT)
            .delete(fields::GENERATED_REPORT)
            .delete(fields::ERROR)
            .delete(fields::COMPLETED_AT)
    }

    /// `{status: "completed", generatedReport, updatedAt: now, completedAt: now}`.
    pub fn completed(report: impl Into<String>) -> Self {
        Self::new()
            .status(ReportStatus::Completed)
            .text(fields::GENERATED_REPORT, report)
            .server_timestamp(fields::UPDATED_AT)
            .server_timestamp(fields::COMPLETED_AT)
            .delete(fields::ERROR)
    }

    /// `{status: "failed", error, updatedAt: now}`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::new()
            .status(ReportStatus::Failed)
            .text(fields::ERROR, error)
            .server_timestamp(fields::UPDATED_AT)
            .delete(fields::GENERATED_REPORT)
            .delete(fields::COMPLETED_AT)
    }

    pub fn status(self, status: ReportStatus) -> Self {
        self.text(fields::STATUS, status.as_str())
    }

    pub fn text(mut self, field: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(field.to_string(), FieldValue::Text(value.into()));
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.fields
            .insert(field.to_string(), FieldValue::ServerTimestamp);
        self
    }

    pub fn delete(mut self, field: &str) -> Self {
        self.fields.insert(field.to_string(), FieldValue::Delete);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// The status this update writes, if any.
    pub fn target_status(&self) -> Option<ReportStatus> {
        match self.fields.get(fields::STATUS) {
            Some(FieldValue::Text(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
