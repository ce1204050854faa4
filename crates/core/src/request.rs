//! Wire types for the report request endpoint.
//!
//! Field names are camelCase on the wire to match the frontend payload.

use serde::{Deserialize, Serialize};

/// Message returned on a successful lifecycle run.
pub const SUCCESS_MESSAGE: &str = "Report generated successfully";

/// The business a report is generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    pub business_name: String,
    pub postal_code: String,
    pub country: String,
    pub industry: String,
}

/// An inbound report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Id of the pre-existing report document.
    pub report_id: String,
    pub user_id: String,
    pub business_info: BusinessInfo,
    pub final_prompt: String,
}

impl ReportRequest {
    /// Names of required identity fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.report_id.is_empty() {
            missing.push("reportId");
        }
        if self.user_id.is_empty() {
            missing.push("userId");
        }
        missing
    }
}

/// Outcome of the synchronous part of a lifecycle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub success: bool,
    pub message: String,
    pub report_id: String,
}

impl ReportResponse {
    pub fn generated(report_id: &str) -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            report_id: report_id.to_string(),
        }
    }
}
