//! Cloud Firestore backend over the REST v1 API.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so the async
//! runtime is never blocked on network I/O. Each `update` is a single-write
//! `documents:commit`:
//!
//! - `update.fields` carries the text fields
//! - `updateMask.fieldPaths` lists text fields and deleted fields (a masked
//!   field that is absent from `fields` is removed)
//! - `updateTransforms` sets server timestamps to `REQUEST_TIME`
//! - `currentDocument.exists = true` makes a missing document an error
//!   instead of an implicit create

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::auth::{Credentials, TokenSource};
use crate::error::StoreError;
use crate::record::{fields, FieldValue, ReportRecord, ReportUpdate};
use crate::traits::ReportStore;

/// Production Firestore endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";

/// Default collection holding report documents.
pub const DEFAULT_COLLECTION: &str = "reports";

/// Per-call network timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Firestore's limit on a document id, in bytes.
const MAX_DOCUMENT_ID_BYTES: usize = 1500;

/// Connection settings for [`FirestoreStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub collection: String,
    /// `https://firestore.googleapis.com`, or `http://<host>` for the emulator.
    pub base_url: String,
    pub credentials: Credentials,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: "(default)".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: Credentials::Anonymous,
        }
    }

    /// Point at a local emulator (`FIRESTORE_EMULATOR_HOST` form, e.g. `localhost:8080`).
    pub fn with_emulator(mut self, host: &str) -> Self {
        self.base_url = format!("http://{}", host.trim_end_matches('/'));
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.project_id, self.database
        )
    }

    /// Resource name as it appears in request bodies. Not URL-encoded.
    fn document_name(&self, report_id: &str) -> String {
        format!(
            "{}/documents/{}/{}",
            self.database_path(),
            self.collection,
            report_id
        )
    }
}

/// `ReportStore` backed by a Firestore collection.
pub struct FirestoreStore {
    config: FirestoreConfig,
    agent: ureq::Agent,
    tokens: Arc<TokenSource>,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .build()
            .into();
        let tokens = Arc::new(TokenSource::new(config.credentials.clone()));
        Self {
            config,
            agent,
            tokens,
        }
    }

    /// Obtain an access token now instead of on the first write.
    ///
    /// Blocking. Fails when the configured credentials cannot produce a
    /// token, e.g. no metadata server outside Google Cloud.
    pub fn check_credentials(&self) -> Result<(), StoreError> {
        self.tokens.authorization(&self.agent).map(|_| ())
    }

    /// Build the `documents:commit` request body for one partial update.
    pub fn commit_body(&self, report_id: &str, update: &ReportUpdate) -> Value {
        let mut field_map = Map::new();
        let mut mask = Vec::new();
        let mut transforms = Vec::new();

        for (field, value) in update.iter() {
            match value {
                FieldValue::Text(text) => {
                    field_map.insert(field.to_string(), json!({ "stringValue": text }));
                    mask.push(field.to_string());
                }
                FieldValue::Delete => mask.push(field.to_string()),
                FieldValue::ServerTimestamp => transforms.push(json!({
                    "fieldPath": field,
                    "setToServerValue": "REQUEST_TIME",
                })),
            }
        }

        let mut write = json!({
            "update": {
                "name": self.config.document_name(report_id),
                "fields": field_map,
            },
            "updateMask": { "fieldPaths": mask },
            "currentDocument": { "exists": true },
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = Value::Array(transforms);
        }

        json!({ "writes": [write] })
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/v1/{}/documents:commit",
            self.config.base_url.trim_end_matches('/'),
            self.config.database_path()
        )
    }

    fn document_url(&self, report_id: &str) -> String {
        format!(
            "{}/v1/{}/documents/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.database_path(),
            urlencoding::encode(&self.config.collection),
            urlencoding::encode(report_id)
        )
    }
}

/// Document ids are a single path segment, not `.` or `..`, and not of the
/// reserved `__name__` form.
fn check_report_id(report_id: &str) -> Result<(), StoreError> {
    let reserved = report_id.len() >= 4 && report_id.starts_with("__") && report_id.ends_with("__");
    let invalid = report_id.is_empty()
        || report_id.contains('/')
        || report_id == "."
        || report_id == ".."
        || reserved
        || report_id.len() > MAX_DOCUMENT_ID_BYTES;
    if invalid {
        return Err(StoreError::Rejected {
            status: 400,
            message: format!("invalid document id '{}'", report_id),
        });
    }
    Ok(())
}

/// Map a finished HTTP exchange to the crate's error taxonomy.
fn check_status(
    report_id: &str,
    response: ureq::http::Response<ureq::Body>,
) -> Result<ureq::http::Response<ureq::Body>, StoreError> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }
    if status == 404 {
        return Err(StoreError::NotFound {
            report_id: report_id.to_string(),
        });
    }
    let message = response
        .into_body()
        .read_to_string()
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    Err(StoreError::Rejected { status, message })
}

fn join_error(e: tokio::task::JoinError) -> StoreError {
    StoreError::Unavailable(format!("task join error: {}", e))
}

#[async_trait]
impl ReportStore for FirestoreStore {
    async fn update(&self, report_id: &str, update: ReportUpdate) -> Result<(), StoreError> {
        check_report_id(report_id)?;

        let url = self.commit_url();
        let body = self.commit_body(report_id, &update);
        debug!(report_id, collection = %self.config.collection, "committing report update");
        let tokens = Arc::clone(&self.tokens);
        let agent = self.agent.clone();
        let id = report_id.to_string();

        tokio::task::spawn_blocking(move || {
            let mut request = agent.post(&url).header("content-type", "application/json");
            if let Some(auth) = tokens.authorization(&agent)? {
                request = request.header("Authorization", auth);
            }
            let response = request
                .send_json(body)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            check_status(&id, response).map(|_| ())
        })
        .await
        .map_err(join_error)?
    }

    async fn get(&self, report_id: &str) -> Result<ReportRecord, StoreError> {
        check_report_id(report_id)?;

        let url = self.document_url(report_id);
        let tokens = Arc::clone(&self.tokens);
        let agent = self.agent.clone();
        let id = report_id.to_string();

        tokio::task::spawn_blocking(move || {
            let mut request = agent.get(&url);
            if let Some(auth) = tokens.authorization(&agent)? {
                request = request.header("Authorization", auth);
            }
            let response = request
                .call()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let document: Value = check_status(&id, response)?
                .into_body()
                .read_json()
                .map_err(|e| StoreError::Decode(format!("response is not JSON: {}", e)))?;
            decode_document(&id, &document)
        })
        .await
        .map_err(join_error)?
    }

    fn backend(&self) -> &'static str {
        "firestore"
    }
}

/// Decode a Firestore `Document` resource into a [`ReportRecord`].
pub fn decode_document(report_id: &str, document: &Value) -> Result<ReportRecord, StoreError> {
    let empty = Map::new();
    let doc_fields = document
        .get("fields")
        .and_then(|f| f.as_object())
        .unwrap_or(&empty);

    let text = |name: &str| -> Result<Option<String>, StoreError> {
        match doc_fields.get(name) {
            None => Ok(None),
            Some(v) => match v.get("stringValue").and_then(|s| s.as_str()) {
                Some(s) => Ok(Some(s.to_string())),
                None if v.get("nullValue").is_some() => Ok(None),
                None => Err(StoreError::Decode(format!(
                    "field '{}' is not a string: {}",
                    name, v
                ))),
            },
        }
    };

    let timestamp = |name: &str| -> Result<Option<OffsetDateTime>, StoreError> {
        match doc_fields.get(name) {
            None => Ok(None),
            Some(v) => match v.get("timestampValue").and_then(|s| s.as_str()) {
                Some(s) => OffsetDateTime::parse(s, &Rfc3339).map(Some).map_err(|e| {
                    StoreError::Decode(format!("field '{}' has bad timestamp '{}': {}", name, s, e))
                }),
                None if v.get("nullValue").is_some() => Ok(None),
                None => Err(StoreError::Decode(format!(
                    "field '{}' is not a timestamp: {}",
                    name, v
                ))),
            },
        }
    };

    let status = text(fields::STATUS)?
        .ok_or_else(|| StoreError::Decode("document has no 'status' field".to_string()))?
        .parse()?;

    Ok(ReportRecord {
        report_id: report_id.to_string(),
        status,
        generated_report: text(fields::GENERATED_REPORT)?,
        error: text(fields::ERROR)?,
        updated_at: timestamp(fields::UPDATED_AT)?,
        completed_at: timestamp(fields::COMPLETED_AT)?,
    })
}
