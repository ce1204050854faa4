/// All errors that can be returned by a ReportStore implementation.
///
/// The lifecycle coordinator treats every variant the same way (log and
/// continue); the split exists so logs say what actually went wrong.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No report document with the given id. Records are created upstream,
    /// so an update against a missing id is an error rather than an upsert.
    #[error("report not found: {report_id}")]
    NotFound { report_id: String },

    /// The backend could not be reached (connection refused, DNS, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but refused the request.
    #[error("store rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// No usable access token: a bad key, or a token endpoint that refused.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// The backend returned a document this crate cannot interpret.
    #[error("failed to decode stored document: {0}")]
    Decode(String),
}
