mod auth;
pub mod conformance;
mod error;
mod firestore;
mod memory;
mod record;
#[cfg(test)]
mod stub_http;
mod traits;

pub use auth::{
    Credentials, ServiceAccountKey, DEFAULT_METADATA_HOST, DEFAULT_TOKEN_URI,
};
pub use error::StoreError;
pub use firestore::{decode_document, FirestoreConfig, FirestoreStore, DEFAULT_COLLECTION};
pub use memory::MemoryStore;
pub use record::{fields, FieldValue, ReportRecord, ReportStatus, ReportUpdate};
pub use traits::ReportStore;
