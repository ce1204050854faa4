//! Configuration loading from environment variables.

use std::path::Path;
use std::sync::Arc;

use smehub_storage::{
    Credentials, FirestoreConfig, FirestoreStore, MemoryStore, ReportStore, ServiceAccountKey,
    StoreError, DEFAULT_METADATA_HOST, DEFAULT_TOKEN_URI,
};
use tracing::warn;

/// Default bind host.
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port.
const DEFAULT_PORT: u16 = 8000;

/// Which report store backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreConfig {
    /// No backend: store writes are skipped (demo mode).
    Disabled,
    /// In-process store, empty at startup.
    Memory,
    Firestore(FirestoreConfig),
}

impl StoreConfig {
    /// Build the configured backend. `None` means demo mode.
    ///
    /// Default credentials are looked up here: with no metadata server to
    /// answer, Firestore stays disconnected instead of failing every write.
    /// Blocking.
    pub(crate) fn connect(&self) -> Option<Arc<dyn ReportStore>> {
        match self {
            StoreConfig::Disabled => None,
            StoreConfig::Memory => Some(Arc::new(MemoryStore::new())),
            StoreConfig::Firestore(config) => {
                let store = FirestoreStore::new(config.clone());
                if let Credentials::Metadata { host } = &config.credentials {
                    if let Err(e) = store.check_credentials() {
                        warn!(
                            metadata_host = %host,
                            error = %e,
                            "no Firebase credentials found"
                        );
                        return None;
                    }
                }
                Some(Arc::new(store))
            }
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) store: StoreConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `HOST`: bind host (default: 0.0.0.0)
    /// - `PORT`: listen port (default: 8000)
    /// - `SMEHUB_STORE`: `firestore`, `memory` or `none` (default: `firestore`
    ///   when `FIREBASE_PROJECT_ID` is set, otherwise `none`)
    /// - `FIREBASE_PROJECT_ID`: Firestore project (falls back to the key
    ///   file's `project_id`)
    /// - `FIRESTORE_EMULATOR_HOST`: talk to a local emulator instead of Google
    /// - `SMEHUB_REPORTS_COLLECTION`: collection name (default: reports)
    ///
    /// Firestore credentials, first match wins:
    /// 1. `FIRESTORE_ACCESS_TOKEN`: fixed bearer token
    /// 2. `GOOGLE_APPLICATION_CREDENTIALS`: path to a service-account key file
    ///    (ignored when the file does not exist)
    /// 3. `FIREBASE_PRIVATE_KEY_ID`, `FIREBASE_PRIVATE_KEY`,
    ///    `FIREBASE_CLIENT_EMAIL`, `FIREBASE_CLIENT_ID`: service account from
    ///    variables (`FIREBASE_TOKEN_URI` optional)
    /// 4. the metadata server at `GCE_METADATA_HOST` (default:
    ///    metadata.google.internal)
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Empty values count as unset.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT", "must be a valid port number"))?,
            None => DEFAULT_PORT,
        };

        let backend = get("SMEHUB_STORE").map(|v| v.trim().to_lowercase());

        let store = match backend.as_deref() {
            Some("none") => StoreConfig::Disabled,
            Some("memory") => StoreConfig::Memory,
            Some("firestore") => StoreConfig::Firestore(
                firestore_config(&get)?.ok_or(ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            ),
            None => firestore_config(&get)?
                .map(StoreConfig::Firestore)
                .unwrap_or(StoreConfig::Disabled),
            Some(_) => {
                return Err(ConfigError::Invalid(
                    "SMEHUB_STORE",
                    "must be one of firestore, memory, none",
                ))
            }
        };

        Ok(Self { host, port, store })
    }
}

/// Firestore settings, or `None` when no project can be determined.
fn firestore_config<G>(get: &G) -> Result<Option<FirestoreConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let key_file = match get("GOOGLE_APPLICATION_CREDENTIALS") {
        Some(path) if Path::new(&path).exists() => {
            Some(ServiceAccountKey::from_file(Path::new(&path))?)
        }
        _ => None,
    };

    let project = get("FIREBASE_PROJECT_ID")
        .or_else(|| key_file.as_ref().and_then(|k| k.project_id.clone()));
    let Some(project) = project else {
        return Ok(None);
    };

    let emulator = get("FIRESTORE_EMULATOR_HOST");
    let credentials = if emulator.is_some() {
        Credentials::Anonymous
    } else if let Some(token) = get("FIRESTORE_ACCESS_TOKEN") {
        Credentials::Static(token)
    } else if let Some(key) = key_file {
        Credentials::ServiceAccount(key)
    } else if let Some(key) = key_from_vars(get, &project)? {
        Credentials::ServiceAccount(key)
    } else {
        Credentials::Metadata {
            host: get("GCE_METADATA_HOST").unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string()),
        }
    };

    let mut config = FirestoreConfig::new(project).with_credentials(credentials);
    if let Some(host) = emulator {
        config = config.with_emulator(&host);
    }
    if let Some(collection) = get("SMEHUB_REPORTS_COLLECTION") {
        config.collection = collection;
    }
    Ok(Some(config))
}

/// Service account assembled from `FIREBASE_*` variables. All four must be set.
fn key_from_vars<G>(get: &G, project: &str) -> Result<Option<ServiceAccountKey>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let (Some(key_id), Some(private_key), Some(client_email), Some(_client_id)) = (
        get("FIREBASE_PRIVATE_KEY_ID"),
        get("FIREBASE_PRIVATE_KEY"),
        get("FIREBASE_CLIENT_EMAIL"),
        get("FIREBASE_CLIENT_ID"),
    ) else {
        return Ok(None);
    };

    let key = ServiceAccountKey {
        client_email,
        // .env files carry the PEM with literal \n escapes.
        private_key: private_key.replace("\\n", "\n"),
        private_key_id: Some(key_id),
        token_uri: get("FIREBASE_TOKEN_URI").unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        project_id: Some(project.to_string()),
    };
    key.validate()?;
    Ok(Some(key))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    /// Firebase credentials were supplied but are unusable.
    #[error("Firebase credentials: {0}")]
    Credentials(#[from] StoreError),
}
