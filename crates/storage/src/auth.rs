//! OAuth2 access tokens for Firestore requests.
//!
//! A service-account key is signed into an RS256 JWT and exchanged at the
//! key's token endpoint (the JWT-bearer grant). Default credentials come
//! from the GCE metadata server. Fetched tokens are cached until a minute
//! before they expire.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StoreError;

/// OAuth2 scope covering Firestore reads and writes.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Google's token endpoint, used when a key does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Metadata server host on Google Cloud runtimes.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for a signed assertion. Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Where Firestore bearer tokens come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No `Authorization` header. Only the emulator accepts this.
    Anonymous,
    /// A fixed bearer token, used as given and never refreshed.
    Static(String),
    /// A service-account key exchanged for short-lived tokens.
    ServiceAccount(ServiceAccountKey),
    /// Default credentials from the metadata server at `host`.
    Metadata { host: String },
}

impl Credentials {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Anonymous => "anonymous",
            Credentials::Static(_) => "access token",
            Credentials::ServiceAccount(_) => "service account",
            Credentials::Metadata { .. } => "metadata server",
        }
    }
}

/// The fields of a Google service-account JSON key this crate needs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a JSON key and check that its private key is usable.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| StoreError::Credentials(format!("malformed service account key: {}", e)))?;
        key.validate()?;
        Ok(key)
    }

    /// Read a JSON key file, as pointed to by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Credentials(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Fail unless `private_key` parses as an RSA PEM key.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.encoding_key().map(|_| ())
    }

    fn encoding_key(&self) -> Result<EncodingKey, StoreError> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            StoreError::Credentials(format!(
                "private key for {} is not an RSA PEM key: {}",
                self.client_email, e
            ))
        })
    }

    /// Signed JWT-bearer assertion issued at `now` (unix seconds).
    pub fn assertion(&self, now: i64) -> Result<String, StoreError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&header, &claims, &self.encoding_key()?)
            .map_err(|e| StoreError::Credentials(format!("failed to sign assertion: {}", e)))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Hands out `Authorization` header values, refreshing expired tokens.
///
/// Blocking: call from `spawn_blocking` or outside the runtime.
pub(crate) struct TokenSource {
    credentials: Credentials,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub(crate) fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cache: Mutex::new(None),
        }
    }

    /// `Bearer <token>`, or `None` for anonymous access.
    pub(crate) fn authorization(&self, agent: &ureq::Agent) -> Result<Option<String>, StoreError> {
        let token = match &self.credentials {
            Credentials::Anonymous => return Ok(None),
            Credentials::Static(token) => token.clone(),
            Credentials::ServiceAccount(key) => {
                self.cached(|now| exchange_assertion(agent, key, now))?
            }
            Credentials::Metadata { host } => self.cached(|_| metadata_token(agent, host))?,
        };
        Ok(Some(format!("Bearer {}", token)))
    }

    fn cached<F>(&self, fetch: F) -> Result<String, StoreError>
    where
        F: FnOnce(i64) -> Result<TokenResponse, StoreError>,
    {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // Held across the fetch so concurrent writers share one refresh.
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(token) = cache.as_ref() {
            if token.expires_at - REFRESH_MARGIN_SECS > now {
                return Ok(token.access_token.clone());
            }
        }

        let response = fetch(now)?;
        let expires_at = now + response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        *cache = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at,
        });
        Ok(response.access_token)
    }
}

fn exchange_assertion(
    agent: &ureq::Agent,
    key: &ServiceAccountKey,
    now: i64,
) -> Result<TokenResponse, StoreError> {
    let assertion = key.assertion(now)?;
    let response = agent
        .post(&key.token_uri)
        .send_form([("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .map_err(|e| StoreError::Unavailable(format!("token endpoint: {}", e)))?;
    read_token(response)
}

fn metadata_token(agent: &ureq::Agent, host: &str) -> Result<TokenResponse, StoreError> {
    let url = format!(
        "http://{}/computeMetadata/v1/instance/service-account/default/token",
        host.trim_end_matches('/')
    );
    let response = agent
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .call()
        .map_err(|e| StoreError::Unavailable(format!("metadata server: {}", e)))?;
    read_token(response)
}

fn read_token(response: ureq::http::Response<ureq::Body>) -> Result<TokenResponse, StoreError> {
    let status = response.status().as_u16();
    let mut body = response.into_body();
    if !(200..300).contains(&status) {
        let message = body
            .read_to_string()
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        return Err(StoreError::Credentials(format!(
            "token request returned {}: {}",
            status, message
        )));
    }
    body.read_json()
        .map_err(|e| StoreError::Decode(format!("token response is not JSON: {}", e)))
}
