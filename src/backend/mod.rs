//! Gateway to the cloud backend: a document store, an identity service and a
//! blob store. Each capability is a trait so handlers and services receive
//! their collaborators by injection and tests can substitute doubles.

pub mod firebase;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{BackendConfig, BackendKind};

pub use firebase::FirebaseBackend;
pub use memory::MemoryBackend;

/// Field map of a stored document
pub type Fields = serde_json::Map<String, Value>;

/// A document as returned by the store: backend-assigned id plus its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Backend client error types
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Backend request timed out")]
    Timeout,

    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused the operation with a domain code (e.g. `EMAIL_EXISTS`)
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Http(error)
        }
    }
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    /// Domain code carried by a rejection, if any
    pub fn rejection_code(&self) -> Option<&str> {
        match self {
            BackendError::Rejected(code) => Some(code.as_str()),
            _ => None,
        }
    }
}

/// Document database capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document of a collection, in backend order
    async fn list(&self, collection: &str) -> Result<Vec<Document>, BackendError>;

    /// Point lookup; `None` when the document does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError>;

    /// Documents whose `field` equals `value`
    async fn query_eq(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>, BackendError>;

    /// Insert a new document and return the backend-assigned id
    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, BackendError>;

    /// Create or replace the document stored at `id`
    async fn put(&self, collection: &str, id: &str, fields: Fields) -> Result<(), BackendError>;

    /// Merge `fields` into an existing document; other fields are left untouched.
    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), BackendError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> Result<(), BackendError>;
}

/// Account created by or signed into the identity service
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityAccount {
    pub uid: String,
    pub email: String,
    pub id_token: String,
    pub display_name: Option<String>,
}

/// Account details resolved from an identity token
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
}

/// Profile fields to change on the identity account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Identity service capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<IdentityAccount, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityAccount, BackendError>;

    async fn lookup(&self, id_token: &str) -> Result<AccountInfo, BackendError>;

    async fn send_email_verification(&self, id_token: &str) -> Result<(), BackendError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError>;

    /// Returns a refreshed identity token when the service issues one
    async fn update_profile(&self, id_token: &str, changes: &ProfileChanges) -> Result<Option<String>, BackendError>;

    async fn sign_out(&self, id_token: &str) -> Result<(), BackendError>;

    async fn delete_account(&self, uid: &str) -> Result<(), BackendError>;
}

/// Object stored in the blob store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub path: String,
    pub download_url: String,
}

/// Blob storage capability. References are either object paths or the
/// download URLs handed out by `upload`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredBlob, BackendError>;

    async fn download_url(&self, reference: &str) -> Result<String, BackendError>;

    async fn delete(&self, reference: &str) -> Result<(), BackendError>;
}

/// Handles to the three backend capabilities, shared by every request
#[derive(Clone)]
pub struct Backend {
    pub documents: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            documents,
            identity,
            blobs,
        }
    }

    /// All three capabilities served by one in-memory store
    pub fn in_memory(store: Arc<MemoryBackend>) -> Self {
        Self {
            documents: store.clone(),
            identity: store.clone(),
            blobs: store,
        }
    }

    /// Build the backend selected by configuration
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        match config.kind {
            BackendKind::Memory => {
                tracing::warn!("Using the in-memory backend; data is lost on restart");
                Ok(Self::in_memory(Arc::new(MemoryBackend::new().with_auto_verify())))
            }
            BackendKind::Firebase => {
                let firebase = Arc::new(FirebaseBackend::new(config)?);
                tracing::info!(project_id = %config.project_id, "Using the Firebase backend");
                Ok(Self {
                    documents: firebase.clone(),
                    identity: firebase.clone(),
                    blobs: firebase,
                })
            }
        }
    }
}
