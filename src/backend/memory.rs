use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{
    AccountInfo, BackendError, BlobStore, Document, DocumentStore, Fields, IdentityAccount, IdentityProvider,
    ProfileChanges, StoredBlob,
};

const BLOB_URL_PREFIX: &str = "memory://blobs/";

/// Kind of email the identity service would have sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundEmail {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
struct Account {
    email: String,
    password: String,
    display_name: Option<String>,
    email_verified: bool,
}

#[derive(Debug, Clone)]
struct Blob {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Default)]
struct State {
    /// Documents per collection, in insertion order
    collections: HashMap<String, Vec<Document>>,
    accounts: HashMap<String, Account>,
    /// Issued identity token to uid
    tokens: HashMap<String, String>,
    blobs: HashMap<String, Blob>,
    outbox: Vec<(OutboundEmail, String)>,
}

/// In-process backend serving documents, identities and blobs from memory.
/// Used for local development and as the backend of the HTTP tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    auto_verify: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// New accounts start with a verified email
    pub fn with_auto_verify(mut self) -> Self {
        self.auto_verify = true;
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Mark the account registered under `email` as verified
    pub fn verify_email(&self, email: &str) -> Result<(), BackendError> {
        let mut state = self.state()?;
        let account = state
            .accounts
            .values_mut()
            .find(|account| account.email == email)
            .ok_or_else(|| BackendError::NotFound(format!("account {}", email)))?;
        account.email_verified = true;
        Ok(())
    }

    /// Emails the identity service has been asked to send
    pub fn sent_emails(&self) -> Vec<(OutboundEmail, String)> {
        self.state().map(|state| state.outbox.clone()).unwrap_or_default()
    }

    pub fn account_count(&self) -> usize {
        self.state().map(|state| state.accounts.len()).unwrap_or_default()
    }

    pub fn blob_exists(&self, reference: &str) -> bool {
        self.state()
            .map(|state| state.blobs.contains_key(blob_path(reference)))
            .unwrap_or(false)
    }

    fn issue_token(state: &mut State, uid: &str) -> String {
        let token = format!("mem-{}", Uuid::new_v4().simple());
        state.tokens.insert(token.clone(), uid.to_string());
        token
    }

    fn uid_for_token(state: &State, id_token: &str) -> Result<String, BackendError> {
        state
            .tokens
            .get(id_token)
            .cloned()
            .ok_or_else(|| BackendError::Rejected("INVALID_ID_TOKEN".to_string()))
    }
}

fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(20).collect()
}

fn blob_path(reference: &str) -> &str {
    reference.strip_prefix(BLOB_URL_PREFIX).unwrap_or(reference)
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, BackendError> {
        let state = self.state()?;
        Ok(state.collections.get(collection).cloned().unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError> {
        let state = self.state()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| document.id == id))
            .cloned())
    }

    async fn query_eq(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>, BackendError> {
        let state = self.state()?;
        Ok(state
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| document.fields.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, BackendError> {
        let id = new_document_id();
        let mut state = self.state()?;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document { id: id.clone(), fields });
        debug!(collection, id = %id, "Inserted document");
        Ok(id)
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> Result<(), BackendError> {
        let mut state = self.state()?;
        let documents = state.collections.entry(collection.to_string()).or_default();
        match documents.iter_mut().find(|document| document.id == id) {
            Some(document) => document.fields = fields,
            None => documents.push(Document {
                id: id.to_string(),
                fields,
            }),
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), BackendError> {
        let mut state = self.state()?;
        let document = state
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|document| document.id == id))
            .ok_or_else(|| BackendError::NotFound(format!("{}/{}", collection, id)))?;
        for (key, value) in fields {
            document.fields.insert(key, value);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let mut state = self.state()?;
        if let Some(documents) = state.collections.get_mut(collection) {
            documents.retain(|document| document.id != id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.state().map(|_| ())
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn create_account(&self, email: &str, password: &str) -> Result<IdentityAccount, BackendError> {
        if password.len() < 6 {
            return Err(BackendError::Rejected("WEAK_PASSWORD".to_string()));
        }

        let mut state = self.state()?;
        if state.accounts.values().any(|account| account.email == email) {
            return Err(BackendError::Rejected("EMAIL_EXISTS".to_string()));
        }

        let uid = Uuid::new_v4().simple().to_string();
        state.accounts.insert(
            uid.clone(),
            Account {
                email: email.to_string(),
                password: password.to_string(),
                display_name: None,
                email_verified: self.auto_verify,
            },
        );
        let id_token = Self::issue_token(&mut state, &uid);

        Ok(IdentityAccount {
            uid,
            email: email.to_string(),
            id_token,
            display_name: None,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityAccount, BackendError> {
        let mut state = self.state()?;
        let (uid, account) = state
            .accounts
            .iter()
            .find(|(_, account)| account.email == email)
            .map(|(uid, account)| (uid.clone(), account.clone()))
            .ok_or_else(|| BackendError::Rejected("EMAIL_NOT_FOUND".to_string()))?;

        if account.password != password {
            return Err(BackendError::Rejected("INVALID_PASSWORD".to_string()));
        }

        let id_token = Self::issue_token(&mut state, &uid);
        Ok(IdentityAccount {
            uid,
            email: account.email,
            id_token,
            display_name: account.display_name,
        })
    }

    async fn lookup(&self, id_token: &str) -> Result<AccountInfo, BackendError> {
        let state = self.state()?;
        let uid = Self::uid_for_token(&state, id_token)?;
        let account = state
            .accounts
            .get(&uid)
            .ok_or_else(|| BackendError::Rejected("USER_NOT_FOUND".to_string()))?;

        Ok(AccountInfo {
            uid,
            email: account.email.clone(),
            email_verified: account.email_verified,
            display_name: account.display_name.clone(),
        })
    }

    async fn send_email_verification(&self, id_token: &str) -> Result<(), BackendError> {
        let mut state = self.state()?;
        let uid = Self::uid_for_token(&state, id_token)?;
        let email = state
            .accounts
            .get(&uid)
            .map(|account| account.email.clone())
            .ok_or_else(|| BackendError::Rejected("USER_NOT_FOUND".to_string()))?;
        state.outbox.push((OutboundEmail::Verification, email));
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError> {
        let mut state = self.state()?;
        if !state.accounts.values().any(|account| account.email == email) {
            return Err(BackendError::Rejected("EMAIL_NOT_FOUND".to_string()));
        }
        state.outbox.push((OutboundEmail::PasswordReset, email.to_string()));
        Ok(())
    }

    async fn update_profile(&self, id_token: &str, changes: &ProfileChanges) -> Result<Option<String>, BackendError> {
        let mut state = self.state()?;
        let uid = Self::uid_for_token(&state, id_token)?;

        if let Some(email) = &changes.email {
            if state
                .accounts
                .iter()
                .any(|(other, account)| other != &uid && &account.email == email)
            {
                return Err(BackendError::Rejected("EMAIL_EXISTS".to_string()));
            }
        }

        let account = state
            .accounts
            .get_mut(&uid)
            .ok_or_else(|| BackendError::Rejected("USER_NOT_FOUND".to_string()))?;
        if let Some(name) = &changes.display_name {
            account.display_name = Some(name.clone());
        }
        if let Some(email) = &changes.email {
            account.email = email.clone();
        }
        Ok(None)
    }

    async fn sign_out(&self, id_token: &str) -> Result<(), BackendError> {
        let mut state = self.state()?;
        state.tokens.remove(id_token);
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> Result<(), BackendError> {
        let mut state = self.state()?;
        if state.accounts.remove(uid).is_none() {
            return Err(BackendError::NotFound(format!("account {}", uid)));
        }
        state.tokens.retain(|_, owner| owner != uid);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredBlob, BackendError> {
        let mut state = self.state()?;
        state.blobs.insert(
            path.to_string(),
            Blob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredBlob {
            path: path.to_string(),
            download_url: format!("{}{}", BLOB_URL_PREFIX, path),
        })
    }

    async fn download_url(&self, reference: &str) -> Result<String, BackendError> {
        let state = self.state()?;
        let path = blob_path(reference);
        if !state.blobs.contains_key(path) {
            return Err(BackendError::NotFound(path.to_string()));
        }
        Ok(format!("{}{}", BLOB_URL_PREFIX, path))
    }

    async fn delete(&self, reference: &str) -> Result<(), BackendError> {
        let mut state = self.state()?;
        let path = blob_path(reference);
        state
            .blobs
            .remove(path)
            .map(|blob| debug!(path, size = blob.bytes.len(), content_type = %blob.content_type, "Deleted blob"))
            .ok_or_else(|| BackendError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_documents_keep_insertion_order() {
        let store = MemoryBackend::new();
        let first = store.insert("users", fields(json!({"name": "Ana"}))).await.unwrap();
        let second = store.insert("users", fields(json!({"name": "Luis"}))).await.unwrap();

        let documents = store.list("users").await.unwrap();
        let ids: Vec<_> = documents.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing_document() {
        let store = MemoryBackend::new();
        let id = store
            .insert("users", fields(json!({"name": "Ana", "email": "ana@x.com"})))
            .await
            .unwrap();

        store.update("users", &id, fields(json!({"name": "Ana María"}))).await.unwrap();
        let document = store.get("users", &id).await.unwrap().unwrap();
        assert_eq!(document.fields["name"], "Ana María");
        assert_eq!(document.fields["email"], "ana@x.com");

        let missing = store.update("users", "nope", Fields::new()).await;
        assert!(matches!(missing, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_put_restores_deleted_document_under_same_id() {
        let store = MemoryBackend::new();
        let id = store.insert("users", fields(json!({"name": "Ana"}))).await.unwrap();
        let document = store.get("users", &id).await.unwrap().unwrap();

        DocumentStore::delete(&store, "users", &id).await.unwrap();
        assert!(store.get("users", &id).await.unwrap().is_none());

        store.put("users", &id, document.fields.clone()).await.unwrap();
        assert_eq!(store.get("users", &id).await.unwrap(), Some(document));
    }

    #[tokio::test]
    async fn test_query_eq_matches_field() {
        let store = MemoryBackend::new();
        store.insert("users", fields(json!({"uid": "a"}))).await.unwrap();
        store.insert("users", fields(json!({"uid": "b"}))).await.unwrap();

        let found = store.query_eq("users", "uid", &json!("b")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fields["uid"], "b");
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let store = MemoryBackend::new();
        let account = store.create_account("ana@x.com", "secret1").await.unwrap();

        let signed_in = store.sign_in("ana@x.com", "secret1").await.unwrap();
        assert_eq!(signed_in.uid, account.uid);

        let wrong = store.sign_in("ana@x.com", "nope").await.unwrap_err();
        assert_eq!(wrong.rejection_code(), Some("INVALID_PASSWORD"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryBackend::new();
        store.create_account("ana@x.com", "secret1").await.unwrap();

        let error = store.create_account("ana@x.com", "secret2").await.unwrap_err();
        assert_eq!(error.rejection_code(), Some("EMAIL_EXISTS"));
    }

    #[tokio::test]
    async fn test_email_verification_flow() {
        let store = MemoryBackend::new();
        let account = store.create_account("ana@x.com", "secret1").await.unwrap();
        assert!(!store.lookup(&account.id_token).await.unwrap().email_verified);

        store.send_email_verification(&account.id_token).await.unwrap();
        assert_eq!(
            store.sent_emails(),
            vec![(OutboundEmail::Verification, "ana@x.com".to_string())]
        );

        store.verify_email("ana@x.com").unwrap();
        assert!(store.lookup(&account.id_token).await.unwrap().email_verified);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let store = MemoryBackend::new().with_auto_verify();
        let account = store.create_account("ana@x.com", "secret1").await.unwrap();

        store.sign_out(&account.id_token).await.unwrap();
        assert!(store.lookup(&account.id_token).await.is_err());
    }

    #[tokio::test]
    async fn test_blob_reference_accepts_url_or_path() {
        let store = MemoryBackend::new();
        let blob = store
            .upload("profileImages/a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        assert_eq!(store.download_url("profileImages/a.png").await.unwrap(), blob.download_url);
        BlobStore::delete(&store, &blob.download_url).await.unwrap();
        assert!(!store.blob_exists("profileImages/a.png"));
        assert!(BlobStore::delete(&store, &blob.download_url)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
