use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::backend::{BackendError, Document, DocumentStore, Fields};
use crate::models::{NewUser, Role, User, UserChanges};

/// Repository error types
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("User not found")]
    NotFound,

    #[error("Duplicate email: {0}")]
    DuplicateEmail(String),

    #[error("Malformed user document {0}: {1}")]
    Decode(String, String),
}

/// Record accessors for the users collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Every user, in backend order
    async fn fetch_all(&self) -> Result<Vec<User>, RepositoryError>;

    /// Point lookup; `None` when no record has this id
    async fn fetch_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    /// Record linked to an identity account
    async fn find_by_uid(&self, uid: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Insert a record; fails with `DuplicateEmail` if the email is taken
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError>;

    /// Merge the given changes, leaving other fields untouched
    async fn update(&self, id: &str, changes: &UserChanges) -> Result<User, RepositoryError>;

    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// Write a previously deleted record back under its former id
    async fn restore(&self, user: &User) -> Result<(), RepositoryError>;
}

/// Stored shape of a user document. Every field is optional on read so
/// records written by older versions still decode.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
    name: Option<String>,
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_image_url: Option<String>,
}

impl UserDocument {
    fn into_user(self, id: String) -> User {
        User {
            id,
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            role: Role::from_stored(self.role.as_deref()),
            profile_image_url: self.profile_image_url.filter(|url| !url.is_empty()),
            uid: self.uid.filter(|uid| !uid.is_empty()),
        }
    }

    fn to_fields(&self) -> Result<Fields, RepositoryError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(RepositoryError::Decode(String::new(), format!("unexpected shape: {}", other))),
            Err(e) => Err(RepositoryError::Decode(String::new(), e.to_string())),
        }
    }
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            role: Some(user.role.as_str().to_string()),
            profile_image_url: user.profile_image_url.clone(),
        }
    }
}

fn decode(document: Document) -> Result<User, RepositoryError> {
    let Document { id, fields } = document;
    let stored: UserDocument = serde_json::from_value(Value::Object(fields))
        .map_err(|e| RepositoryError::Decode(id.clone(), e.to_string()))?;
    Ok(stored.into_user(id))
}

fn changes_to_fields(changes: &UserChanges) -> Fields {
    let mut fields = Fields::new();
    if let Some(name) = &changes.name {
        fields.insert("name".to_string(), Value::from(name.trim()));
    }
    if let Some(email) = &changes.email {
        fields.insert("email".to_string(), Value::from(normalize_email(email)));
    }
    if let Some(role) = &changes.role {
        fields.insert("role".to_string(), Value::from(role.as_str()));
    }
    if let Some(url) = &changes.profile_image_url {
        fields.insert(
            "profileImageUrl".to_string(),
            url.clone().map(Value::from).unwrap_or(Value::Null),
        );
    }
    fields
}

/// Emails are compared case-insensitively, the way the identity service does
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `UserRepository` over the backend document store
pub struct BackendUserRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl BackendUserRepository {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    async fn find_one(&self, field: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let matches = self
            .store
            .query_eq(&self.collection, field, &Value::from(value))
            .await?;

        if matches.len() > 1 {
            warn!(field, count = matches.len(), "Several user records share a unique field");
        }

        match matches.into_iter().next() {
            Some(document) => decode(document).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserRepository for BackendUserRepository {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Vec<User>, RepositoryError> {
        let documents = self.store.list(&self.collection).await?;
        let users = documents.into_iter().map(decode).collect::<Result<Vec<_>, _>>()?;

        info!("Retrieved {} users", users.len());
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn fetch_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let user = match self.store.get(&self.collection, id).await? {
            Some(document) => Some(decode(document)?),
            None => None,
        };

        match &user {
            Some(u) => info!("Found user with ID: {} ({})", id, u.email),
            None => info!("User not found with ID: {}", id),
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_uid(&self, uid: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("uid", uid).await
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("email", &normalize_email(email)).await
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        info!("Creating new user with email: {}", user.email);

        let email = normalize_email(&user.email);
        if self.find_by_email(&email).await?.is_some() {
            warn!("Refusing to create user with taken email: {}", email);
            return Err(RepositoryError::DuplicateEmail(email));
        }

        let stored = UserDocument {
            uid: user.uid.clone(),
            name: Some(user.name.trim().to_string()),
            email: Some(email),
            role: Some(user.role.as_str().to_string()),
            profile_image_url: user.profile_image_url.clone(),
        };
        let fields = stored.to_fields()?;
        let id = self.store.insert(&self.collection, fields).await?;

        info!("Successfully created user with ID: {}", id);
        Ok(stored.into_user(id))
    }

    #[instrument(skip(self, changes), fields(user_id = %id))]
    async fn update(&self, id: &str, changes: &UserChanges) -> Result<User, RepositoryError> {
        info!("Updating user with ID: {}", id);

        if let Some(email) = &changes.email {
            if let Some(owner) = self.find_by_email(email).await? {
                if owner.id != id {
                    return Err(RepositoryError::DuplicateEmail(normalize_email(email)));
                }
            }
        }

        let fields = changes_to_fields(changes);
        if !fields.is_empty() {
            self.store
                .update(&self.collection, id, fields)
                .await
                .map_err(|e| match e {
                    BackendError::NotFound(_) => RepositoryError::NotFound,
                    other => RepositoryError::Backend(other),
                })?;
        }

        let user = self.fetch_by_id(id).await?.ok_or(RepositoryError::NotFound)?;
        info!("Successfully updated user with ID: {}", id);
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.store.delete(&self.collection, id).await?;
        info!("Deleted user document with ID: {}", id);
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn restore(&self, user: &User) -> Result<(), RepositoryError> {
        let fields = UserDocument::from(user).to_fields()?;
        self.store.put(&self.collection, &user.id, fields).await?;
        info!("Restored user document with ID: {}", user.id);
        Ok(())
    }
}
