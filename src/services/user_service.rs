use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::saga::SagaReport;
use super::{listing, validate, ServiceError};
use crate::backend::{BackendError, BlobStore, IdentityProvider};
use crate::models::{CreateUserForm, EditUserForm, NewUser, PageRequest, PageResult, User, UserChanges};
use crate::repository::UserRepository;

const STEP_DOCUMENT: &str = "document";
const STEP_IDENTITY: &str = "identity_account";
const STEP_AVATAR: &str = "avatar_blob";

/// Admin panel operations over the users collection
#[async_trait]
pub trait UserService: Send + Sync {
    async fn list_users(&self, request: &PageRequest) -> Result<PageResult<User>, ServiceError>;
    async fn get_user(&self, id: &str) -> Result<User, ServiceError>;
    async fn create_user(&self, form: CreateUserForm) -> Result<User, ServiceError>;
    async fn update_user(&self, id: &str, form: EditUserForm) -> Result<User, ServiceError>;
    /// Cascading delete of the record, its identity account and its avatar
    async fn delete_user(&self, id: &str) -> Result<SagaReport, ServiceError>;
    /// Full record set for the report exporters
    async fn export_users(&self) -> Result<Vec<User>, ServiceError>;
}

/// User service implementation
pub struct UserServiceImpl {
    repository: Arc<dyn UserRepository>,
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
}

impl UserServiceImpl {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            repository,
            identity,
            blobs,
        }
    }
}

/// Map identity-service rejections on account creation to user-facing errors
pub(crate) fn account_creation_error(email: &str, error: BackendError) -> ServiceError {
    match error.rejection_code() {
        Some("EMAIL_EXISTS") => ServiceError::AlreadyExists(email.to_string()),
        Some("WEAK_PASSWORD") => {
            ServiceError::Validation("La contraseña debe tener al menos 6 caracteres".to_string())
        }
        Some("INVALID_EMAIL") => ServiceError::Validation("El correo electrónico no es válido".to_string()),
        _ => ServiceError::Backend(error),
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    #[instrument(skip(self))]
    async fn list_users(&self, request: &PageRequest) -> Result<PageResult<User>, ServiceError> {
        let users = self.repository.fetch_all().await?;
        Ok(listing::page(users, request))
    }

    async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        self.repository.fetch_by_id(id).await?.ok_or(ServiceError::NotFound)
    }

    #[instrument(skip(self, form), fields(email = %form.email))]
    async fn create_user(&self, form: CreateUserForm) -> Result<User, ServiceError> {
        validate(&form)?;

        if self.repository.find_by_email(&form.email).await?.is_some() {
            return Err(ServiceError::AlreadyExists(form.email));
        }

        let mut new_user = NewUser::new(form.name, form.email).with_role(form.role.unwrap_or_default());

        let account = match &form.password {
            Some(password) => {
                let account = self
                    .identity
                    .create_account(&new_user.email, password)
                    .await
                    .map_err(|e| account_creation_error(&new_user.email, e))?;
                new_user.uid = Some(account.uid.clone());
                Some(account)
            }
            None => None,
        };

        match self.repository.create(&new_user).await {
            Ok(user) => {
                if let Some(account) = account {
                    if let Err(e) = self.identity.send_email_verification(&account.id_token).await {
                        warn!(uid = %account.uid, error = %e, "Could not send verification email");
                    }
                }
                info!(user_id = %user.id, "Created user from admin panel");
                Ok(user)
            }
            Err(e) => {
                // The account must not outlive a record that was never written
                if let Some(account) = account {
                    match self.identity.delete_account(&account.uid).await {
                        Ok(()) => info!(uid = %account.uid, "Removed identity account of failed create"),
                        Err(cleanup) => tracing::error!(
                            uid = %account.uid,
                            error = %cleanup,
                            "Identity account left without a user record"
                        ),
                    }
                }
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, form))]
    async fn update_user(&self, id: &str, form: EditUserForm) -> Result<User, ServiceError> {
        validate(&form)?;
        let user = self.repository.update(id, &UserChanges::from(form)).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: &str) -> Result<SagaReport, ServiceError> {
        let user = self.repository.fetch_by_id(id).await?.ok_or(ServiceError::NotFound)?;
        let mut report = SagaReport::new("delete_user", id);

        // Nothing has changed yet, so a failure here is a plain error
        self.repository.delete(id).await?;
        report.step_completed(STEP_DOCUMENT);

        if let Some(uid) = &user.uid {
            match self.identity.delete_account(uid).await {
                Ok(()) => report.step_completed(STEP_IDENTITY),
                Err(e) if e.is_not_found() => report.step_completed(STEP_IDENTITY),
                Err(e) => {
                    report.step_failed(STEP_IDENTITY, &e);
                    match self.repository.restore(&user).await {
                        Ok(()) => report.compensated(STEP_DOCUMENT),
                        Err(restore) => {
                            warn!(error = %restore, "Could not restore deleted user record");
                            report.inconsistent(format!("identity account {} without user record", uid));
                        }
                    }
                    return Ok(report.finish());
                }
            }
        }

        if let Some(url) = &user.profile_image_url {
            match self.blobs.delete(url).await {
                Ok(()) => report.step_completed(STEP_AVATAR),
                Err(e) if e.is_not_found() => report.step_completed(STEP_AVATAR),
                Err(e) => {
                    report.step_failed(STEP_AVATAR, &e);
                    report.inconsistent(format!("orphaned avatar blob {}", url));
                }
            }
        }

        Ok(report.finish())
    }

    async fn export_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.repository.fetch_all().await?)
    }
}
