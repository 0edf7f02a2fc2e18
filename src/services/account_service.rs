use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::user_service::account_creation_error;
use super::{validate, ServiceError};
use crate::backend::{BackendError, BlobStore, IdentityProvider, ProfileChanges};
use crate::models::{
    ForgotPasswordForm, NewUser, ProfileUpdate, Role, SessionUser, SignInForm, SignUpForm, User, UserChanges,
};
use crate::repository::{normalize_email, UserRepository};

/// Result of a profile update: the stored record and the refreshed session
#[derive(Debug, Clone)]
pub struct ProfileOutcome {
    pub user: User,
    pub session: SessionUser,
}

/// Self-service account operations: registration, sign-in and profile
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn sign_up(&self, form: SignUpForm) -> Result<User, ServiceError>;
    async fn sign_in(&self, form: SignInForm) -> Result<SessionUser, ServiceError>;
    /// Sign-in that additionally requires the administrator role
    async fn sign_in_admin(&self, form: SignInForm) -> Result<SessionUser, ServiceError>;
    async fn sign_out(&self, session: &SessionUser) -> Result<(), ServiceError>;
    async fn forgot_password(&self, form: ForgotPasswordForm) -> Result<(), ServiceError>;
    /// The signed-in user's record with the avatar resolved to a download URL
    async fn profile(&self, session: &SessionUser) -> Result<User, ServiceError>;
    async fn update_profile(&self, session: &SessionUser, update: ProfileUpdate) -> Result<ProfileOutcome, ServiceError>;
}

pub struct AccountServiceImpl {
    repository: Arc<dyn UserRepository>,
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
}

impl AccountServiceImpl {
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

    async fn replace_avatar(&self, user: &User, update: &ProfileUpdate) -> Result<User, ServiceError> {
        let previous = user.profile_image_url.clone();

        let current = if let Some(image) = &update.image {
            let path = avatar_path(&image.file_name, chrono::Utc::now().timestamp_millis());
            let blob = self
                .blobs
                .upload(&path, image.bytes.clone(), &image.content_type)
                .await?;
            info!(path = %blob.path, "Stored new avatar");

            let changes = UserChanges {
                profile_image_url: Some(Some(blob.download_url)),
                ..UserChanges::default()
            };
            self.repository.update(&user.id, &changes).await?
        } else if update.remove_image && previous.is_some() {
            let changes = UserChanges {
                profile_image_url: Some(None),
                ..UserChanges::default()
            };
            self.repository.update(&user.id, &changes).await?
        } else {
            return Ok(user.clone());
        };

        if let Some(old) = previous {
            match self.blobs.delete(&old).await {
                Ok(()) => info!("Deleted previous avatar"),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(blob = %old, error = %e, "Previous avatar left orphaned"),
            }
        }

        Ok(current)
    }
}

/// Storage path for an uploaded avatar: `Avatar/{millis}_{file name}`
pub fn avatar_path(file_name: &str, millis: i64) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_matches('.');

    if safe.is_empty() {
        format!("Avatar/{}_avatar", millis)
    } else {
        format!("Avatar/{}_{}", millis, safe)
    }
}

#[async_trait]
impl AccountService for AccountServiceImpl {
    #[instrument(skip(self, form), fields(email = %form.email))]
    async fn sign_up(&self, form: SignUpForm) -> Result<User, ServiceError> {
        if !form.passwords_match() {
            return Err(ServiceError::Validation("Las contraseñas no coinciden".to_string()));
        }
        validate(&form)?;

        if self.repository.find_by_email(&form.email).await?.is_some() {
            return Err(ServiceError::AlreadyExists(normalize_email(&form.email)));
        }

        let account = self
            .identity
            .create_account(&normalize_email(&form.email), &form.password)
            .await
            .map_err(|e| account_creation_error(&form.email, e))?;

        if let Err(e) = self.identity.send_email_verification(&account.id_token).await {
            warn!(uid = %account.uid, error = %e, "Could not send verification email");
        }

        let new_user = NewUser::new(form.name, form.email).with_uid(account.uid.clone());
        match self.repository.create(&new_user).await {
            Ok(user) => {
                info!(user_id = %user.id, uid = %account.uid, "Registered user");
                Ok(user)
            }
            Err(e) => {
                if let Err(cleanup) = self.identity.delete_account(&account.uid).await {
                    tracing::error!(
                        uid = %account.uid,
                        error = %cleanup,
                        "Identity account left without a user record"
                    );
                }
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, form), fields(email = %form.email))]
    async fn sign_in(&self, form: SignInForm) -> Result<SessionUser, ServiceError> {
        validate(&form)?;

        let account = self
            .identity
            .sign_in(&normalize_email(&form.email), &form.password)
            .await
            .map_err(|e| match e {
                BackendError::Rejected(code) => {
                    info!(code = %code, "Sign-in rejected");
                    ServiceError::InvalidCredentials
                }
                other => ServiceError::Backend(other),
            })?;

        let info = self.identity.lookup(&account.id_token).await?;
        if !info.email_verified {
            return Err(ServiceError::EmailNotVerified);
        }

        let record = match self.repository.find_by_uid(&account.uid).await? {
            Some(record) => Some(record),
            None => self.repository.find_by_email(&account.email).await?,
        };

        let (name, role) = match record {
            Some(record) => (record.name, record.role),
            None => (
                info.display_name.unwrap_or_else(|| account.email.clone()),
                Role::Regular,
            ),
        };

        info!(uid = %account.uid, role = %role, "Signed in");
        Ok(SessionUser {
            uid: account.uid,
            email: account.email,
            name,
            role,
            id_token: account.id_token,
        })
    }

    async fn sign_in_admin(&self, form: SignInForm) -> Result<SessionUser, ServiceError> {
        let session = self.sign_in(form).await?;
        if !session.is_admin() {
            warn!(uid = %session.uid, "Non-admin attempted admin sign-in");
            self.sign_out(&session).await?;
            return Err(ServiceError::Forbidden);
        }
        Ok(session)
    }

    async fn sign_out(&self, session: &SessionUser) -> Result<(), ServiceError> {
        self.identity.sign_out(&session.id_token).await?;
        info!(uid = %session.uid, "Signed out");
        Ok(())
    }

    #[instrument(skip(self, form), fields(email = %form.email))]
    async fn forgot_password(&self, form: ForgotPasswordForm) -> Result<(), ServiceError> {
        validate(&form)?;

        match self.identity.send_password_reset(&normalize_email(&form.email)).await {
            Ok(()) => Ok(()),
            // Unknown addresses look the same as known ones to the requester
            Err(BackendError::Rejected(code)) if code == "EMAIL_NOT_FOUND" => {
                info!("Password reset requested for unknown email");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, session), fields(uid = %session.uid))]
    async fn profile(&self, session: &SessionUser) -> Result<User, ServiceError> {
        let mut user = self
            .repository
            .find_by_uid(&session.uid)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if let Some(reference) = user.profile_image_url.take() {
            user.profile_image_url = match self.blobs.download_url(&reference).await {
                Ok(url) => Some(url),
                Err(e) if e.is_not_found() => None,
                Err(e) => {
                    warn!(error = %e, "Could not resolve avatar URL");
                    Some(reference)
                }
            };
        }

        Ok(user)
    }

    #[instrument(skip(self, session, update), fields(uid = %session.uid))]
    async fn update_profile(&self, session: &SessionUser, update: ProfileUpdate) -> Result<ProfileOutcome, ServiceError> {
        validate(&update)?;
        if let Some(image) = &update.image {
            if !image.content_type.starts_with("image/") {
                return Err(ServiceError::Validation("El archivo debe ser una imagen".to_string()));
            }
        }

        let record = self
            .repository
            .find_by_uid(&session.uid)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let email = normalize_email(&update.email);
        let email_changed = email != record.email;
        let changes = UserChanges {
            name: Some(update.name.clone()),
            email: Some(email.clone()),
            ..UserChanges::default()
        };
        let user = self.repository.update(&record.id, &changes).await?;

        let profile = ProfileChanges {
            display_name: Some(user.name.clone()),
            email: email_changed.then(|| email.clone()),
        };
        let refreshed_token = match self.identity.update_profile(&session.id_token, &profile).await {
            Ok(token) => token,
            Err(e) => {
                let revert = UserChanges {
                    name: Some(record.name.clone()),
                    email: Some(record.email.clone()),
                    ..UserChanges::default()
                };
                if let Err(revert_error) = self.repository.update(&record.id, &revert).await {
                    tracing::error!(
                        user_id = %record.id,
                        error = %revert_error,
                        "User record and identity profile disagree"
                    );
                }
                return Err(match e.rejection_code() {
                    Some("EMAIL_EXISTS") => ServiceError::AlreadyExists(email),
                    _ => ServiceError::Backend(e),
                });
            }
        };

        let user = self.replace_avatar(&user, &update).await?;

        let session = SessionUser {
            uid: session.uid.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            id_token: refreshed_token.unwrap_or_else(|| session.id_token.clone()),
        };

        info!(user_id = %user.id, "Profile updated");
        Ok(ProfileOutcome { user, session })
    }
}
