use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::backend::{Backend, BackendError};
use crate::config::{AppConfig, SeedAccount};
use crate::metrics::AppMetrics;
use crate::models::{NewUser, Role, UserChanges};
use crate::repository::{BackendUserRepository, UserRepository};
use crate::services::{AccountService, AccountServiceImpl, ServiceError, UserService, UserServiceImpl};

/// Service container for dependency injection
///
/// Wires the backend capabilities into the repository and service layers.
/// Everything is held behind `Arc<dyn …>` so tests can swap implementations.
#[derive(Clone)]
pub struct ServiceContainer {
    backend: Backend,

    // Repository layer
    user_repository: Arc<dyn UserRepository>,

    // Service layer
    user_service: Arc<dyn UserService>,
    account_service: Arc<dyn AccountService>,
}

impl ServiceContainer {
    /// Build the container over an already constructed backend
    pub fn from_backend(backend: Backend, users_collection: &str) -> Self {
        let user_repository: Arc<dyn UserRepository> =
            Arc::new(BackendUserRepository::new(backend.documents.clone(), users_collection));

        let user_service = Arc::new(UserServiceImpl::new(
            user_repository.clone(),
            backend.identity.clone(),
            backend.blobs.clone(),
        ));

        let account_service = Arc::new(AccountServiceImpl::new(
            user_repository.clone(),
            backend.identity.clone(),
            backend.blobs.clone(),
        ));

        Self {
            backend,
            user_repository,
            user_service,
            account_service,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn user_service(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    pub fn account_service(&self) -> Arc<dyn AccountService> {
        self.account_service.clone()
    }

    /// Get user repository instance (for advanced use cases)
    pub fn user_repository(&self) -> Arc<dyn UserRepository> {
        self.user_repository.clone()
    }

    /// Make sure the configured administrator can sign in to the panel.
    /// Existing accounts and records are reused; a record found by email is
    /// promoted to admin.
    pub async fn seed_admin(&self, seed: &SeedAccount) -> Result<(), ServiceError> {
        let uid = match self.backend.identity.create_account(&seed.email, &seed.password).await {
            Ok(account) => {
                info!(email = %seed.email, "Created seed admin identity account");
                Some(account.uid)
            }
            Err(BackendError::Rejected(code)) if code == "EMAIL_EXISTS" => None,
            Err(e) => return Err(e.into()),
        };

        match self.user_repository.find_by_email(&seed.email).await? {
            Some(user) if user.is_admin() => {}
            Some(user) => {
                warn!(user_id = %user.id, "Promoting seed account to admin");
                let changes = UserChanges {
                    role: Some(Role::Admin),
                    ..UserChanges::default()
                };
                self.user_repository.update(&user.id, &changes).await?;
            }
            None => {
                let mut new_user = NewUser::new(seed.name.clone(), seed.email.clone()).with_role(Role::Admin);
                new_user.uid = uid;
                let user = self.user_repository.create(&new_user).await?;
                info!(user_id = %user.id, "Created seed admin record");
            }
        }

        Ok(())
    }
}

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub services: ServiceContainer,
    pub config: Arc<AppConfig>,
    pub metrics: AppMetrics,
    /// Encryption key of the session cookie
    pub key: Key,
    pub started_at: Instant,
}

impl AppState {
    /// Build the state with the backend selected by the configuration
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let backend = Backend::from_config(&config.backend)?;
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: AppConfig, backend: Backend) -> anyhow::Result<Self> {
        let services = ServiceContainer::from_backend(backend, &config.backend.users_collection);
        let metrics = AppMetrics::new()?;
        let key = session_key(&config.session.secret);

        Ok(Self {
            services,
            config: Arc::new(config),
            metrics,
            key,
            started_at: Instant::now(),
        })
    }

    pub fn user_service(&self) -> Arc<dyn UserService> {
        self.services.user_service()
    }

    pub fn account_service(&self) -> Arc<dyn AccountService> {
        self.services.account_service()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

fn session_key(secret: &str) -> Key {
    if secret.is_empty() {
        warn!("No session secret configured; sessions will not survive a restart");
        return Key::generate();
    }

    match Key::try_from(secret.as_bytes()) {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Unusable session secret; falling back to a random key");
            Key::generate()
        }
    }
}
