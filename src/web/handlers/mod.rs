pub mod auth_handlers;
pub mod crud_handlers;
pub mod export_handlers;
pub mod health_handlers;
pub mod metrics_handlers;
pub mod profile_handlers;
