use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use super::flash::{set_flash, Flash};
use crate::export::ExportError;
use crate::services::ServiceError;
use crate::web::templates::{self, PageChrome};

const GENERIC_ERROR: &str = "Ocurrió un error inesperado. Intenta de nuevo más tarde.";

/// Application error type that can be converted to HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Session encoding error: {0}")]
    Session(#[from] serde_json::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Administrator role required")]
    Forbidden,
}

impl AppError {
    /// Turn the error into a redirect back to the form that caused it
    pub fn back_to(self, path: impl Into<String>) -> FormReply {
        FormReply {
            redirect_to: path.into(),
            error: self,
        }
    }

    /// Failures the user can correct by resubmitting
    pub fn is_user_facing(&self) -> bool {
        match self {
            AppError::Service(e) => e.is_user_facing(),
            AppError::BadRequest(_) => true,
            _ => false,
        }
    }

    /// Spanish message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            AppError::Service(ServiceError::Validation(msg)) => msg.clone(),
            AppError::Service(ServiceError::AlreadyExists(email)) => {
                format!("El correo {} ya está registrado", email)
            }
            AppError::Service(ServiceError::InvalidCredentials) => "Correo o contraseña incorrectos".to_string(),
            AppError::Service(ServiceError::EmailNotVerified) => {
                "Debes verificar tu correo electrónico antes de iniciar sesión".to_string()
            }
            AppError::Service(ServiceError::Forbidden) | AppError::Forbidden => {
                "No tienes permisos de administrador".to_string()
            }
            AppError::Service(ServiceError::NotFound) => "Usuario no encontrado".to_string(),
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            _ => GENERIC_ERROR.to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Service(ServiceError::NotFound) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Service(ServiceError::Forbidden) | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Service(ServiceError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            error if error.is_user_facing() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
            sentry::capture_error(&self);
        }

        templates::page_with_status(
            status,
            "error.html",
            PageChrome {
                title: "Error",
                ..PageChrome::default()
            },
            minijinja::context! {
                status => status.as_u16(),
                message => self.user_message(),
            },
        )
    }
}

/// Outcome of a failed form submission: correctable errors go back to the
/// form as a flash message, everything else renders the error page
#[derive(Debug)]
pub struct FormReply {
    redirect_to: String,
    error: AppError,
}

impl IntoResponse for FormReply {
    fn into_response(self) -> Response {
        if !self.error.is_user_facing() {
            return self.error.into_response();
        }

        tracing::info!(redirect_to = %self.redirect_to, error = %self.error, "Form rejected");
        let jar = set_flash(CookieJar::new(), &Flash::error(self.error.user_message()));
        (jar, Redirect::to(&self.redirect_to)).into_response()
    }
}

/// Attach the originating form to a fallible result
pub trait FormResultExt<T> {
    fn or_back_to(self, path: &str) -> Result<T, FormReply>;
}

impl<T, E: Into<AppError>> FormResultExt<T> for Result<T, E> {
    fn or_back_to(self, path: &str) -> Result<T, FormReply> {
        self.map_err(|e| e.into().back_to(path))
    }
}
