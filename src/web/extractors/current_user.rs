use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};
use std::convert::Infallible;

use super::session::read_session;
use crate::models::SessionUser;
use crate::services::{AppState, ServiceError};
use crate::web::responses::AppError;

pub const SIGNIN_PATH: &str = "/users/signin";
pub const ADMIN_SIGNIN_PATH: &str = "/users/signinAdmin";

/// Signed-in user; anonymous requests are sent to the sign-in page
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

/// Signed-in administrator; anonymous requests are sent to the admin
/// sign-in page and regular users get a 403
#[derive(Debug, Clone)]
pub struct AdminUser(pub SessionUser);

async fn session_from_parts(parts: &mut Parts, state: &AppState) -> Option<SessionUser> {
    let jar: Result<PrivateCookieJar<Key>, Infallible> = PrivateCookieJar::from_request_parts(parts, state).await;
    jar.ok().and_then(|jar| read_session(&jar, &state.config.session))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_from_parts(parts, state)
            .await
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to(SIGNIN_PATH))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = session_from_parts(parts, state)
            .await
            .ok_or_else(|| Redirect::to(ADMIN_SIGNIN_PATH).into_response())?;

        if user.is_admin() && still_admin(state, &user).await.map_err(IntoResponse::into_response)? {
            return Ok(AdminUser(user));
        }

        tracing::warn!(uid = %user.uid, path = %parts.uri.path(), "Non-admin denied");
        Err(AppError::Forbidden.into_response())
    }
}

/// The role in the cookie dates from sign-in; the stored record decides
async fn still_admin(state: &AppState, user: &SessionUser) -> Result<bool, AppError> {
    let repository = state.services.user_repository();
    let record = match repository.find_by_uid(&user.uid).await.map_err(ServiceError::from)? {
        Some(record) => Some(record),
        None => repository.find_by_email(&user.email).await.map_err(ServiceError::from)?,
    };
    Ok(record.is_some_and(|record| record.is_admin()))
}

/// Session user when present; never rejects
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<SessionUser>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(session_from_parts(parts, state).await))
    }
}
