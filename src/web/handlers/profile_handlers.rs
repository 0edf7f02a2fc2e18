use axum::{
    extract::{multipart::Field, Multipart, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{CookieJar, PrivateCookieJar};

use super::auth_handlers::PROFILE_PATH;
use crate::models::{AvatarUpload, ProfileUpdate};
use crate::services::AppState;
use crate::web::extractors::{store_session, CurrentUser};
use crate::web::responses::{set_flash, take_flash, AppError, Flash, FormReply, FormResultExt};
use crate::web::templates::{self, PageChrome};

/// Multipart field carrying the new avatar
pub const IMAGE_FIELD: &str = "profileImage";

pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let user = state.account_service().profile(&session).await?;

    let (jar, flash) = take_flash(jar);
    let page = templates::page(
        "users/profile.html",
        PageChrome {
            title: "Mi perfil",
            user: Some(&session),
            flash,
        },
        minijinja::context! { profile => user },
    );
    Ok((jar, page).into_response())
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Formulario inválido: {}", e.body_text())))
}

/// Decode the profile form: `name`, `email`, optional `profileImage` file
/// and an optional `remove_image` checkbox
pub async fn read_profile_form(mut multipart: Multipart) -> Result<ProfileUpdate, AppError> {
    let mut update = ProfileUpdate::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Formulario inválido: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => update.name = field_text(field).await?,
            "email" => update.email = field_text(field).await?,
            "remove_image" => {
                let value = field_text(field).await?;
                update.remove_image = matches!(value.as_str(), "on" | "true" | "1");
            }
            IMAGE_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("No se pudo leer la imagen: {}", e.body_text())))?;

                // browsers send an empty part when no file was chosen
                if !file_name.is_empty() && !bytes.is_empty() {
                    update.image = Some(AvatarUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(update)
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    private: PrivateCookieJar,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, FormReply> {
    let update = read_profile_form(multipart).await.or_back_to(PROFILE_PATH)?;
    let outcome = state
        .account_service()
        .update_profile(&session, update)
        .await
        .or_back_to(PROFILE_PATH)?;

    let private = store_session(private, &state.config.session, &outcome.session).or_back_to(PROFILE_PATH)?;
    let jar = set_flash(jar, &Flash::success("Perfil actualizado correctamente"));

    Ok((private, jar, Redirect::to(PROFILE_PATH)).into_response())
}
