use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{CookieJar, PrivateCookieJar};
use tracing::warn;

use crate::models::{ForgotPasswordForm, SessionUser, SignInForm, SignUpForm};
use crate::services::AppState;
use crate::web::extractors::{clear_session, read_session, store_session, OptionalUser, ADMIN_SIGNIN_PATH, SIGNIN_PATH};
use crate::web::responses::{set_flash, take_flash, Flash, FormReply, FormResultExt};
use crate::web::templates::{self, PageChrome};

pub const SIGNUP_PATH: &str = "/users/signup";
pub const PROFILE_PATH: &str = "/users/profile";
pub const PANEL_PATH: &str = "/usuarios";
const FORGOT_PATH: &str = "/users/forgot-password";
const FORGOT_ADMIN_PATH: &str = "/users/forgot-Admin";

fn form_page(jar: CookieJar, user: Option<&SessionUser>, template: &str, title: &str) -> Response {
    let (jar, flash) = take_flash(jar);
    let page = templates::page(template, PageChrome { title, user, flash }, ());
    (jar, page).into_response()
}

pub async fn signup_form(jar: CookieJar, OptionalUser(user): OptionalUser) -> Response {
    form_page(jar, user.as_ref(), "users/signup.html", "Registro")
}

pub async fn signup(State(state): State<AppState>, jar: CookieJar, Form(form): Form<SignUpForm>) -> Result<Response, FormReply> {
    state.account_service().sign_up(form).await.or_back_to(SIGNUP_PATH)?;

    let jar = set_flash(
        jar,
        &Flash::success("Registro exitoso. Revisa tu correo para verificar tu cuenta antes de iniciar sesión."),
    );
    Ok((jar, Redirect::to(SIGNIN_PATH)).into_response())
}

pub async fn signin_form(jar: CookieJar, OptionalUser(user): OptionalUser) -> Response {
    form_page(jar, user.as_ref(), "users/signin.html", "Iniciar sesión")
}

pub async fn signin(
    State(state): State<AppState>,
    private: PrivateCookieJar,
    Form(form): Form<SignInForm>,
) -> Result<Response, FormReply> {
    let session = state.account_service().sign_in(form).await.or_back_to(SIGNIN_PATH)?;
    let private = store_session(private, &state.config.session, &session).or_back_to(SIGNIN_PATH)?;

    Ok((private, Redirect::to(PROFILE_PATH)).into_response())
}

pub async fn signin_admin_form(jar: CookieJar, OptionalUser(user): OptionalUser) -> Response {
    form_page(jar, user.as_ref(), "users/signin_admin.html", "Acceso administrador")
}

pub async fn signin_admin(
    State(state): State<AppState>,
    private: PrivateCookieJar,
    Form(form): Form<SignInForm>,
) -> Result<Response, FormReply> {
    let session = state
        .account_service()
        .sign_in_admin(form)
        .await
        .or_back_to(ADMIN_SIGNIN_PATH)?;
    let private = store_session(private, &state.config.session, &session).or_back_to(ADMIN_SIGNIN_PATH)?;

    Ok((private, Redirect::to(PANEL_PATH)).into_response())
}

pub async fn logout(State(state): State<AppState>, private: PrivateCookieJar) -> Response {
    let redirect_to = match read_session(&private, &state.config.session) {
        Some(session) => {
            if let Err(e) = state.account_service().sign_out(&session).await {
                warn!(uid = %session.uid, error = %e, "Sign-out failed; clearing the session anyway");
            }
            if session.is_admin() {
                ADMIN_SIGNIN_PATH
            } else {
                SIGNIN_PATH
            }
        }
        None => SIGNIN_PATH,
    };

    let private = clear_session(private, &state.config.session);
    (private, Redirect::to(redirect_to)).into_response()
}

pub async fn forgot_password_form(jar: CookieJar, OptionalUser(user): OptionalUser) -> Response {
    let (jar, flash) = take_flash(jar);
    let page = templates::page(
        "users/forgot_password.html",
        PageChrome {
            title: "Recuperar contraseña",
            user: user.as_ref(),
            flash,
        },
        minijinja::context! { action => FORGOT_PATH, back => SIGNIN_PATH },
    );
    (jar, page).into_response()
}

pub async fn forgot_admin_form(jar: CookieJar, OptionalUser(user): OptionalUser) -> Response {
    let (jar, flash) = take_flash(jar);
    let page = templates::page(
        "users/forgot_password.html",
        PageChrome {
            title: "Recuperar contraseña de administrador",
            user: user.as_ref(),
            flash,
        },
        minijinja::context! { action => FORGOT_ADMIN_PATH, back => ADMIN_SIGNIN_PATH },
    );
    (jar, page).into_response()
}

async fn send_reset(state: &AppState, jar: CookieJar, form: ForgotPasswordForm, from: &str, next: &str) -> Result<Response, FormReply> {
    state.account_service().forgot_password(form).await.or_back_to(from)?;

    let jar = set_flash(
        jar,
        &Flash::success("Si el correo está registrado, recibirás un enlace para restablecer tu contraseña."),
    );
    Ok((jar, Redirect::to(next)).into_response())
}

pub async fn forgot_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, FormReply> {
    send_reset(&state, jar, form, FORGOT_PATH, SIGNIN_PATH).await
}

pub async fn forgot_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, FormReply> {
    send_reset(&state, jar, form, FORGOT_ADMIN_PATH, ADMIN_SIGNIN_PATH).await
}
