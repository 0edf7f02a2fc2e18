//! Server-side HTML views.
//!
//! Template files live in `templates/` and are compiled into the binary as
//! string constants, then registered once in a shared environment. Views
//! extend `layout.html`; anything beyond presentation belongs in the handler.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use minijinja::{Environment, Value};
use serde::Serialize;
use std::sync::OnceLock;
use tracing::error;

use super::responses::flash::Flash;
use crate::models::SessionUser;

pub const LAYOUT: &str = include_str!("../../templates/layout.html");
pub const ERROR: &str = include_str!("../../templates/error.html");
pub const SIGNUP: &str = include_str!("../../templates/users/signup.html");
pub const SIGNIN: &str = include_str!("../../templates/users/signin.html");
pub const SIGNIN_ADMIN: &str = include_str!("../../templates/users/signin_admin.html");
pub const FORGOT_PASSWORD: &str = include_str!("../../templates/users/forgot_password.html");
pub const PROFILE: &str = include_str!("../../templates/users/profile.html");
pub const CRUD_INDEX: &str = include_str!("../../templates/crud/index.html");
pub const CRUD_CREATE: &str = include_str!("../../templates/crud/crear.html");
pub const CRUD_EDIT: &str = include_str!("../../templates/crud/editar.html");

const TEMPLATES: [(&str, &str); 10] = [
    ("layout.html", LAYOUT),
    ("error.html", ERROR),
    ("users/signup.html", SIGNUP),
    ("users/signin.html", SIGNIN),
    ("users/signin_admin.html", SIGNIN_ADMIN),
    ("users/forgot_password.html", FORGOT_PASSWORD),
    ("users/profile.html", PROFILE),
    ("crud/index.html", CRUD_INDEX),
    ("crud/crear.html", CRUD_CREATE),
    ("crud/editar.html", CRUD_EDIT),
];

static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> &'static Environment<'static> {
    ENVIRONMENT.get_or_init(|| {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            if let Err(e) = env.add_template(name, source) {
                error!(template = name, error = %e, "Invalid template");
            }
        }
        env
    })
}

/// Values every view receives besides its own context
#[derive(Debug, Default, Serialize)]
pub struct PageChrome<'a> {
    pub title: &'a str,
    pub user: Option<&'a SessionUser>,
    pub flash: Option<Flash>,
}

/// Render `name` with the shared chrome merged under the view's own values
pub fn render<S: Serialize>(name: &str, chrome: PageChrome<'_>, view: S) -> Result<String, minijinja::Error> {
    let ctx = minijinja::context! {
        title => chrome.title,
        current_user => chrome.user,
        flash => chrome.flash,
        ..Value::from_serialize(&view)
    };
    environment().get_template(name)?.render(ctx)
}

/// Rendered view as an HTML response; rendering failures become a bare 500
pub fn page<S: Serialize>(name: &str, chrome: PageChrome<'_>, view: S) -> Response {
    page_with_status(StatusCode::OK, name, chrome, view)
}

pub fn page_with_status<S: Serialize>(status: StatusCode, name: &str, chrome: PageChrome<'_>, view: S) -> Response {
    match render(name, chrome, view) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(template = name, error = %e, "Template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error interno del servidor").into_response()
        }
    }
}
