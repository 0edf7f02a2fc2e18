use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth_handlers::PANEL_PATH;
use crate::config::ListingConfig;
use crate::models::{CreateUserForm, EditUserForm, PageRequest, Sort, SortField, SortOrder};
use crate::services::{AppState, SagaOutcome};
use crate::web::extractors::AdminUser;
use crate::web::responses::{set_flash, take_flash, AppError, Flash, FormReply, FormResultExt};
use crate::web::templates::{self, PageChrome};

const CREATE_PATH: &str = "/usuarios/crear";

/// Query string of the listing. Values arrive as raw strings so a bad
/// number falls back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub search: Option<String>,
    pub entries: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ListQuery {
    pub fn to_page_request(&self, listing: &ListingConfig) -> PageRequest {
        let page = self
            .page
            .as_deref()
            .and_then(|page| page.trim().parse::<usize>().ok())
            .unwrap_or(1);

        let size = self
            .entries
            .as_deref()
            .and_then(|entries| entries.trim().parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(listing.default_page_size)
            .min(listing.max_page_size);

        let mut request = PageRequest::new(page, size).with_search(self.search.clone().unwrap_or_default());

        let field = match self.sort.as_deref() {
            Some("name") => Some(SortField::Name),
            Some("email") => Some(SortField::Email),
            _ => None,
        };
        if let Some(field) = field {
            let order = match self.order.as_deref() {
                Some("desc") => SortOrder::Desc,
                _ => SortOrder::Asc,
            };
            request = request.with_sort(Sort { field, order });
        }

        request
    }
}

/// Pagination links of the listing view
#[derive(Debug, Serialize)]
struct Pager {
    pages: Vec<usize>,
    previous: Option<usize>,
    next: Option<usize>,
    entries: usize,
    sort: Option<&'static str>,
    order: &'static str,
}

pub async fn crud_redirect() -> Redirect {
    Redirect::permanent(PANEL_PATH)
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    jar: CookieJar,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let request = query.to_page_request(&state.config.listing);
    let result = state.user_service().list_users(&request).await?;

    let pager = Pager {
        pages: (1..=result.total_pages).collect(),
        previous: result.has_previous().then(|| result.page - 1),
        next: result.has_next().then(|| result.page + 1),
        entries: result.size,
        sort: request.sort.map(|sort| match sort.field {
            SortField::Name => "name",
            SortField::Email => "email",
        }),
        order: match request.sort.map(|sort| sort.order) {
            Some(SortOrder::Desc) => "desc",
            _ => "asc",
        },
    };

    let (jar, flash) = take_flash(jar);
    let page = templates::page(
        "crud/index.html",
        PageChrome {
            title: "Usuarios",
            user: Some(&session),
            flash,
        },
        minijinja::context! { result => result, pager => pager },
    );
    Ok((jar, page).into_response())
}

pub async fn create_form(AdminUser(session): AdminUser, jar: CookieJar) -> Response {
    let (jar, flash) = take_flash(jar);
    let page = templates::page(
        "crud/crear.html",
        PageChrome {
            title: "Crear usuario",
            user: Some(&session),
            flash,
        },
        (),
    );
    (jar, page).into_response()
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    jar: CookieJar,
    Form(form): Form<CreateUserForm>,
) -> Result<Response, FormReply> {
    let user = state.user_service().create_user(form).await.or_back_to(CREATE_PATH)?;
    info!(admin = %session.uid, user_id = %user.id, "Admin created user");

    let jar = set_flash(jar, &Flash::success(format!("Usuario {} creado", user.name)));
    Ok((jar, Redirect::to(PANEL_PATH)).into_response())
}

pub async fn edit_form(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = state.user_service().get_user(&id).await?;

    let (jar, flash) = take_flash(jar);
    let page = templates::page(
        "crud/editar.html",
        PageChrome {
            title: "Editar usuario",
            user: Some(&session),
            flash,
        },
        minijinja::context! { record => user },
    );
    Ok((jar, page).into_response())
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<EditUserForm>,
) -> Result<Response, FormReply> {
    let edit_path = format!("/usuarios/{}/editar", id);
    let user = state
        .user_service()
        .update_user(&id, form)
        .await
        .or_back_to(&edit_path)?;
    info!(admin = %session.uid, user_id = %user.id, "Admin updated user");

    let jar = set_flash(jar, &Flash::success(format!("Usuario {} actualizado", user.name)));
    Ok((jar, Redirect::to(PANEL_PATH)).into_response())
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Response, FormReply> {
    let service = state.user_service();

    let target = service.get_user(&id).await.or_back_to(PANEL_PATH)?;
    if target.uid.as_deref() == Some(session.uid.as_str()) {
        return Err(AppError::BadRequest("No puedes eliminar tu propia cuenta".to_string()).back_to(PANEL_PATH));
    }

    let report = service.delete_user(&id).await.or_back_to(PANEL_PATH)?;
    state.metrics.record_delete_saga(report.outcome.as_str());

    let flash = match report.outcome {
        SagaOutcome::Completed => Flash::success(format!("Usuario {} eliminado", target.name)),
        SagaOutcome::RolledBack => Flash::error(format!(
            "No se pudo eliminar la cuenta de {}; el usuario se conservó",
            target.name
        )),
        SagaOutcome::Inconsistent => Flash::error(format!(
            "Usuario {} eliminado con errores; se notificó al equipo de operaciones",
            target.name
        )),
    };

    let jar = set_flash(jar, &flash);
    Ok((jar, Redirect::to(PANEL_PATH)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> ListingConfig {
        ListingConfig {
            default_page_size: 5,
            max_page_size: 100,
        }
    }

    #[test]
    fn test_defaults_when_query_is_empty() {
        let request = ListQuery::default().to_page_request(&listing());
        assert_eq!(request, PageRequest::new(1, 5));
    }

    #[test]
    fn test_bad_numbers_fall_back_and_size_is_capped() {
        let query = ListQuery {
            page: Some("abc".to_string()),
            entries: Some("1000".to_string()),
            ..ListQuery::default()
        };
        let request = query.to_page_request(&listing());
        assert_eq!(request.page, 1);
        assert_eq!(request.size, 100);

        let query = ListQuery {
            entries: Some("0".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(query.to_page_request(&listing()).size, 5);
    }

    #[test]
    fn test_search_and_sort_are_forwarded() {
        let query = ListQuery {
            page: Some("2".to_string()),
            search: Some("ana".to_string()),
            entries: Some("2".to_string()),
            sort: Some("email".to_string()),
            order: Some("desc".to_string()),
        };
        let request = query.to_page_request(&listing());

        assert_eq!(request.page, 2);
        assert_eq!(request.size, 2);
        assert_eq!(request.search.as_deref(), Some("ana"));
        assert_eq!(
            request.sort,
            Some(Sort {
                field: SortField::Email,
                order: SortOrder::Desc,
            })
        );
    }

    #[test]
    fn test_unknown_sort_field_keeps_backend_order() {
        let query = ListQuery {
            sort: Some("uid".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(query.to_page_request(&listing()).sort, None);
    }
}
