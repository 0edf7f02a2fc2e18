use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::services::AppState;
use crate::web::{
    extractors::SIGNIN_PATH,
    handlers::{
        auth_handlers, crud_handlers, export_handlers, health_handlers, metrics_handlers, profile_handlers,
    },
    middleware::{logging_middleware, metrics_middleware, request_id_middleware},
    responses::AppError,
};

/// Custom request ID generator using UUID v4
#[derive(Clone, Default)]
pub struct UuidMakeRequestId;

impl MakeRequestId for UuidMakeRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Create the main application router with middleware stack
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let timeout = Duration::from_secs(server.timeout_seconds);
    let body_limit = server.body_limit_bytes;

    Router::new()
        .route("/", get(|| async { Redirect::to(SIGNIN_PATH) }))
        .nest("/users", account_routes())
        .merge(panel_routes())
        .nest("/health", health_routes())
        .route("/metrics", get(metrics_handlers::metrics))
        .fallback(not_found_handler)
        .layer(
            ServiceBuilder::new()
                // Request ID generation and propagation (outermost)
                .layer(SetRequestIdLayer::x_request_id(UuidMakeRequestId))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(middleware::from_fn(logging_middleware))
                .layer(middleware::from_fn_with_state(state.clone(), metrics_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Sign-up, sign-in and profile pages
fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", get(auth_handlers::signup_form).post(auth_handlers::signup))
        .route("/signin", get(auth_handlers::signin_form).post(auth_handlers::signin))
        .route(
            "/signinAdmin",
            get(auth_handlers::signin_admin_form).post(auth_handlers::signin_admin),
        )
        .route("/logout", get(auth_handlers::logout).post(auth_handlers::logout))
        .route(
            "/forgot-password",
            get(auth_handlers::forgot_password_form).post(auth_handlers::forgot_password),
        )
        .route(
            "/forgot-Admin",
            get(auth_handlers::forgot_admin_form).post(auth_handlers::forgot_admin),
        )
        .route(
            "/profile",
            get(profile_handlers::profile).post(profile_handlers::update_profile),
        )
}

/// Admin CRUD panel and report exports
fn panel_routes() -> Router<AppState> {
    Router::new()
        .route("/crud", get(crud_handlers::crud_redirect))
        .route("/usuarios", get(crud_handlers::list_users))
        .route(
            "/usuarios/crear",
            get(crud_handlers::create_form).post(crud_handlers::create_user),
        )
        .route(
            "/usuarios/:id/editar",
            get(crud_handlers::edit_form).post(crud_handlers::update_user),
        )
        .route("/usuarios/:id/eliminar", post(crud_handlers::delete_user))
        .route("/usuarios/exportar.csv", get(export_handlers::export_csv))
        .route("/usuarios/exportar.pdf", get(export_handlers::export_pdf))
        .route("/usuarios/exportar.xlsx", get(export_handlers::export_xlsx))
        .route("/usuarios/exportar/preview.pdf", get(export_handlers::preview_pdf))
}

/// Create health check routes
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_handlers::health))
        .route("/live", get(health_handlers::liveness))
        .route("/ready", get(health_handlers::readiness))
}

/// Fallback handler for 404 responses
pub async fn not_found_handler() -> impl IntoResponse {
    AppError::NotFound("Página no encontrada".to_string())
}
