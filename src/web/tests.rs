use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer, TestServerConfig};
use std::sync::Arc;

use crate::backend::{Backend, MemoryBackend};
use crate::config::{AppConfig, SeedAccount};
use crate::models::{Role, UserChanges};
use crate::services::AppState;
use crate::web::create_router;

const ADMIN_EMAIL: &str = "admin@x.com";
const ADMIN_PASSWORD: &str = "secret1";

struct TestApp {
    server: TestServer,
    state: AppState,
    store: Arc<MemoryBackend>,
}

fn spawn_app(store: MemoryBackend) -> TestApp {
    let store = Arc::new(store);
    let state = AppState::with_backend(AppConfig::default(), Backend::in_memory(store.clone())).unwrap();
    let config = TestServerConfig {
        save_cookies: true,
        ..TestServerConfig::default()
    };
    let server = TestServer::new_with_config(create_router(state.clone()), config).unwrap();

    TestApp { server, state, store }
}

async fn spawn_admin_app() -> TestApp {
    let app = spawn_app(MemoryBackend::new().with_auto_verify());
    app.state
        .services
        .seed_admin(&SeedAccount {
            name: "Administrador".to_string(),
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        })
        .await
        .unwrap();

    let response = app
        .server
        .post("/users/signinAdmin")
        .form(&[("email", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)])
        .await;
    assert_redirect(&response, "/usuarios");

    app
}

fn assert_redirect(response: &TestResponse, location: &str) {
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location").to_str().unwrap(), location);
}

async fn sign_up(server: &TestServer, name: &str, email: &str) -> TestResponse {
    server
        .post("/users/signup")
        .form(&[
            ("name", name),
            ("email", email),
            ("password", "secret1"),
            ("confirm_password", "secret1"),
        ])
        .await
}

async fn create_user(server: &TestServer, name: &str, email: &str, password: &str) {
    let response = server
        .post("/usuarios/crear")
        .form(&[("name", name), ("email", email), ("password", password), ("role", "regular")])
        .await;
    assert_redirect(&response, "/usuarios");
}

async fn user_id(app: &TestApp, email: &str) -> String {
    app.state
        .services
        .user_repository()
        .find_by_email(email)
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn test_root_redirects_to_sign_in() {
    let app = spawn_app(MemoryBackend::new());

    let response = app.server.get("/").await;
    assert_redirect(&response, "/users/signin");
}

#[tokio::test]
async fn test_sign_up_requires_verified_email_before_sign_in() {
    let app = spawn_app(MemoryBackend::new());

    let response = sign_up(&app.server, "Ana", "ana@x.com").await;
    assert_redirect(&response, "/users/signin");

    let page = app.server.get("/users/signin").await;
    page.assert_status_ok();
    assert!(page.text().contains("Revisa tu correo"));

    let credentials = [("email", "ana@x.com"), ("password", "secret1")];
    let response = app.server.post("/users/signin").form(&credentials).await;
    assert_redirect(&response, "/users/signin");

    app.store.verify_email("ana@x.com").unwrap();
    let response = app.server.post("/users/signin").form(&credentials).await;
    assert_redirect(&response, "/users/profile");

    let profile = app.server.get("/users/profile").await;
    profile.assert_status_ok();
    let html = profile.text();
    assert!(html.contains("Mi perfil"));
    assert!(html.contains("ana@x.com"));
}

#[tokio::test]
async fn test_password_mismatch_returns_to_sign_up_with_message() {
    let app = spawn_app(MemoryBackend::new());

    let response = app
        .server
        .post("/users/signup")
        .form(&[
            ("name", "Ana"),
            ("email", "ana@x.com"),
            ("password", "secret1"),
            ("confirm_password", "secret2"),
        ])
        .await;
    assert_redirect(&response, "/users/signup");

    let page = app.server.get("/users/signup").await;
    assert!(page.text().contains("Las contraseñas no coinciden"));
    assert_eq!(app.store.account_count(), 0);
}

#[tokio::test]
async fn test_profile_requires_session() {
    let app = spawn_app(MemoryBackend::new());

    let response = app.server.get("/users/profile").await;
    assert_redirect(&response, "/users/signin");
}

#[tokio::test]
async fn test_logout_clears_session() {
    let app = spawn_app(MemoryBackend::new().with_auto_verify());
    sign_up(&app.server, "Ana", "ana@x.com").await;
    app.server
        .post("/users/signin")
        .form(&[("email", "ana@x.com"), ("password", "secret1")])
        .await;

    let response = app.server.get("/users/logout").await;
    assert_redirect(&response, "/users/signin");

    let response = app.server.get("/users/profile").await;
    assert_redirect(&response, "/users/signin");
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_unknown_emails() {
    let app = spawn_app(MemoryBackend::new());

    let response = app
        .server
        .post("/users/forgot-password")
        .form(&[("email", "nadie@x.com")])
        .await;
    assert_redirect(&response, "/users/signin");

    let response = app.server.post("/users/forgot-Admin").form(&[("email", "nadie@x.com")]).await;
    assert_redirect(&response, "/users/signinAdmin");
}

#[tokio::test]
async fn test_panel_redirects_anonymous_to_admin_sign_in() {
    let app = spawn_app(MemoryBackend::new());

    let response = app.server.get("/usuarios").await;
    assert_redirect(&response, "/users/signinAdmin");
}

#[tokio::test]
async fn test_panel_forbids_regular_users() {
    let app = spawn_app(MemoryBackend::new().with_auto_verify());
    sign_up(&app.server, "Ana", "ana@x.com").await;
    app.server
        .post("/users/signin")
        .form(&[("email", "ana@x.com"), ("password", "secret1")])
        .await;

    let response = app.server.get("/usuarios").await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = app.server.get("/usuarios/exportar.csv").await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_regular_user_cannot_use_admin_sign_in() {
    let app = spawn_app(MemoryBackend::new().with_auto_verify());
    sign_up(&app.server, "Ana", "ana@x.com").await;

    let response = app
        .server
        .post("/users/signinAdmin")
        .form(&[("email", "ana@x.com"), ("password", "secret1")])
        .await;
    assert_redirect(&response, "/users/signinAdmin");

    let response = app.server.get("/usuarios").await;
    assert_redirect(&response, "/users/signinAdmin");
}

#[tokio::test]
async fn test_demoted_admin_loses_panel_access() {
    let app = spawn_admin_app().await;
    app.server.get("/usuarios").await.assert_status_ok();

    let changes = UserChanges {
        role: Some(Role::Regular),
        ..UserChanges::default()
    };
    let id = user_id(&app, ADMIN_EMAIL).await;
    app.state.services.user_repository().update(&id, &changes).await.unwrap();

    let response = app.server.get("/usuarios").await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_listing_paginates_and_searches() {
    let app = spawn_admin_app().await;
    for (name, email) in [("Ana", "ana@x.com"), ("Bruno", "bruno@x.com"), ("Carla", "carla@y.com")] {
        create_user(&app.server, name, email, "").await;
    }

    let page = app.server.get("/usuarios").await;
    page.assert_status_ok();
    let html = page.text();
    assert!(html.contains("Usuario Carla creado"));
    assert!(html.contains("bruno@x.com"));

    let page = app.server.get("/usuarios").add_query_param("search", "ANA").await;
    let html = page.text();
    assert!(html.contains("ana@x.com"));
    assert!(!html.contains("bruno@x.com"));

    let page = app.server.get("/usuarios").add_query_param("search", "y.com").await;
    let html = page.text();
    assert!(html.contains("carla@y.com"));
    assert!(!html.contains("ana@x.com"));

    let page = app
        .server
        .get("/usuarios")
        .add_query_param("entries", 2)
        .add_query_param("page", 2)
        .add_query_param("sort", "name")
        .await;
    let html = page.text();
    assert!(html.contains("bruno@x.com"));
    assert!(html.contains("carla@y.com"));
    assert!(!html.contains("ana@x.com"));

    let page = app
        .server
        .get("/usuarios")
        .add_query_param("page", "abc")
        .add_query_param("entries", -1)
        .await;
    page.assert_status_ok();
    assert!(page.text().contains("ana@x.com"));
}

#[tokio::test]
async fn test_create_rejects_duplicate_email() {
    let app = spawn_admin_app().await;
    create_user(&app.server, "Ana", "ana@x.com", "").await;

    let response = app
        .server
        .post("/usuarios/crear")
        .form(&[("name", "Otra Ana"), ("email", "ana@x.com"), ("password", ""), ("role", "regular")])
        .await;
    assert_redirect(&response, "/usuarios/crear");

    let page = app.server.get("/usuarios/crear").await;
    assert!(page.text().contains("ana@x.com"));
}

#[tokio::test]
async fn test_edit_updates_record() {
    let app = spawn_admin_app().await;
    create_user(&app.server, "Ana", "ana@x.com", "").await;
    let id = user_id(&app, "ana@x.com").await;

    let form = app.server.get(&format!("/usuarios/{}/editar", id)).await;
    form.assert_status_ok();
    assert!(form.text().contains("value=\"Ana\""));

    let response = app
        .server
        .post(&format!("/usuarios/{}/editar", id))
        .form(&[("name", "Ana María"), ("email", "ana@x.com"), ("role", "admin")])
        .await;
    assert_redirect(&response, "/usuarios");

    let user = app
        .state
        .services
        .user_repository()
        .find_by_email("ana@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "Ana María");
    assert!(user.is_admin());
}

#[tokio::test]
async fn test_edit_unknown_user_is_not_found() {
    let app = spawn_admin_app().await;

    let response = app.server.get("/usuarios/nope/editar").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_removes_record_and_identity_account() {
    let app = spawn_admin_app().await;
    create_user(&app.server, "Ana", "ana@x.com", "secret1").await;
    assert_eq!(app.store.account_count(), 2);
    let id = user_id(&app, "ana@x.com").await;

    let response = app.server.post(&format!("/usuarios/{}/eliminar", id)).await;
    assert_redirect(&response, "/usuarios");

    let page = app.server.get("/usuarios").await;
    assert!(page.text().contains("Usuario Ana eliminado"));
    assert_eq!(app.store.account_count(), 1);
    assert!(app
        .state
        .services
        .user_repository()
        .find_by_email("ana@x.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_admin_cannot_delete_own_account() {
    let app = spawn_admin_app().await;
    let id = user_id(&app, ADMIN_EMAIL).await;

    let response = app.server.post(&format!("/usuarios/{}/eliminar", id)).await;
    assert_redirect(&response, "/usuarios");

    let page = app.server.get("/usuarios").await;
    assert!(page.text().contains("No puedes eliminar tu propia cuenta"));
    assert_eq!(app.store.account_count(), 1);
}

#[tokio::test]
async fn test_crud_alias_redirects_permanently() {
    let app = spawn_app(MemoryBackend::new());

    let response = app.server.get("/crud").await;
    response.assert_status(StatusCode::PERMANENT_REDIRECT);
    assert_eq!(response.header("location").to_str().unwrap(), "/usuarios");
}

#[tokio::test]
async fn test_csv_export_downloads_names_and_emails() {
    let app = spawn_admin_app().await;
    create_user(&app.server, "Ana", "ana@x.com", "").await;

    let response = app.server.get("/usuarios/exportar.csv").await;
    response.assert_status_ok();
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.header("content-disposition").to_str().unwrap(),
        "attachment; filename=\"usuarios.csv\""
    );
    assert_eq!(response.text(), "name,email\nAdministrador,admin@x.com\nAna,ana@x.com\n");
}

#[tokio::test]
async fn test_binary_exports_have_expected_signatures() {
    let app = spawn_admin_app().await;

    let xlsx = app.server.get("/usuarios/exportar.xlsx").await;
    xlsx.assert_status_ok();
    assert!(xlsx.as_bytes().starts_with(b"PK"));
    assert!(xlsx
        .header("content-disposition")
        .to_str()
        .unwrap()
        .contains("usuarios.xlsx"));

    let pdf = app.server.get("/usuarios/exportar.pdf").await;
    pdf.assert_status_ok();
    assert_eq!(pdf.header("content-type").to_str().unwrap(), "application/pdf");
    assert!(pdf.as_bytes().starts_with(b"%PDF"));

    let preview = app.server.get("/usuarios/exportar/preview.pdf").await;
    preview.assert_status_ok();
    assert!(preview
        .header("content-disposition")
        .to_str()
        .unwrap()
        .starts_with("inline"));

    let metrics = app.server.get("/metrics").await;
    assert!(metrics.text().contains("user_exports_total"));
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = spawn_app(MemoryBackend::new());

    app.server.get("/health/live").await.assert_status_ok();

    let ready = app.server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<serde_json::Value>()["status"], "ready");

    let health = app.server.get("/health").await;
    health.assert_status_ok();
    let body = health.json::<serde_json::Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "development");
}

#[tokio::test]
async fn test_metrics_are_exposed() {
    let app = spawn_app(MemoryBackend::new());
    app.server.get("/health/live").await;

    let response = app.server.get("/metrics").await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("application_uptime_seconds"));
}

#[tokio::test]
async fn test_unknown_route_renders_not_found_page() {
    let app = spawn_app(MemoryBackend::new());

    let response = app.server.get("/no-existe").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.text().contains("Página no encontrada"));
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_app(MemoryBackend::new());

    let response = app.server.get("/health/live").await;
    assert!(!response.header("x-request-id").is_empty());
}
