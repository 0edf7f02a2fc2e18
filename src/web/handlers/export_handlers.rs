use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::info;

use crate::export::{self, ExportFormat};
use crate::services::AppState;
use crate::web::extractors::AdminUser;
use crate::web::responses::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Attachment,
    Inline,
}

async fn export_response(
    state: &AppState,
    admin: &AdminUser,
    format: ExportFormat,
    disposition: Disposition,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let users = state.user_service().export_users().await?;
    let count = users.len();

    let bytes = export::export(format, users, state.config.report.clone()).await?;
    state.metrics.record_export(format.as_str());

    info!(
        admin = %admin.0.uid,
        format = format.as_str(),
        users = count,
        bytes = bytes.len(),
        duration_ms = start.elapsed().as_millis(),
        "Users report exported"
    );

    let disposition = match disposition {
        Disposition::Attachment => format!("attachment; filename=\"{}\"", format.file_name()),
        Disposition::Inline => format!("inline; filename=\"{}\"", format.file_name()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}

pub async fn export_csv(State(state): State<AppState>, admin: AdminUser) -> Result<Response, AppError> {
    export_response(&state, &admin, ExportFormat::Csv, Disposition::Attachment).await
}

pub async fn export_pdf(State(state): State<AppState>, admin: AdminUser) -> Result<Response, AppError> {
    export_response(&state, &admin, ExportFormat::Pdf, Disposition::Attachment).await
}

pub async fn export_xlsx(State(state): State<AppState>, admin: AdminUser) -> Result<Response, AppError> {
    export_response(&state, &admin, ExportFormat::Xlsx, Disposition::Attachment).await
}

/// Same PDF shown in the browser instead of downloaded
pub async fn preview_pdf(State(state): State<AppState>, admin: AdminUser) -> Result<Response, AppError> {
    export_response(&state, &admin, ExportFormat::Pdf, Disposition::Inline).await
}
