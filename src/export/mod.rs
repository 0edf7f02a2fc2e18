//! Report exporters. Each one is a pure function of the full user list
//! (plus, for the PDF, the configured letterhead) producing an in-memory
//! byte buffer.

pub mod csv;
pub mod pdf;
pub mod xlsx;

pub use pdf::{layout, ReportTemplate};

use crate::config::ReportConfig;
use crate::models::User;

/// Export error types
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export task failed: {0}")]
    Task(String),
}

/// Downloadable report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn file_name(&self) -> String {
        format!("usuarios.{}", self.as_str())
    }
}

/// Build the report on the blocking pool; the encoders are CPU bound
pub async fn export(format: ExportFormat, users: Vec<User>, report: ReportConfig) -> Result<Vec<u8>, ExportError> {
    tokio::task::spawn_blocking(move || match format {
        ExportFormat::Csv => csv::to_csv(&users),
        ExportFormat::Xlsx => xlsx::to_xlsx(&users),
        ExportFormat::Pdf => {
            let logo = report.logo_path.as_deref().and_then(pdf::load_logo);
            pdf::to_pdf(&ReportTemplate::default(), &report, &users, logo.as_deref())
        }
    })
    .await
    .map_err(|e| ExportError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_metadata() {
        assert_eq!(ExportFormat::Csv.file_name(), "usuarios.csv");
        assert_eq!(ExportFormat::Xlsx.file_name(), "usuarios.xlsx");
        assert!(ExportFormat::Csv.content_type().starts_with("text/csv"));
        assert_eq!(ExportFormat::Pdf.content_type(), "application/pdf");
    }

    #[tokio::test]
    async fn test_export_runs_off_the_async_runtime() {
        let bytes = export(ExportFormat::Csv, Vec::new(), crate::config::ReportConfig::default())
            .await
            .unwrap();
        assert_eq!(bytes, b"name,email\n");
    }
}
