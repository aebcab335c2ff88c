use libris_http::error::AppError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {line}: {message}")]
    InvalidRow { line: u64, message: String },

    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        let message = err.to_string();
        match err {
            ReportError::MissingColumns(columns) => AppError::validation(
                columns
                    .iter()
                    .map(|c| json!({"field": c, "error": "missing column"}))
                    .collect(),
                message,
            ),
            ReportError::InvalidRow { line, .. } => {
                AppError::validation(vec![json!({"line": line, "error": message})], message)
            }
            ReportError::Csv(_) => AppError::bad_request(message),
            ReportError::Database(err) => AppError::from(err),
            ReportError::Io(err) => AppError::Internal(err.into()),
            ReportError::Utf8(err) => AppError::Internal(err.into()),
        }
    }
}
