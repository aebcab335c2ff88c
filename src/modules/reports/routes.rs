use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use libris_http::error::AppError;
use serde::Deserialize;

use super::exporter;
use super::importer::{self, BookImport, IssueImport};
use crate::modules::accounts::session::CurrentAdmin;
use crate::modules::accounts::store as accounts;
use crate::modules::circulation::service as circulation;
use crate::modules::fines::engine as fines;
use crate::state::AppState;
use crate::utils::today;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/import/issues", post(import_issues))
        .route("/import/books", post(import_books))
        .route("/export/issues", get(export_issues))
        .route("/export/fines", get(export_fines))
        .route("/export/readers", get(export_readers))
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    format: Option<String>,
}

impl ExportParams {
    /// CSV is the only rendering on offer.
    fn check(&self) -> Result<(), AppError> {
        match self.format.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("csv") => Ok(()),
            Some(_) => Err(AppError::bad_request("Invalid format specified.")),
        }
    }
}

fn attachment(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

async fn import_issues(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    body: String,
) -> Result<Json<IssueImport>, AppError> {
    let summary = importer::import_issues(&state.db, state.rules(), &body, today()).await?;
    tracing::info!(target: "libris.reports", admin = admin.id, created = summary.created, "issue CSV uploaded");
    Ok(Json(summary))
}

async fn import_books(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    body: String,
) -> Result<Json<BookImport>, AppError> {
    let summary = importer::import_books(&state.db, &body).await?;
    tracing::info!(target: "libris.reports", admin = admin.id, created = summary.created, updated = summary.updated, "book CSV uploaded");
    Ok(Json(summary))
}

async fn export_issues(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AppError> {
    params.check()?;
    let issues = circulation::all_issues(&state.db, today()).await?;
    Ok(attachment("issues.csv", exporter::issues_csv(&issues)?))
}

async fn export_fines(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AppError> {
    params.check()?;
    let fines = fines::all_fines(&state.db).await?;
    Ok(attachment("fines.csv", exporter::fines_csv(&fines)?))
}

async fn export_readers(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AppError> {
    params.check()?;
    let readers = accounts::all_readers(&state.db).await?;
    Ok(attachment("readers.csv", exporter::readers_csv(&readers)?))
}
