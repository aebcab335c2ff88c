use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use libris_http::error::AppError;
use serde::Deserialize;

use super::engine;
use super::models::{Fine, FineView, SweepReport};
use crate::modules::accounts::session::{CurrentAdmin, CurrentReader};
use crate::state::AppState;
use crate::utils::{today, Page, PageParams};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_fines))
        .route("/mine", get(my_fines))
        .route("/{id}/pay", post(pay_fine))
        .route("/sweep", post(sweep))
}

#[derive(Debug, Deserialize)]
struct SweepParams {
    date: Option<NaiveDate>,
}

async fn list_fines(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<FineView>>, AppError> {
    Ok(Json(
        engine::list_fines(&state.db, &params, state.rules().page_size).await?,
    ))
}

async fn my_fines(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
) -> Result<Json<Vec<FineView>>, AppError> {
    engine::assess_overdue(&state.db, state.rules(), today(), Some(reader.id)).await?;
    Ok(Json(engine::reader_unpaid(&state.db, reader.id).await?))
}

async fn pay_fine(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Fine>, AppError> {
    let fine = engine::pay_fine(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("fine {id} not found")))?;
    tracing::info!(target: "libris.fines", admin = admin.id, fine = fine.id, amount = fine.amount, "fine paid");
    Ok(Json(fine))
}

async fn sweep(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(params): Query<SweepParams>,
) -> Result<Json<SweepReport>, AppError> {
    let day = params.date.unwrap_or_else(today);
    Ok(Json(engine::run_sweep(&state.db, state.rules(), day).await?))
}
