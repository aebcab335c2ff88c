use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use libris_http::error::AppError;
use serde_json::{json, Value};

use super::models::{Inbox, Notification};
use super::store;
use crate::modules::accounts::session::CurrentReader;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(inbox))
        .route("/{id}/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
}

async fn inbox(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
) -> Result<Json<Inbox>, AppError> {
    Ok(Json(Inbox {
        notifications: store::list_for_reader(&state.db, reader.id).await?,
        unread_count: store::unread_count(&state.db, reader.id).await?,
    }))
}

async fn mark_read(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
    Path(id): Path<i64>,
) -> Result<Json<Notification>, AppError> {
    store::mark_read(&state.db, reader.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("notification {id} not found")))
}

async fn mark_all_read(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
) -> Result<Json<Value>, AppError> {
    let updated = store::mark_all_read(&state.db, reader.id).await?;
    Ok(Json(json!({ "updated": updated })))
}
