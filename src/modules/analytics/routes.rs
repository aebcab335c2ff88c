use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use libris_http::error::AppError;
use serde::Deserialize;

use super::models::BookAnalytics;
use super::store;
use crate::modules::catalog::models::Book;
use crate::modules::catalog::store as catalog;
use crate::state::AppState;
use crate::utils::{shift_days, today};

const POPULAR_LIMIT: i64 = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books/{id}", get(book_analytics))
        .route("/popular", get(popular))
}

#[derive(Debug, Deserialize)]
struct WindowParams {
    days: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PopularParams {
    exclude: Option<i64>,
}

async fn book_analytics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<WindowParams>,
) -> Result<Json<BookAnalytics>, AppError> {
    let book = catalog::find_book(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("book {id} not found")))?;
    // An unreadable or out-of-calendar window falls back to the default.
    let today = today();
    let days = params
        .days
        .and_then(|d| d.trim().parse::<i64>().ok())
        .filter(|d| *d >= 0 && shift_days(today, -d).is_some())
        .unwrap_or(state.rules().analytics_window_days);
    Ok(Json(store::book_series(&state.db, book.id, today, days).await?))
}

async fn popular(
    State(state): State<AppState>,
    Query(params): Query<PopularParams>,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(
        store::popular_books(&state.db, POPULAR_LIMIT, params.exclude).await?,
    ))
}
