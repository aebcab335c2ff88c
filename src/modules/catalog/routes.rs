use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use libris_http::error::AppError;
use serde_json::{json, Value};

use super::models::{
    Book, BookDetail, BookFilter, BookInput, BookListing, BulkBookUpdate, Category,
    CategoryInput, RatingInput, RatingSummary, SearchHit, SearchParams,
};
use super::store;
use crate::modules::accounts::session::{CurrentAdmin, CurrentReader, OptionalReader};
use crate::modules::analytics::store as analytics;
use crate::state::AppState;
use crate::utils::{today, Page, PageParams};

const SEARCH_LIMIT: i64 = 8;
const MAX_SEARCH_LIMIT: i64 = 50;
const POPULAR_LIMIT: i64 = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/search", get(search_books))
        .route("/books/bulk", post(bulk_update))
        .route(
            "/books/{id}",
            get(book_detail).put(update_book).delete(delete_book),
        )
        .route("/books/{id}/rating", post(rate_book))
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            axum::routing::put(rename_category).delete(delete_category),
        )
}

fn book_not_found(id: i64) -> AppError {
    AppError::not_found(format!("book {id} not found"))
}

async fn list_books(
    State(state): State<AppState>,
    Query(filter): Query<BookFilter>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<BookListing>>, AppError> {
    let page = store::list_books(&state.db, &filter, &params, state.rules().page_size).await?;
    Ok(Json(page))
}

async fn search_books(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let hits = store::search_books(&state.db, &params.filter(), limit).await?;
    Ok(Json(hits.into_iter().map(SearchHit::from).collect()))
}

async fn book_detail(
    State(state): State<AppState>,
    OptionalReader(reader): OptionalReader,
    Path(id): Path<i64>,
) -> Result<Json<BookDetail>, AppError> {
    let book = store::find_book(&state.db, id)
        .await?
        .ok_or_else(|| book_not_found(id))?;
    let category_name = match book.category_id {
        Some(category_id) => store::find_category(&state.db, category_id)
            .await?
            .map(|c| c.name),
        None => None,
    };
    let ratings = store::rating_summary(&state.db, &book, reader.map(|r| r.id)).await?;
    let analytics = analytics::book_series(
        &state.db,
        book.id,
        today(),
        state.rules().analytics_window_days,
    )
    .await?;
    let popular_books = analytics::popular_books(&state.db, POPULAR_LIMIT, Some(book.id)).await?;

    Ok(Json(BookDetail {
        book,
        category_name,
        ratings,
        analytics,
        popular_books,
    }))
}

async fn create_book(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(input): Json<BookInput>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    input.validate()?;
    let book = store::create_book(&state.db, &input).await?;
    tracing::info!(target: "libris.catalog", admin = admin.id, book = book.id, isbn = %book.isbn, "book added");
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
    Json(input): Json<BookInput>,
) -> Result<Json<Book>, AppError> {
    input.validate()?;
    store::update_book(&state.db, id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| book_not_found(id))
}

async fn delete_book(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !store::delete_book(&state.db, id).await? {
        return Err(book_not_found(id));
    }
    tracing::info!(target: "libris.catalog", admin = admin.id, book = id, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_update(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Json(update): Json<BulkBookUpdate>,
) -> Result<Json<Value>, AppError> {
    let updated = store::bulk_update(&state.db, &update).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn rate_book(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
    Path(id): Path<i64>,
    Json(input): Json<RatingInput>,
) -> Result<Json<RatingSummary>, AppError> {
    input.validate()?;
    let book = store::find_book(&state.db, id)
        .await?
        .ok_or_else(|| book_not_found(id))?;
    store::upsert_rating(&state.db, book.id, reader.id, input.rating).await?;
    Ok(Json(
        store::rating_summary(&state.db, &book, Some(reader.id)).await?,
    ))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(store::list_categories(&state.db).await?))
}

fn validate_category(input: &CategoryInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::field("name", "required"));
    }
    Ok(())
}

async fn create_category(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    validate_category(&input)?;
    let category = store::create_category(&state.db, &input.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn rename_category(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    validate_category(&input)?;
    store::rename_category(&state.db, id, &input.name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("category {id} not found")))
}

async fn delete_category(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !store::delete_category(&state.db, id).await? {
        return Err(AppError::not_found(format!("category {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
