use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use libris_http::error::AppError;

use super::models::{
    Approval, BulkOutcome, Issue, IssueCommand, IssueRequest, IssueView, NewRequest,
    ReaderDashboard, RequestIds, RequestView,
};
use super::service;
use crate::modules::accounts::session::{CurrentAdmin, CurrentReader};
use crate::state::AppState;
use crate::utils::{today, Page, PageParams};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issues", get(list_issues).post(issue_book))
        .route("/issues/overdue", get(overdue_issues))
        .route("/issues/{id}/return", post(return_book))
        .route("/requests", get(pending_requests).post(request_book))
        .route("/requests/{id}/approve", post(approve_request))
        .route("/requests/{id}/reject", post(reject_request))
        .route("/requests/bulk-approve", post(bulk_approve))
        .route("/requests/bulk-reject", post(bulk_reject))
        .route("/dashboard", get(dashboard))
}

async fn list_issues(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<IssueView>>, AppError> {
    let page = service::list_issues(&state.db, &params, state.rules().page_size, today()).await?;
    Ok(Json(page))
}

async fn issue_book(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(cmd): Json<IssueCommand>,
) -> Result<(StatusCode, Json<Issue>), AppError> {
    let issue = service::issue_book(&state.db, state.rules(), &cmd, today()).await?;
    tracing::debug!(target: "libris.circulation", admin = admin.id, issue = issue.id, "issued at the desk");
    Ok((StatusCode::CREATED, Json(issue)))
}

async fn overdue_issues(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<Vec<IssueView>>, AppError> {
    Ok(Json(service::overdue_issues(&state.db, today()).await?))
}

async fn return_book(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Issue>, AppError> {
    Ok(Json(service::return_book(&state.db, id, today()).await?))
}

async fn pending_requests(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<Vec<RequestView>>, AppError> {
    Ok(Json(service::pending_requests(&state.db, None).await?))
}

async fn request_book(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
    Json(form): Json<NewRequest>,
) -> Result<(StatusCode, Json<IssueRequest>), AppError> {
    let request = service::request_book(&state.db, state.rules(), reader.id, form.book_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn approve_request(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Approval>, AppError> {
    Ok(Json(
        service::approve_request(&state.db, state.rules(), id, today()).await?,
    ))
}

async fn reject_request(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<Json<IssueRequest>, AppError> {
    Ok(Json(service::reject_request(&state.db, id).await?))
}

async fn bulk_approve(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Json(form): Json<RequestIds>,
) -> Result<Json<Vec<BulkOutcome>>, AppError> {
    let outcomes =
        service::bulk_approve(&state.db, state.rules(), &form.request_ids, today()).await?;
    Ok(Json(outcomes))
}

async fn bulk_reject(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Json(form): Json<RequestIds>,
) -> Result<Json<Vec<BulkOutcome>>, AppError> {
    Ok(Json(service::bulk_reject(&state.db, &form.request_ids).await?))
}

async fn dashboard(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
) -> Result<Json<ReaderDashboard>, AppError> {
    let dashboard =
        service::reader_dashboard(&state.db, state.rules(), reader.id, today()).await?;
    Ok(Json(dashboard))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use libris_authz::Principal;
    use serde_json::json;

    use crate::testing::{self, Client};

    #[tokio::test]
    async fn request_approve_return_over_http() {
        let client = Client::new().await;
        let db = client.state.db.clone();
        let reader = testing::reader(&db, "R1", false).await;
        let admin = testing::admin(&db, "root", true).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 1).await;
        let reader_cookie = client.cookie_for(Principal::reader(reader.id)).await;
        let admin_cookie = client.cookie_for(Principal::admin(admin.id)).await;

        let (status, request) = client
            .send(
                Method::POST,
                "/api/circulation/requests",
                Some(&reader_cookie),
                Some(json!({"book_id": book.id})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, pending) = client
            .send(Method::GET, "/api/circulation/requests", Some(&admin_cookie), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pending[0]["book_name"], "Dune");

        let uri = format!("/api/circulation/requests/{}/approve", request["id"]);
        let (status, approval) = client.send(Method::POST, &uri, Some(&admin_cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approval["outcome"], "issued");

        let (status, _) = client.send(Method::POST, &uri, Some(&admin_cookie), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/circulation/issues/{}/return", approval["issue"]["id"]);
        let (status, returned) = client.send(Method::POST, &uri, Some(&admin_cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(returned["returned_date"].is_string());
    }

    #[tokio::test]
    async fn direct_issue_validates_due_date() {
        let client = Client::new().await;
        let db = client.state.db.clone();
        let reader = testing::reader(&db, "R1", false).await;
        let admin = testing::admin(&db, "root", true).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 1).await;
        let cookie = client.cookie_for(Principal::admin(admin.id)).await;

        let (status, body) = client
            .send(
                Method::POST,
                "/api/circulation/issues",
                Some(&cookie),
                Some(json!({
                    "reader_id": reader.id,
                    "book_id": book.id,
                    "issued_date": "2024-01-01",
                    "due_date": "2024-03-01"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"][0]["field"], "due_date");
    }

    #[tokio::test]
    async fn readers_cannot_issue_directly() {
        let client = Client::new().await;
        let reader = testing::reader(&client.state.db, "R1", false).await;
        let cookie = client.cookie_for(Principal::reader(reader.id)).await;
        let (status, _) = client
            .send(
                Method::POST,
                "/api/circulation/issues",
                Some(&cookie),
                Some(json!({"reader_id": reader.id, "book_id": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn issue_date_at_the_end_of_the_calendar_is_refused() {
        let client = Client::new().await;
        let db = client.state.db.clone();
        let reader = testing::reader(&db, "R1", false).await;
        let admin = testing::admin(&db, "root", true).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 1).await;
        let cookie = client.cookie_for(Principal::admin(admin.id)).await;
        let issued = chrono::NaiveDate::MAX - chrono::Duration::days(6);

        let (status, body) = client
            .send(
                Method::POST,
                "/api/circulation/issues",
                Some(&cookie),
                Some(json!({
                    "reader_id": reader.id,
                    "book_id": book.id,
                    "issued_date": issued.to_string()
                })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"][0]["field"], "due_date");

        let stock = crate::modules::catalog::store::find_book(&db, book.id)
            .await
            .unwrap()
            .unwrap()
            .number_in_stock;
        assert_eq!(stock, 1);
    }
}
