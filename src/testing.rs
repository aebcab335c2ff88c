//! Fixtures for the unit and HTTP tests: a migrated in-memory pool, seed rows
//! and a client that drives the full router.

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate};
use libris_authz::Principal;
use libris_kernel::settings::Settings;
use libris_kernel::InitCtx;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use crate::modules::accounts::models::{Admin, NewReader, Reader};
use crate::modules::accounts::store as accounts;
use crate::modules::catalog::models::{Book, BookInput};
use crate::modules::catalog::store as catalog;
use crate::modules::circulation::models::Issue;
use crate::state::AppState;

const TEST_BCRYPT_COST: u32 = 4;

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.bcrypt_cost = TEST_BCRYPT_COST;
    settings
}

pub async fn pool() -> SqlitePool {
    let db = libris_db::connect_in_memory().await.unwrap();
    libris_db::run_migrations(&db, &crate::build_registry().collect_migrations())
        .await
        .unwrap();
    db
}

pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub async fn book(db: &SqlitePool, name: &str, author: &str, isbn: &str, stock: i64) -> Book {
    let input = BookInput {
        name: name.to_string(),
        isbn: isbn.to_string(),
        author: author.to_string(),
        category_id: None,
        number_in_stock: stock,
        description: None,
        rating: None,
        status: None,
    };
    catalog::create_book(db, &input).await.unwrap()
}

/// Active reader named `Reader {code}` whose password is `secret`.
pub async fn reader(db: &SqlitePool, code: &str, staff: bool) -> Reader {
    let new = NewReader {
        reader_id: code.to_string(),
        name: format!("Reader {code}"),
        date_of_birth: None,
        phone_number: String::new(),
        address: String::new(),
        is_staff_member: staff,
        password_hash: libris_authz::hash_password("secret", TEST_BCRYPT_COST).unwrap(),
    };
    accounts::insert_reader(db, &new).await.unwrap()
}

pub async fn admin(db: &SqlitePool, code: &str, superuser: bool) -> Admin {
    let hash = libris_authz::hash_password("secret", TEST_BCRYPT_COST).unwrap();
    accounts::insert_admin(db, code, &format!("Admin {code}"), &hash, superuser)
        .await
        .unwrap()
}

/// Open issue due two weeks after `issued`. Leaves stock untouched.
pub async fn open_issue(db: &SqlitePool, reader_id: i64, book_id: i64, issued: NaiveDate) -> Issue {
    sqlx::query_as(
        "INSERT INTO issues (reader_id, book_id, issued_date, due_date)
         VALUES (?, ?, ?, ?)
         RETURNING *",
    )
    .bind(reader_id)
    .bind(book_id)
    .bind(issued)
    .bind(issued + Duration::days(14))
    .fetch_one(db)
    .await
    .unwrap()
}

/// The whole application router over a fresh database.
pub struct Client {
    pub state: AppState,
    router: Router,
}

impl Client {
    pub async fn new() -> Self {
        let settings = settings();
        let db = pool().await;
        let registry = crate::build_registry();
        let router = libris_http::build_router(
            &registry,
            &InitCtx {
                settings: &settings,
                db: &db,
            },
        );
        Self {
            state: AppState::new(db, settings),
            router,
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        content_type: &str,
        body: Body,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    /// JSON request; an empty response body comes back as `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map_or_else(Body::empty, |json| Body::from(json.to_string()));
        let response = self
            .dispatch(method, uri, cookie, "application/json", body)
            .await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Plain-text exchange for the CSV endpoints.
    pub async fn raw(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, HeaderMap, String) {
        let body = body.map_or_else(Body::empty, Body::from);
        let response = self.dispatch(method, uri, cookie, "text/csv", body).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Post credentials and return the `name=token` pair to send back as a cookie.
    pub async fn login(&self, uri: &str, credentials: Value) -> String {
        let response = self
            .dispatch(
                Method::POST,
                uri,
                None,
                "application/json",
                Body::from(credentials.to_string()),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    pub async fn cookie_for(&self, principal: Principal) -> String {
        let token = self.state.sessions.create(principal).await.unwrap();
        format!("{}={token}", self.state.settings.auth.session_cookie)
    }
}
