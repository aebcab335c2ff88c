//! Issuing, returning and requesting books.

pub mod error;
pub mod models;
pub mod routes;
pub mod service;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

pub use error::CirculationError;

use crate::state::AppState;

pub struct CirculationModule;

impl CirculationModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for CirculationModule {
    fn name(&self) -> &'static str {
        "circulation"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let rules = &ctx.settings.library;
        tracing::info!(
            module = self.name(),
            max_issued = rules.max_issued_per_reader,
            student_days = rules.student_loan_days,
            staff_days = rules.staff_loan_days,
            "circulation module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router().with_state(AppState::from_ctx(ctx))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_issues_requests",
            up: r#"
                CREATE TABLE IF NOT EXISTS issues (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    reader_id     INTEGER NOT NULL REFERENCES readers (id) ON DELETE CASCADE,
                    book_id       INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    issued_date   DATE NOT NULL,
                    due_date      DATE NOT NULL,
                    returned_date DATE
                );
                CREATE UNIQUE INDEX IF NOT EXISTS issues_one_open_per_pair
                    ON issues (reader_id, book_id) WHERE returned_date IS NULL;
                CREATE INDEX IF NOT EXISTS issues_due ON issues (due_date) WHERE returned_date IS NULL;

                CREATE TABLE IF NOT EXISTS issue_requests (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    reader_id    INTEGER NOT NULL REFERENCES readers (id) ON DELETE CASCADE,
                    book_id      INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    request_date TEXT NOT NULL,
                    approved     BOOLEAN NOT NULL DEFAULT 0,
                    rejected     BOOLEAN NOT NULL DEFAULT 0
                );
                CREATE UNIQUE INDEX IF NOT EXISTS issue_requests_one_pending_per_pair
                    ON issue_requests (reader_id, book_id) WHERE approved = 0 AND rejected = 0;
                "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}});
        Some(json!({
            "paths": {
                "/issues": {
                    "get": {"summary": "All issues, newest first", "tags": ["Circulation"], "parameters": [{"name": "page", "in": "query", "schema": {"type": "integer"}}], "responses": {"200": {"description": "Page of issues"}}},
                    "post": {
                        "summary": "Issue a book to a reader",
                        "tags": ["Circulation"],
                        "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/IssueCommand"}}}},
                        "responses": {
                            "201": {"description": "Issued", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Issue"}}}},
                            "409": {"description": "Already issued or out of stock", "content": error},
                            "422": {"description": "Limit reached or bad due date", "content": error}
                        }
                    }
                },
                "/issues/overdue": {"get": {"summary": "Open issues past due", "tags": ["Circulation"], "responses": {"200": {"description": "Overdue issues"}}}},
                "/issues/{id}/return": {"post": {"summary": "Mark an issue returned", "tags": ["Circulation"], "responses": {"200": {"description": "Returned"}, "404": {"description": "Not found", "content": error}}}},
                "/requests": {
                    "get": {"summary": "Pending requests, oldest first", "tags": ["Requests"], "responses": {"200": {"description": "Pending requests"}}},
                    "post": {"summary": "Request a book", "tags": ["Requests"], "responses": {"201": {"description": "Requested"}, "409": {"description": "Duplicate", "content": error}, "422": {"description": "Limit reached", "content": error}}}
                },
                "/requests/{id}/approve": {"post": {"summary": "Approve a pending request", "tags": ["Requests"], "responses": {"200": {"description": "Issued or rejected as stale"}, "404": {"description": "No such pending request", "content": error}}}},
                "/requests/{id}/reject": {"post": {"summary": "Reject a pending request", "tags": ["Requests"], "responses": {"200": {"description": "Rejected"}, "404": {"description": "No such pending request", "content": error}}}},
                "/requests/bulk-approve": {"post": {"summary": "Approve several requests", "tags": ["Requests"], "responses": {"200": {"description": "Per-request outcomes"}}}},
                "/requests/bulk-reject": {"post": {"summary": "Reject several requests", "tags": ["Requests"], "responses": {"200": {"description": "Per-request outcomes"}}}},
                "/dashboard": {"get": {"summary": "Reader's issues, fines and unread count", "tags": ["Circulation"], "responses": {"200": {"description": "Dashboard"}}}}
            },
            "components": {
                "schemas": {
                    "Issue": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "reader_id": {"type": "integer"},
                            "book_id": {"type": "integer"},
                            "issued_date": {"type": "string", "format": "date"},
                            "due_date": {"type": "string", "format": "date"},
                            "returned_date": {"type": "string", "format": "date", "nullable": true}
                        },
                        "required": ["id", "reader_id", "book_id", "issued_date", "due_date"]
                    },
                    "IssueCommand": {
                        "type": "object",
                        "properties": {
                            "reader_id": {"type": "integer"},
                            "book_id": {"type": "integer"},
                            "issued_date": {"type": "string", "format": "date"},
                            "due_date": {"type": "string", "format": "date", "description": "At most 30 days after the issue date"}
                        },
                        "required": ["reader_id", "book_id"]
                    }
                }
            }
        }))
    }
}
