//! Reader notifications: issued, due soon, overdue and rejected requests.

pub mod generator;
pub mod models;
pub mod routes;
pub mod store;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;

pub struct NotificationsModule;

impl NotificationsModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for NotificationsModule {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router().with_state(AppState::from_ctx(ctx))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_notifications",
            up: r#"
                CREATE TABLE IF NOT EXISTS notifications (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    reader_id  INTEGER NOT NULL REFERENCES readers (id) ON DELETE CASCADE,
                    issue_id   INTEGER REFERENCES issues (id) ON DELETE CASCADE,
                    kind       TEXT NOT NULL
                               CHECK (kind IN ('issued', 'due_soon', 'overdue', 'request_rejected')),
                    title      TEXT NOT NULL,
                    message    TEXT NOT NULL,
                    is_read    BOOLEAN NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS notifications_one_per_issue_kind
                    ON notifications (issue_id, kind) WHERE issue_id IS NOT NULL;
                CREATE INDEX IF NOT EXISTS notifications_reader ON notifications (reader_id, is_read);
                "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {"get": {"summary": "Reader's notifications with unread count", "tags": ["Notifications"], "responses": {"200": {"description": "Inbox"}, "401": {"description": "Reader login required"}}}},
                "/{id}/read": {"post": {"summary": "Mark one notification read", "tags": ["Notifications"], "responses": {"200": {"description": "Updated"}, "404": {"description": "Not found"}}}},
                "/read-all": {"post": {"summary": "Mark every notification read", "tags": ["Notifications"], "responses": {"200": {"description": "Number updated"}}}}
            }
        }))
    }
}
