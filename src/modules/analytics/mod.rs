//! Per-book daily issuance counts.

pub mod models;
pub mod routes;
pub mod store;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;

pub struct AnalyticsModule;

impl AnalyticsModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for AnalyticsModule {
    fn name(&self) -> &'static str {
        "analytics"
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router().with_state(AppState::from_ctx(ctx))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_book_issuance_records",
            up: r#"
                CREATE TABLE IF NOT EXISTS book_issuance_records (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    book_id         INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    date            DATE NOT NULL,
                    quantity_issued INTEGER NOT NULL DEFAULT 0,
                    UNIQUE (book_id, date)
                );
                "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/books/{id}": {"get": {
                    "summary": "Daily issue counts for a book",
                    "tags": ["Analytics"],
                    "parameters": [{"name": "days", "in": "query", "schema": {"type": "integer", "default": 90}}],
                    "responses": {
                        "200": {"description": "Series and totals", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BookAnalytics"}}}},
                        "404": {"description": "Unknown book"}
                    }
                }},
                "/popular": {"get": {"summary": "Up to three random books rated above 4.5", "tags": ["Analytics"], "responses": {"200": {"description": "Books"}}}}
            },
            "components": {
                "schemas": {
                    "BookAnalytics": {
                        "type": "object",
                        "properties": {
                            "book_id": {"type": "integer"},
                            "days": {"type": "integer"},
                            "dates": {"type": "array", "items": {"type": "string", "format": "date"}},
                            "quantities": {"type": "array", "items": {"type": "integer"}},
                            "total_issued": {"type": "integer"},
                            "avg_per_day": {"type": "number"}
                        }
                    }
                }
            }
        }))
    }
}
