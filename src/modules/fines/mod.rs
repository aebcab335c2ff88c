//! Overdue fines.

pub mod engine;
pub mod models;
pub mod routes;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;

pub struct FinesModule;

impl FinesModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for FinesModule {
    fn name(&self) -> &'static str {
        "fines"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            per_day = ctx.settings.library.fine_per_day,
            "fines module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router().with_state(AppState::from_ctx(ctx))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_fines",
            up: r#"
                CREATE TABLE IF NOT EXISTS fines (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_id        INTEGER NOT NULL UNIQUE REFERENCES issues (id) ON DELETE CASCADE,
                    amount          INTEGER NOT NULL CHECK (amount >= 0),
                    paid            BOOLEAN NOT NULL DEFAULT 0,
                    calculated_date DATE NOT NULL
                );
                "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {"get": {"summary": "All fines, newest assessment first", "tags": ["Fines"], "parameters": [{"name": "page", "in": "query", "schema": {"type": "integer"}}], "responses": {"200": {"description": "Page of fines"}}}},
                "/mine": {"get": {"summary": "Signed-in reader's unpaid fines", "tags": ["Fines"], "responses": {"200": {"description": "Unpaid fines"}, "401": {"description": "Reader login required"}}}},
                "/{id}/pay": {"post": {"summary": "Mark a fine paid", "tags": ["Fines"], "responses": {"200": {"description": "Paid"}, "404": {"description": "Not found"}}}},
                "/sweep": {"post": {
                    "summary": "Assess fines and send due-soon/overdue reminders",
                    "tags": ["Fines"],
                    "parameters": [{"name": "date", "in": "query", "schema": {"type": "string", "format": "date"}}],
                    "responses": {"200": {"description": "Sweep report", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/SweepReport"}}}}}
                }}
            },
            "components": {
                "schemas": {
                    "SweepReport": {
                        "type": "object",
                        "properties": {
                            "fines_created": {"type": "integer"},
                            "due_soon_notices": {"type": "integer"},
                            "overdue_notices": {"type": "integer"}
                        }
                    }
                }
            }
        }))
    }
}
