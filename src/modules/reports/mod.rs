//! CSV import and export.

pub mod error;
pub mod exporter;
pub mod importer;
pub mod routes;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Module};
use serde_json::json;

pub use error::ReportError;

use crate::state::AppState;

pub struct ReportsModule;

impl ReportsModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for ReportsModule {
    fn name(&self) -> &'static str {
        "reports"
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router().with_state(AppState::from_ctx(ctx))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let csv_body = json!({"content": {"text/csv": {"schema": {"type": "string"}}}});
        let format = json!({"name": "format", "in": "query", "schema": {"type": "string", "enum": ["csv"]}});
        let attachment = json!({"description": "CSV attachment", "content": {"text/csv": {"schema": {"type": "string"}}}});
        Some(json!({
            "paths": {
                "/import/issues": {"post": {
                    "summary": "Create issues from reader_id,isbn,issued_date,due_date rows",
                    "tags": ["Reports"],
                    "requestBody": csv_body,
                    "responses": {"200": {"description": "created/skipped/errors counts"}}
                }},
                "/import/books": {"post": {
                    "summary": "Upsert books by ISBN",
                    "tags": ["Reports"],
                    "requestBody": csv_body,
                    "responses": {"200": {"description": "created/updated counts"}, "422": {"description": "Missing columns or bad row"}}
                }},
                "/export/issues": {"get": {"summary": "All issues", "tags": ["Reports"], "parameters": [format], "responses": {"200": attachment}}},
                "/export/fines": {"get": {"summary": "All fines", "tags": ["Reports"], "parameters": [format], "responses": {"200": attachment}}},
                "/export/readers": {"get": {"summary": "All readers", "tags": ["Reports"], "parameters": [format], "responses": {"200": attachment}}}
            }
        }))
    }
}
