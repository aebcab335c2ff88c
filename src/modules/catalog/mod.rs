//! Books, categories and reader ratings.

pub mod models;
pub mod routes;
pub mod store;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;

pub struct CatalogModule;

impl CatalogModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for CatalogModule {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let books = store::count_books(ctx.db).await?;
        tracing::info!(module = self.name(), books, "catalog module initialized");
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router().with_state(AppState::from_ctx(ctx))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_books_categories",
            up: r#"
                CREATE TABLE IF NOT EXISTS categories (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS books (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    name            TEXT NOT NULL,
                    isbn            TEXT NOT NULL UNIQUE,
                    author          TEXT NOT NULL,
                    category_id     INTEGER REFERENCES categories (id) ON DELETE SET NULL,
                    number_in_stock INTEGER NOT NULL DEFAULT 0 CHECK (number_in_stock >= 0),
                    description     TEXT NOT NULL DEFAULT '',
                    rating          REAL NOT NULL DEFAULT 4.0,
                    status          TEXT NOT NULL DEFAULT 'available'
                                    CHECK (status IN ('available', 'issued', 'lost'))
                );
                CREATE INDEX IF NOT EXISTS books_category ON books (category_id);
                CREATE TABLE IF NOT EXISTS book_ratings (
                    id        INTEGER PRIMARY KEY AUTOINCREMENT,
                    book_id   INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    reader_id INTEGER NOT NULL REFERENCES readers (id) ON DELETE CASCADE,
                    rating    REAL NOT NULL CHECK (rating BETWEEN 1 AND 5),
                    UNIQUE (book_id, reader_id)
                );
                "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let page = json!({"name": "page", "in": "query", "schema": {"type": "integer"}});
        let q = json!({"name": "q", "in": "query", "schema": {"type": "string"}, "description": "Matches name, author or ISBN"});
        let category = json!({"name": "category", "in": "query", "schema": {"type": "integer"}});
        Some(json!({
            "paths": {
                "/books": {
                    "get": {"summary": "Search and list books", "tags": ["Catalog"], "parameters": [q, category, page], "responses": {"200": {"description": "Page of books"}}},
                    "post": {
                        "summary": "Add a book",
                        "tags": ["Catalog"],
                        "requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/BookInput"}}}},
                        "responses": {"201": {"description": "Created", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Book"}}}}, "409": {"description": "Duplicate ISBN"}, "422": {"description": "Validation error"}}
                    }
                },
                "/books/search": {"get": {"summary": "Type-ahead search", "tags": ["Catalog"], "parameters": [q, category, {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 8}}], "responses": {"200": {"description": "Search hits"}}}},
                "/books/bulk": {"post": {"summary": "Set category and/or status on many books", "tags": ["Catalog"], "responses": {"200": {"description": "Number of books updated"}}}},
                "/books/{id}": {
                    "get": {"summary": "Book with ratings, analytics and popular picks", "tags": ["Catalog"], "responses": {"200": {"description": "Book detail"}, "404": {"description": "Not found"}}},
                    "put": {"summary": "Replace a book", "tags": ["Catalog"], "responses": {"200": {"description": "Updated"}, "404": {"description": "Not found"}}},
                    "delete": {"summary": "Delete a book", "tags": ["Catalog"], "responses": {"204": {"description": "Deleted"}, "404": {"description": "Not found"}}}
                },
                "/books/{id}/rating": {"post": {"summary": "Rate a book 1-5", "tags": ["Catalog"], "responses": {"200": {"description": "Updated rating summary"}, "401": {"description": "Reader login required"}}}},
                "/categories": {
                    "get": {"summary": "Categories by name", "tags": ["Catalog"], "responses": {"200": {"description": "Categories"}}},
                    "post": {"summary": "Add a category", "tags": ["Catalog"], "responses": {"201": {"description": "Created"}, "409": {"description": "Duplicate name"}}}
                },
                "/categories/{id}": {
                    "put": {"summary": "Rename a category", "tags": ["Catalog"], "responses": {"200": {"description": "Renamed"}}},
                    "delete": {"summary": "Delete a category, uncategorising its books", "tags": ["Catalog"], "responses": {"204": {"description": "Deleted"}}}
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "name": {"type": "string"},
                            "isbn": {"type": "string"},
                            "author": {"type": "string"},
                            "category_id": {"type": "integer", "nullable": true},
                            "number_in_stock": {"type": "integer", "minimum": 0},
                            "description": {"type": "string"},
                            "rating": {"type": "number", "minimum": 1, "maximum": 5},
                            "status": {"type": "string", "enum": ["available", "issued", "lost"]}
                        },
                        "required": ["id", "name", "isbn", "author", "number_in_stock", "rating", "status"]
                    },
                    "BookInput": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "isbn": {"type": "string"},
                            "author": {"type": "string"},
                            "category_id": {"type": "integer"},
                            "number_in_stock": {"type": "integer"},
                            "description": {"type": "string"},
                            "rating": {"type": "number"},
                            "status": {"type": "string", "enum": ["available", "issued", "lost"]}
                        },
                        "required": ["name", "isbn", "author"]
                    }
                }
            }
        }))
    }
}
