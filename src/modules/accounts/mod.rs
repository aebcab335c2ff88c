//! Readers, admins and their sessions.

pub mod models;
pub mod routes;
pub mod session;
pub mod store;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use crate::state::AppState;

pub struct AccountsModule;

impl AccountsModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            cookie = %ctx.settings.auth.session_cookie,
            ttl_hours = ctx.settings.auth.session_ttl_hours,
            "accounts module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router().with_state(AppState::from_ctx(ctx))
    }

    fn migrations(&self) -> Vec<Migration> {
        let mut migrations = libris_authz::migrations();
        migrations.push(Migration {
            id: "001_readers_admins",
            up: r#"
                CREATE TABLE IF NOT EXISTS readers (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    reader_id       TEXT NOT NULL UNIQUE,
                    name            TEXT NOT NULL,
                    date_of_birth   DATE,
                    phone_number    TEXT NOT NULL DEFAULT '',
                    address         TEXT NOT NULL DEFAULT '',
                    is_staff_member BOOLEAN NOT NULL DEFAULT 0,
                    is_active       BOOLEAN NOT NULL DEFAULT 1,
                    password_hash   TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS admins (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    admin_id      TEXT NOT NULL UNIQUE,
                    name          TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    is_active     BOOLEAN NOT NULL DEFAULT 1,
                    is_superuser  BOOLEAN NOT NULL DEFAULT 0
                );
                "#,
        });
        migrations
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({"$ref": "#/components/schemas/ErrorResponse"});
        let errors = json!({
            "401": {"description": "Login required", "content": {"application/json": {"schema": error}}},
            "422": {"description": "Validation error", "content": {"application/json": {"schema": error}}}
        });
        Some(json!({
            "paths": {
                "/readers/register": {"post": {"summary": "Register a reader and sign in", "tags": ["Accounts"], "responses": {"201": {"description": "Created", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Reader"}}}}, "422": errors["422"]}}},
                "/readers/login": {"post": {"summary": "Reader login", "tags": ["Accounts"], "responses": {"200": {"description": "Session cookie set"}, "401": errors["401"]}}},
                "/admins/register": {"post": {"summary": "Register an admin (first one becomes superuser)", "tags": ["Accounts"], "responses": {"201": {"description": "Created"}, "403": {"description": "Superuser required"}, "409": {"description": "Admin cap reached"}}}},
                "/admins/login": {"post": {"summary": "Admin login", "tags": ["Accounts"], "responses": {"200": {"description": "Session cookie set"}, "401": errors["401"]}}},
                "/logout": {"post": {"summary": "End the current session", "tags": ["Accounts"], "responses": {"204": {"description": "Signed out"}}}},
                "/me": {
                    "get": {"summary": "Reader profile", "tags": ["Accounts"], "responses": {"200": {"description": "Profile"}, "401": errors["401"]}},
                    "put": {"summary": "Edit reader profile", "tags": ["Accounts"], "responses": {"200": {"description": "Updated"}, "422": errors["422"]}},
                    "delete": {"summary": "Delete own reader account", "tags": ["Accounts"], "responses": {"204": {"description": "Deleted"}, "409": {"description": "Unreturned books"}}}
                },
                "/me/password": {"post": {"summary": "Change reader password", "tags": ["Accounts"], "responses": {"204": {"description": "Changed"}, "422": errors["422"]}}},
                "/admins/me": {
                    "get": {"summary": "Admin profile", "tags": ["Accounts"], "responses": {"200": {"description": "Profile"}}},
                    "put": {"summary": "Edit admin profile", "tags": ["Accounts"], "responses": {"200": {"description": "Updated"}}},
                    "delete": {"summary": "Delete own admin account", "tags": ["Accounts"], "responses": {"204": {"description": "Deleted"}, "403": {"description": "Superusers cannot be deleted"}}}
                },
                "/admins/me/password": {"post": {"summary": "Change admin password", "tags": ["Accounts"], "responses": {"204": {"description": "Changed"}}}},
                "/admins/dashboard": {"get": {"summary": "Totals and low-stock books", "tags": ["Accounts"], "responses": {"200": {"description": "Dashboard"}}}},
                "/readers": {
                    "get": {"summary": "List readers", "tags": ["Readers"], "parameters": [{"name": "page", "in": "query", "schema": {"type": "integer"}}], "responses": {"200": {"description": "Page of readers"}}},
                    "post": {"summary": "Create a reader", "tags": ["Readers"], "responses": {"201": {"description": "Created"}, "422": errors["422"]}}
                },
                "/readers/{id}": {
                    "get": {"summary": "Reader with issue history", "tags": ["Readers"], "responses": {"200": {"description": "Reader"}, "404": {"description": "Not found"}}},
                    "put": {"summary": "Edit a reader", "tags": ["Readers"], "responses": {"200": {"description": "Updated"}}},
                    "delete": {"summary": "Delete a reader", "tags": ["Readers"], "responses": {"204": {"description": "Deleted"}, "409": {"description": "Unreturned books"}}}
                },
                "/readers/{id}/toggle-active": {"post": {"summary": "Activate or deactivate a reader", "tags": ["Readers"], "responses": {"200": {"description": "Updated"}}}},
                "/readers/{id}/reset-password": {"post": {"summary": "Reset to the temporary password", "tags": ["Readers"], "responses": {"200": {"description": "Temporary password"}}}}
            },
            "components": {
                "schemas": {
                    "Reader": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "reader_id": {"type": "string", "description": "Library card number"},
                            "name": {"type": "string"},
                            "date_of_birth": {"type": "string", "format": "date", "nullable": true},
                            "phone_number": {"type": "string"},
                            "address": {"type": "string"},
                            "is_staff_member": {"type": "boolean"},
                            "is_active": {"type": "boolean"}
                        },
                        "required": ["id", "reader_id", "name", "is_staff_member", "is_active"]
                    }
                }
            }
        }))
    }
}
