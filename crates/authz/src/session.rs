use chrono::{DateTime, Duration, Utc};
use libris_kernel::Migration;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::AuthError;

/// The kind of account a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PrincipalKind {
    Reader,
    Admin,
}

/// Authenticated party behind a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub id: i64,
}

impl Principal {
    pub fn reader(id: i64) -> Self {
        Self {
            kind: PrincipalKind::Reader,
            id,
        }
    }

    pub fn admin(id: i64) -> Self {
        Self {
            kind: PrincipalKind::Admin,
            id,
        }
    }
}

/// Schema for the session table.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "000_sessions",
        up: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token        TEXT PRIMARY KEY,
                kind         TEXT NOT NULL CHECK (kind IN ('reader', 'admin')),
                principal_id INTEGER NOT NULL,
                expires_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS sessions_principal ON sessions (kind, principal_id);
            "#,
    }]
}

/// Server-side session table keyed by an opaque random token.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(pool: SqlitePool, ttl_hours: i64) -> Self {
        Self {
            pool,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Open a session for the principal and return its token.
    pub async fn create(&self, principal: Principal) -> Result<String, AuthError> {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + self.ttl;

        sqlx::query(
            "INSERT INTO sessions (token, kind, principal_id, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(principal.kind)
        .bind(principal.id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(target: "libris-authz", kind = ?principal.kind, id = principal.id, "session opened");
        Ok(token)
    }

    /// Look up a live session. Expired sessions are removed and resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<Option<Principal>, AuthError> {
        let row: Option<(PrincipalKind, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT kind, principal_id, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((kind, id, expires_at)) if expires_at > Utc::now() => {
                Ok(Some(Principal { kind, id }))
            }
            Some(_) => {
                self.destroy(token).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn destroy(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop every session of a principal, e.g. after the account is deleted.
    pub async fn destroy_all(&self, principal: Principal) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE kind = ? AND principal_id = ?")
            .bind(principal.kind)
            .bind(principal.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(ttl_hours: i64) -> SessionStore {
        let pool = libris_db::connect_in_memory().await.unwrap();
        let schema: Vec<(String, Migration)> = migrations()
            .into_iter()
            .map(|m| ("authz".to_string(), m))
            .collect();
        libris_db::run_migrations(&pool, &schema).await.unwrap();
        SessionStore::new(pool, ttl_hours)
    }

    #[tokio::test]
    async fn create_resolve_destroy() {
        let sessions = store(1).await;
        let token = sessions.create(Principal::reader(7)).await.unwrap();

        let principal = sessions.resolve(&token).await.unwrap();
        assert_eq!(principal, Some(Principal::reader(7)));

        sessions.destroy(&token).await.unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let sessions = store(-1).await;
        let token = sessions.create(Principal::admin(1)).await.unwrap();
        assert_eq!(sessions.resolve(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn destroy_all_only_hits_one_principal() {
        let sessions = store(1).await;
        sessions.create(Principal::reader(3)).await.unwrap();
        sessions.create(Principal::reader(3)).await.unwrap();
        let admin = sessions.create(Principal::admin(3)).await.unwrap();

        assert_eq!(sessions.destroy_all(Principal::reader(3)).await.unwrap(), 2);
        assert_eq!(
            sessions.resolve(&admin).await.unwrap(),
            Some(Principal::admin(3))
        );
    }
}
