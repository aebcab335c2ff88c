use std::sync::Arc;

use libris_authz::SessionStore;
use libris_kernel::settings::{LibrarySettings, Settings};
use libris_kernel::InitCtx;
use sqlx::SqlitePool;

/// Shared handler state: the pool, the loaded settings and the session table.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: Settings) -> Self {
        let sessions = SessionStore::new(db.clone(), settings.auth.session_ttl_hours);
        Self {
            db,
            settings: Arc::new(settings),
            sessions,
        }
    }

    pub fn from_ctx(ctx: &InitCtx<'_>) -> Self {
        Self::new(ctx.db.clone(), ctx.settings.clone())
    }

    /// Circulation rules
    pub fn rules(&self) -> &LibrarySettings {
        &self.settings.library
    }
}
