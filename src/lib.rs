//! Libris application library
//!
//! Domain modules for the library service plus the bootstrap entry points the
//! binaries call.

pub mod modules;
pub mod state;
pub mod utils;

#[cfg(test)]
mod testing;

use anyhow::Context;
use chrono::NaiveDate;
use libris_kernel::settings::Settings;
use libris_kernel::{InitCtx, ModuleRegistry};
use sqlx::SqlitePool;

use modules::fines::models::SweepReport;

/// Registry with every domain module registered
pub fn build_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

async fn prepare(settings: &Settings, registry: &ModuleRegistry) -> anyhow::Result<SqlitePool> {
    let db = libris_db::connect(&settings.database).await?;
    let applied = libris_db::run_migrations(&db, &registry.collect_migrations()).await?;
    tracing::info!(applied, "database schema up to date");
    Ok(db)
}

/// Apply pending migrations and report how many ran
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let registry = build_registry();
    let db = libris_db::connect(&settings.database).await?;
    libris_db::run_migrations(&db, &registry.collect_migrations()).await
}

/// Run the HTTP service until shutdown
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let registry = build_registry();
    let db = prepare(settings, &registry).await?;
    let ctx = InitCtx { settings, db: &db };

    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = libris_http::start_server(&registry, &ctx).await;

    registry.stop_modules().await?;
    db.close().await;
    served
}

/// Assess overdue fines and send due-soon/overdue notices as of `date`
/// (today when omitted)
pub async fn sweep(settings: &Settings, date: Option<NaiveDate>) -> anyhow::Result<SweepReport> {
    let registry = build_registry();
    let db = prepare(settings, &registry).await?;
    let today = date.unwrap_or_else(utils::today);
    let report = modules::fines::engine::run_sweep(&db, &settings.library, today)
        .await
        .with_context(|| format!("sweep for {today} failed"))?;
    db.close().await;
    Ok(report)
}
