pub mod accounts;
pub mod analytics;
pub mod catalog;
pub mod circulation;
pub mod fines;
pub mod notifications;
pub mod reports;

use std::sync::Arc;

use libris_kernel::ModuleRegistry;

/// Register every domain module with the registry
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(Arc::new(accounts::AccountsModule::new()));
    registry.register(Arc::new(catalog::CatalogModule::new()));
    registry.register(Arc::new(circulation::CirculationModule::new()));
    registry.register(Arc::new(fines::FinesModule::new()));
    registry.register(Arc::new(notifications::NotificationsModule::new()));
    registry.register(Arc::new(analytics::AnalyticsModule::new()));
    registry.register(Arc::new(reports::ReportsModule::new()));
}
