pub mod auth;
pub mod backup;
pub mod dashboard;
pub mod entries;
pub mod extract;
pub mod settings;
pub mod years;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::services::state::AppState;

/// Receipts ride inside JSON bodies as data URLs.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Every HTTP route the fund exposes. Admin checks happen inside handlers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(dashboard::health))
        // Public reads
        .route("/api/data", get(dashboard::get_data))
        .route("/api/years/:year_id/dashboard", get(dashboard::get_dashboard))
        // Access
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/verify-collection-key", post(auth::verify_collection_key))
        .route("/api/admin/update-password", post(settings::update_admin_password))
        .route("/api/admin/update-collection-key", post(settings::update_collection_key))
        // Entries
        .route("/api/entries", get(entries::list_entries).post(entries::save_entry))
        .route("/api/entries/:id", delete(entries::delete_entry))
        // Fiscal years
        .route("/api/years/next", post(years::create_next_year))
        .route("/api/years/:year_id/close", post(years::close_year))
        .route("/api/years/:year_id/analysis", post(years::analyze_year))
        // Backup
        .route("/api/admin/export", get(backup::export_snapshot))
        .route("/api/admin/import", post(backup::import_snapshot))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
