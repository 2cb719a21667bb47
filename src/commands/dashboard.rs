use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::models::{DashboardStats, Snapshot};
use crate::services::ledger::{compute_stats, monthly_series, redact_collections, sort_years_desc};
use crate::services::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Full registry and entry list. Collection rows are withheld unless the
/// caller is an admin or holds a collection grant.
pub async fn get_data(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Snapshot>> {
    let access = state.access_for(&headers)?;

    let (mut years, entries) = {
        let db = state.lock_db()?;
        (db.get_years()?, db.get_entries()?)
    };
    sort_years_desc(&mut years);

    let entries = if access.can_view_collections() {
        entries
    } else {
        redact_collections(entries)
    };

    Ok(Json(Snapshot { years, entries }))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(year_id): Path<String>,
) -> ApiResult<Json<DashboardStats>> {
    let (years, entries) = {
        let db = state.lock_db()?;
        (db.get_years()?, db.get_entries_for_year(&year_id)?)
    };

    let stats = compute_stats(&year_id, &entries, &years);
    let chart = monthly_series(&year_id, &entries);

    Ok(Json(DashboardStats { year_id, stats, chart }))
}
