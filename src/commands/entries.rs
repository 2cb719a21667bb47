use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::commands::extract::{ApiJson, ApiQuery};
use crate::error::ApiResult;
use crate::models::{Ack, Entry, EntryPayload, EntryType, SaveEntryResponse};
use crate::services::ledger::{filter_entries, writable_year};
use crate::services::state::AppState;
use crate::services::validation::validate_entry;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryQuery {
    pub year_id: String,
    #[serde(rename = "type", default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub search: Option<String>,
}

pub async fn list_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<EntryQuery>,
) -> ApiResult<Json<Vec<Entry>>> {
    state.require_admin(&headers)?;
    let entries = state.lock_db()?.get_entries_for_year(&query.year_id)?;
    Ok(Json(filter_entries(
        &entries,
        &query.year_id,
        query.entry_type,
        query.search.as_deref(),
    )))
}

/// Creates the entry when it carries no id, otherwise replaces the stored
/// record with that id. Both the target year and, on edit, the entry's
/// current year must be open.
pub async fn save_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<EntryPayload>,
) -> ApiResult<Json<SaveEntryResponse>> {
    state.require_admin(&headers)?;
    let payload = validate_entry(payload, state.config.max_receipt_bytes)?;

    let db = state.lock_db()?;
    let years = db.get_years()?;
    writable_year(&payload.year_id, &years)?;

    let id = match payload.id.clone() {
        Some(id) => {
            if let Some(existing) = db.get_entry(&id)? {
                writable_year(&existing.year_id, &years)?;
            }
            id
        }
        None => uuid::Uuid::new_v4().to_string(),
    };

    let entry = payload.into_entry(id);
    db.upsert_entry(&entry)?;
    tracing::info!(id = %entry.id, year = %entry.year_id, kind = %entry.entry_type, "entry saved");

    Ok(Json(SaveEntryResponse {
        success: true,
        entry,
    }))
}

/// Unknown ids succeed without effect.
pub async fn delete_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Ack>> {
    state.require_admin(&headers)?;

    let db = state.lock_db()?;
    if let Some(existing) = db.get_entry(&id)? {
        let years = db.get_years()?;
        writable_year(&existing.year_id, &years)?;
        db.delete_entry(&id)?;
        tracing::info!(id = %id, year = %existing.year_id, "entry deleted");
    }

    Ok(Json(Ack::ok()))
}
