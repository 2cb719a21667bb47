use axum::{extract::State, http::HeaderMap, Json};
use jsonschema::JSONSchema;
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::commands::extract::ApiJson;
use crate::error::{ApiError, ApiResult, LedgerError};
use crate::models::{EntryPayload, ImportSummary, Snapshot, YearRecord};
use crate::services::ledger::sort_years_desc;
use crate::services::state::AppState;
use crate::services::validation::validate_entry;

pub async fn export_snapshot(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Snapshot>> {
    state.require_admin(&headers)?;

    let db = state.lock_db()?;
    let mut years = db.get_years()?;
    sort_years_desc(&mut years);
    let entries = db.get_entries()?;
    tracing::info!(years = years.len(), entries = entries.len(), "snapshot exported");

    Ok(Json(Snapshot { years, entries }))
}

/// Merges a previously exported snapshot into the store. Nothing is written
/// unless the whole document passes.
pub async fn import_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(document): ApiJson<Value>,
) -> ApiResult<Json<ImportSummary>> {
    state.require_admin(&headers)?;

    check_shape(&document)?;
    let snapshot: Snapshot = serde_json::from_value(document)
        .map_err(|e| ApiError::BadRequest(format!("Invalid backup file: {}", e)))?;

    let mut db = state.lock_db()?;
    let registry = db.get_years()?;
    let snapshot = prepare_snapshot(snapshot, &registry)?;

    for entry in &snapshot.entries {
        if let Some(existing) = db.get_entry(&entry.id)? {
            ensure_open(&existing.year_id, &registry)?;
        }
    }

    let (years, entries) = db.import_snapshot(&snapshot)?;
    let skipped = snapshot.years.len().saturating_sub(years);
    if skipped > 0 {
        tracing::warn!(skipped, "closed years in backup left unchanged");
    }
    tracing::info!(years, entries, "snapshot imported");

    Ok(Json(ImportSummary {
        success: true,
        years,
        entries,
    }))
}

fn backup_schema() -> Value {
    json!({
        "type": "object",
        "required": ["years", "entries"],
        "properties": {
            "years": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "openingBalance", "isClosed"],
                    "properties": {
                        "id": {"type": "string", "minLength": 1},
                        "openingBalance": {"type": "number"},
                        "isClosed": {"type": "boolean"},
                        "closedAt": {"type": ["string", "null"]}
                    }
                }
            },
            "entries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "type", "title", "amount", "date", "yearId"],
                    "properties": {
                        "id": {"type": "string", "minLength": 1},
                        "type": {"enum": ["collection", "expense"]},
                        "title": {"type": "string"},
                        "amount": {"type": "number", "minimum": 0},
                        "date": {"type": "string"},
                        "yearId": {"type": "string", "minLength": 1},
                        "receiptImage": {"type": ["string", "null"]}
                    }
                }
            }
        }
    })
}

fn check_shape(document: &Value) -> ApiResult<()> {
    let schema = backup_schema();
    let compiled = JSONSchema::compile(&schema)
        .map_err(|e| ApiError::Internal(format!("Backup schema failed to compile: {}", e)))?;

    if let Err(errors) = compiled.validate(document) {
        let problems: Vec<String> = errors.map(|e| format!("{} at {}", e, e.instance_path)).collect();
        tracing::warn!(problems = problems.len(), "rejected malformed backup");
        return Err(ApiError::BadRequest(format!(
            "Invalid backup file: {}",
            problems.join("; ")
        )));
    }

    Ok(())
}

fn ensure_open(year_id: &str, registry: &[YearRecord]) -> Result<(), LedgerError> {
    match registry.iter().find(|y| y.id == year_id) {
        Some(year) if year.is_closed => Err(LedgerError::YearClosed(year.id.clone())),
        _ => Ok(()),
    }
}

/// Normalizes entries and checks that each one references a year that is
/// either in the document or already registered, and that it would not
/// write into a year closed here.
fn prepare_snapshot(snapshot: Snapshot, registry: &[YearRecord]) -> Result<Snapshot, LedgerError> {
    let known: HashSet<&str> = snapshot
        .years
        .iter()
        .map(|y| y.id.as_str())
        .chain(registry.iter().map(|y| y.id.as_str()))
        .collect();

    let mut entries = Vec::with_capacity(snapshot.entries.len());
    for entry in &snapshot.entries {
        if !known.contains(entry.year_id.as_str()) {
            return Err(LedgerError::YearNotFound(entry.year_id.clone()));
        }
        ensure_open(&entry.year_id, registry)?;

        // Receipts in a backup were already accepted once; size is not rechecked.
        let payload = validate_entry(EntryPayload::from(entry.clone()), usize::MAX)?;
        let id = payload
            .id
            .clone()
            .ok_or_else(|| LedgerError::Validation("Entry id is required".to_string()))?;
        entries.push(payload.into_entry(id));
    }

    Ok(Snapshot {
        years: snapshot.years,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entry, EntryType};

    fn entry(id: &str, year_id: &str, date: &str) -> Entry {
        Entry {
            id: id.to_string(),
            entry_type: EntryType::Expense,
            title: " Paint ".to_string(),
            amount: 10.0,
            date: date.to_string(),
            year_id: year_id.to_string(),
            receipt_image: None,
        }
    }

    #[test]
    fn schema_rejects_negative_amounts() {
        let doc = json!({
            "years": [],
            "entries": [{"id": "e1", "type": "expense", "title": "x", "amount": -1, "date": "2024-01-01", "yearId": "2024"}]
        });
        assert!(check_shape(&doc).is_err());
    }

    #[test]
    fn schema_accepts_exported_shape() {
        let snapshot = Snapshot {
            years: vec![YearRecord::open("2024", 5.0)],
            entries: vec![entry("e1", "2024", "2024-02-01")],
        };
        let doc = serde_json::to_value(&snapshot).unwrap();
        assert!(check_shape(&doc).is_ok());
    }

    #[test]
    fn prepare_normalizes_titles_and_dates() {
        let snapshot = Snapshot {
            years: vec![YearRecord::open("2024", 0.0)],
            entries: vec![entry("e1", "2024", "2024-02-01T10:00:00Z")],
        };
        let prepared = prepare_snapshot(snapshot, &[]).unwrap();
        assert_eq!(prepared.entries[0].title, "Paint");
        assert_eq!(prepared.entries[0].date, "2024-02-01");
    }

    #[test]
    fn prepare_rejects_unknown_year_reference() {
        let snapshot = Snapshot {
            years: vec![],
            entries: vec![entry("e1", "1999", "1999-02-01")],
        };
        assert_eq!(
            prepare_snapshot(snapshot, &[YearRecord::open("2024", 0.0)]),
            Err(LedgerError::YearNotFound("1999".to_string()))
        );
    }

    #[test]
    fn prepare_refuses_entries_for_closed_registry_year() {
        let mut closed = YearRecord::open("2023", 0.0);
        closed.is_closed = true;
        let snapshot = Snapshot {
            years: vec![],
            entries: vec![entry("e1", "2023", "2023-02-01")],
        };
        assert_eq!(
            prepare_snapshot(snapshot, &[closed]),
            Err(LedgerError::YearClosed("2023".to_string()))
        );
    }
}
