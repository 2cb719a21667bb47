use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::error::{ApiError, ApiResult, LedgerError};
use crate::models::{AnalysisReport, YearRecord};
use crate::services::analysis::FinancialAnalyst;
use crate::services::ledger::{close_year as close_transition, compute_stats, next_year};
use crate::services::state::AppState;
use crate::utils::now_rfc3339;

pub async fn create_next_year(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<YearRecord>> {
    state.require_admin(&headers)?;

    let db = state.lock_db()?;
    let years = db.get_years()?;
    let entries = db.get_entries()?;
    let next = next_year(&years, &entries)?;
    db.insert_year(&next)?;
    tracing::info!(year = %next.id, opening_balance = next.opening_balance, "fiscal year opened");

    Ok(Json(next))
}

pub async fn close_year(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(year_id): Path<String>,
) -> ApiResult<Json<YearRecord>> {
    state.require_admin(&headers)?;

    let db = state.lock_db()?;
    let year = db
        .get_year(&year_id)?
        .ok_or_else(|| LedgerError::YearNotFound(year_id.clone()))?;
    let closed = close_transition(&year, now_rfc3339())?;
    db.mark_year_closed(&closed)?;
    tracing::info!(year = %closed.id, "fiscal year closed");

    Ok(Json(closed))
}

pub async fn analyze_year(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(year_id): Path<String>,
) -> ApiResult<Json<AnalysisReport>> {
    state.require_admin(&headers)?;
    if state.config.analysis.api_key.is_none() {
        return Err(ApiError::BadRequest("AI analysis is not configured".to_string()));
    }

    let (stats, entries) = {
        let db = state.lock_db()?;
        if db.get_year(&year_id)?.is_none() {
            return Err(LedgerError::YearNotFound(year_id).into());
        }
        let years = db.get_years()?;
        let entries = db.get_entries_for_year(&year_id)?;
        (compute_stats(&year_id, &entries, &years), entries)
    };

    let report = FinancialAnalyst::analyze(&state.config.analysis, &year_id, &stats, &entries)
        .await
        .map_err(|e| ApiError::Internal(format!("Unable to generate AI analysis: {}", e)))?;

    Ok(Json(AnalysisReport { year_id, report }))
}
