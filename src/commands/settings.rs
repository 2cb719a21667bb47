use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use crate::commands::extract::ApiJson;
use crate::error::{ApiError, ApiResult};
use crate::models::AuthResponse;
use crate::services::crypto::CryptoService;
use crate::services::state::{AppState, COLLECTION_KEY_SETTING};
use crate::services::validation::validate_new_secret;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordPayload {
    pub current_password: String,
    pub new_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollectionKeyPayload {
    pub admin_password: String,
    pub new_collection_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_collection_key: Option<String>,
}

pub async fn update_admin_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<UpdatePasswordPayload>,
) -> ApiResult<Json<AuthResponse>> {
    let session = state.require_admin(&headers)?;
    validate_new_secret(&payload.new_password, payload.confirm_password.as_deref())?;

    let db = state.lock_db()?;
    let account = db
        .find_admin(&session.username)?
        .ok_or_else(|| ApiError::Unauthorized("Admin account not found".to_string()))?;
    if !CryptoService::verify_secret(&payload.current_password, &account.password_hash) {
        tracing::warn!(username = %account.username, "password change with wrong current password");
        return Err(ApiError::Unauthorized("Current password incorrect".to_string()));
    }

    let hash = CryptoService::hash_secret(&payload.new_password)?;
    db.update_admin_password(&account.username, &hash)?;
    tracing::info!(username = %account.username, "admin password updated");

    Ok(Json(AuthResponse::ok()))
}

pub async fn update_collection_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<UpdateCollectionKeyPayload>,
) -> ApiResult<Json<AuthResponse>> {
    let session = state.require_admin(&headers)?;
    validate_new_secret(
        &payload.new_collection_key,
        payload.confirm_collection_key.as_deref(),
    )?;

    {
        let db = state.lock_db()?;
        let account = db
            .find_admin(&session.username)?
            .ok_or_else(|| ApiError::Unauthorized("Admin account not found".to_string()))?;
        if !CryptoService::verify_secret(&payload.admin_password, &account.password_hash) {
            tracing::warn!(username = %account.username, "passkey change with wrong admin password");
            return Err(ApiError::Unauthorized("Admin verification failed.".to_string()));
        }

        let hash = CryptoService::hash_secret(&payload.new_collection_key)?;
        db.set_setting(COLLECTION_KEY_SETTING, &hash)?;
    }

    // Unlocks granted under the old passkey end here.
    state.clear_collection_grants()?;
    tracing::info!("collection passkey updated");

    Ok(Json(AuthResponse::ok()))
}
