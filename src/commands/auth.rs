use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use crate::commands::extract::ApiJson;
use crate::error::{ApiError, ApiResult};
use crate::models::AuthResponse;
use crate::services::crypto::CryptoService;
use crate::services::state::{AppState, COLLECTION_KEY_SETTING};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionKeyPayload {
    pub key: String,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> ApiResult<Json<AuthResponse>> {
    let account = state.lock_db()?.find_admin(payload.username.trim())?;

    let account = match account {
        Some(account) if CryptoService::verify_secret(&payload.password, &account.password_hash) => account,
        _ => {
            tracing::warn!(username = %payload.username, "failed admin login");
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    let session = state.issue_admin_session(&account.username)?;
    tracing::info!(username = %session.username, "admin logged in");

    Ok(Json(AuthResponse {
        success: true,
        username: Some(session.username),
        token: Some(session.token),
        error: None,
    }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<AuthResponse>> {
    let session = state.require_admin(&headers)?;
    state.revoke_admin_session(&session)?;
    tracing::info!(username = %session.username, "admin logged out");
    Ok(Json(AuthResponse::ok()))
}

pub async fn verify_collection_key(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CollectionKeyPayload>,
) -> ApiResult<Json<AuthResponse>> {
    let stored = state.lock_db()?.get_setting(COLLECTION_KEY_SETTING)?;

    let verified = stored
        .as_deref()
        .map(|hash| CryptoService::verify_secret(&payload.key, hash))
        .unwrap_or(false);
    if !verified {
        tracing::warn!("failed collection passkey attempt");
        return Err(ApiError::Unauthorized("Invalid passkey".to_string()));
    }

    let token = state.grant_collection_access()?;
    Ok(Json(AuthResponse {
        success: true,
        token: Some(token),
        ..Default::default()
    }))
}
