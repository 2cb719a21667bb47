use anyhow::{anyhow, Result};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Config;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{AdminSession, YearRecord};
use crate::services::access::AccessGate;
use crate::services::crypto::CryptoService;
use crate::utils::{current_year_id, sha256_hex};

pub const COLLECTION_TOKEN_HEADER: &str = "x-collection-token";
pub const COLLECTION_KEY_SETTING: &str = "collection_key_hash";
pub const MAX_COLLECTION_GRANTS: usize = 1024;

/// Digests of live passkey grants. Past capacity the oldest grant is dropped.
#[derive(Debug)]
pub struct GrantRegistry {
    capacity: usize,
    order: VecDeque<String>,
    live: HashSet<String>,
}

impl GrantRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        GrantRegistry {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            live: HashSet::new(),
        }
    }

    pub fn insert(&mut self, digest: String) {
        if !self.live.insert(digest.clone()) {
            return;
        }
        self.order.push_back(digest);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.live.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.live.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.live.clear();
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<Config>,
    // Passkey unlocks live only as long as the process.
    collection_grants: Arc<Mutex<GrantRegistry>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        AppState {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
            collection_grants: Arc::new(Mutex::new(GrantRegistry::with_capacity(MAX_COLLECTION_GRANTS))),
        }
    }

    /// Seeds the default credentials and the current fiscal year when the
    /// store is empty. Safe to run on every start.
    pub fn bootstrap(&self) -> Result<()> {
        let db = self.db.lock().map_err(|_| anyhow!("DB lock"))?;
        let defaults = &self.config.bootstrap;

        if db.admin_count()? == 0 {
            let hash = CryptoService::hash_secret(&defaults.admin_password)?;
            db.insert_admin(&defaults.admin_username, &hash)?;
            tracing::warn!(
                username = %defaults.admin_username,
                "seeded default admin account; rotate its password"
            );
        }

        if db.get_setting(COLLECTION_KEY_SETTING)?.is_none() {
            let hash = CryptoService::hash_secret(&defaults.collection_key)?;
            db.set_setting(COLLECTION_KEY_SETTING, &hash)?;
            tracing::warn!("seeded default collection passkey; rotate it");
        }

        if db.get_years()?.is_empty() {
            let year = YearRecord::open(current_year_id(), 0.0);
            db.insert_year(&year)?;
            tracing::info!(year = %year.id, "created initial fiscal year");
        }

        Ok(())
    }

    pub fn lock_db(&self) -> ApiResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("DB lock".to_string()))
    }

    /// Derives the caller's gate from request headers. Unknown tokens are
    /// treated as absent.
    pub fn access_for(&self, headers: &HeaderMap) -> ApiResult<AccessGate> {
        let mut gate = AccessGate::new();

        if let Some(token) = bearer_token(headers) {
            let username = self.lock_db()?.find_admin_session(&sha256_hex(token.as_bytes()))?;
            if let Some(username) = username {
                gate.login_succeeded(AdminSession {
                    username,
                    token: token.to_string(),
                });
            }
        }

        if let Some(grant) = header_value(headers, COLLECTION_TOKEN_HEADER) {
            let grants = self
                .collection_grants
                .lock()
                .map_err(|_| ApiError::Internal("Grant lock".to_string()))?;
            if grants.contains(&sha256_hex(grant.as_bytes())) {
                gate.unlock_collections();
            }
        }

        Ok(gate)
    }

    pub fn require_admin(&self, headers: &HeaderMap) -> ApiResult<AdminSession> {
        let gate = self.access_for(headers)?;
        gate.require_admin().cloned()
    }

    pub fn issue_admin_session(&self, username: &str) -> ApiResult<AdminSession> {
        let token = CryptoService::generate_token()?;
        self.lock_db()?
            .insert_admin_session(&sha256_hex(token.as_bytes()), username)?;
        Ok(AdminSession {
            username: username.to_string(),
            token,
        })
    }

    pub fn revoke_admin_session(&self, session: &AdminSession) -> ApiResult<()> {
        self.lock_db()?
            .delete_admin_session(&sha256_hex(session.token.as_bytes()))?;
        Ok(())
    }

    pub fn grant_collection_access(&self) -> ApiResult<String> {
        let token = CryptoService::generate_token()?;
        self.collection_grants
            .lock()
            .map_err(|_| ApiError::Internal("Grant lock".to_string()))?
            .insert(sha256_hex(token.as_bytes()));
        Ok(token)
    }

    /// Forgets every passkey unlock, as a restart would.
    pub fn clear_collection_grants(&self) -> ApiResult<()> {
        self.collection_grants
            .lock()
            .map_err(|_| ApiError::Internal("Grant lock".to_string()))?
            .clear();
        Ok(())
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
