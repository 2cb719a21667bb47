//! Two-tier gate over the collection ledger.
//!
//! An admin session sees everything and survives reloads; a passkey unlock
//! only reveals the collection ledger and lasts until the next reload.

use crate::error::ApiError;
use crate::models::AdminSession;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessGate {
    admin: Option<AdminSession>,
    collection_unlocked: bool,
}

impl AccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from whatever admin session was persisted; unlocks never are.
    pub fn restore(persisted: Option<AdminSession>) -> Self {
        AccessGate {
            admin: persisted,
            collection_unlocked: false,
        }
    }

    pub fn login_succeeded(&mut self, session: AdminSession) {
        self.admin = Some(session);
    }

    pub fn logout(&mut self) -> Option<AdminSession> {
        self.admin.take()
    }

    pub fn unlock_collections(&mut self) {
        self.collection_unlocked = true;
    }

    pub fn is_admin_session(&self) -> bool {
        self.admin.is_some()
    }

    pub fn is_collection_unlocked(&self) -> bool {
        self.collection_unlocked
    }

    pub fn can_view_collections(&self) -> bool {
        self.is_admin_session() || self.collection_unlocked
    }

    pub fn admin_session(&self) -> Option<&AdminSession> {
        self.admin.as_ref()
    }

    /// The part of the gate that outlives a reload.
    pub fn persisted(&self) -> Option<AdminSession> {
        self.admin.clone()
    }

    pub fn reload(&self) -> Self {
        Self::restore(self.persisted())
    }

    pub fn require_admin(&self) -> Result<&AdminSession, ApiError> {
        self.admin
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized("Admin session required".to_string()))
    }
}
