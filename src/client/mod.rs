//! HTTP client for a running fund server.

pub mod local;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::error::LedgerError;
use crate::models::{
    Ack, AnalysisReport, AuthResponse, DashboardStats, Entry, EntryPayload, EntryType, ImportSummary,
    SaveEntryResponse, Snapshot, YearRecord,
};
use crate::services::state::COLLECTION_TOKEN_HEADER;

pub use local::{Confirmed, LedgerCommand, LocalLedger, Undo};

#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failures carry no server detail.
    #[error("Unable to reach the fund server. Please try again.")]
    Connectivity(#[source] reqwest::Error),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected server response: {0}")]
    Decode(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Local(#[from] LedgerError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct FundClient {
    client: Client,
    base_url: String,
    admin_token: Option<String>,
    collection_token: Option<String>,
}

impl FundClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ClientError::Connectivity)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_token: None,
            collection_token: None,
        })
    }

    /// Resumes a persisted admin session.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    pub fn clear_collection_token(&mut self) {
        self.collection_token = None;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn segment_url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.admin_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match &self.collection_token {
            Some(token) => request.header(COLLECTION_TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("fund server request failed: {}", e);
                ClientError::Connectivity(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        if status == StatusCode::UNAUTHORIZED {
            Err(ClientError::Unauthorized(message))
        } else {
            Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    pub async fn fetch_all(&self) -> ClientResult<Snapshot> {
        self.send(self.client.get(self.url("/api/data"))).await
    }

    pub async fn dashboard(&self, year_id: &str) -> ClientResult<DashboardStats> {
        let url = self.segment_url(&["api", "years", year_id, "dashboard"])?;
        self.send(self.client.get(url)).await
    }

    /// Stores the issued session token on success.
    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<AuthResponse> {
        let body = json!({ "username": username, "password": password });
        let response: AuthResponse = self
            .send(self.client.post(self.url("/api/login")).json(&body))
            .await?;
        self.admin_token = response.token.clone();
        Ok(response)
    }

    pub async fn logout(&mut self) -> ClientResult<AuthResponse> {
        let response = self.send(self.client.post(self.url("/api/logout"))).await;
        self.admin_token = None;
        response
    }

    pub async fn verify_collection_key(&mut self, key: &str) -> ClientResult<AuthResponse> {
        let body = json!({ "key": key });
        let response: AuthResponse = self
            .send(self.client.post(self.url("/api/verify-collection-key")).json(&body))
            .await?;
        self.collection_token = response.token.clone();
        Ok(response)
    }

    pub async fn update_admin_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> ClientResult<AuthResponse> {
        let body = json!({
            "currentPassword": current_password,
            "newPassword": new_password,
            "confirmPassword": confirm_password,
        });
        self.send(self.client.post(self.url("/api/admin/update-password")).json(&body))
            .await
    }

    pub async fn update_collection_key(
        &self,
        admin_password: &str,
        new_key: &str,
        confirm_key: &str,
    ) -> ClientResult<AuthResponse> {
        let body = json!({
            "adminPassword": admin_password,
            "newCollectionKey": new_key,
            "confirmCollectionKey": confirm_key,
        });
        self.send(self.client.post(self.url("/api/admin/update-collection-key")).json(&body))
            .await
    }

    pub async fn list_entries(
        &self,
        year_id: &str,
        entry_type: Option<EntryType>,
        search: Option<&str>,
    ) -> ClientResult<Vec<Entry>> {
        let mut query = vec![("yearId", year_id.to_string())];
        if let Some(kind) = entry_type {
            query.push(("type", kind.to_string()));
        }
        if let Some(term) = search {
            query.push(("search", term.to_string()));
        }
        self.send(self.client.get(self.url("/api/entries")).query(&query))
            .await
    }

    pub async fn save_entry(&self, payload: &EntryPayload) -> ClientResult<Entry> {
        let response: SaveEntryResponse = self
            .send(self.client.post(self.url("/api/entries")).json(payload))
            .await?;
        Ok(response.entry)
    }

    pub async fn delete_entry(&self, id: &str) -> ClientResult<Ack> {
        let url = self.segment_url(&["api", "entries", id])?;
        self.send(self.client.delete(url)).await
    }

    pub async fn next_year(&self) -> ClientResult<YearRecord> {
        self.send(self.client.post(self.url("/api/years/next"))).await
    }

    pub async fn close_year(&self, year_id: &str) -> ClientResult<YearRecord> {
        let url = self.segment_url(&["api", "years", year_id, "close"])?;
        self.send(self.client.post(url)).await
    }

    pub async fn analyze_year(&self, year_id: &str) -> ClientResult<AnalysisReport> {
        let url = self.segment_url(&["api", "years", year_id, "analysis"])?;
        self.send(self.client.post(url)).await
    }

    pub async fn export(&self) -> ClientResult<Snapshot> {
        self.send(self.client.get(self.url("/api/admin/export"))).await
    }

    pub async fn import(&self, snapshot: &Snapshot) -> ClientResult<ImportSummary> {
        self.send(self.client.post(self.url("/api/admin/import")).json(snapshot))
            .await
    }

    /// Sends one locally applied command to the server and returns what it
    /// recorded.
    pub async fn persist(&self, command: &LedgerCommand) -> ClientResult<Confirmed> {
        let confirmed = match command {
            LedgerCommand::SaveEntry(entry) => {
                Confirmed::Entry(self.save_entry(&EntryPayload::from(entry.clone())).await?)
            }
            LedgerCommand::DeleteEntry(id) => {
                self.delete_entry(id).await?;
                Confirmed::Deleted
            }
            LedgerCommand::OpenNextYear(_) => Confirmed::Year(self.next_year().await?),
            LedgerCommand::CloseYear { year_id, .. } => Confirmed::Year(self.close_year(year_id).await?),
        };
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_are_percent_encoded() {
        let client = FundClient::new("http://127.0.0.1:3001/").unwrap();

        let url = client.segment_url(&["api", "entries", "a/b?c#d"]).unwrap();

        assert_eq!(url.as_str(), "http://127.0.0.1:3001/api/entries/a%2Fb%3Fc%23d");
    }

    #[test]
    fn base_path_is_kept() {
        let client = FundClient::new("http://localhost/fund").unwrap();

        let url = client.segment_url(&["api", "years", "2024", "close"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost/fund/api/years/2024/close");
    }
}
