use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Collection,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Collection => "collection",
            EntryType::Expense => "expense",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "collection" => Ok(EntryType::Collection),
            "expense" => Ok(EntryType::Expense),
            other => Err(format!("Unknown entry type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub title: String,
    pub amount: f64,
    pub date: String,
    pub year_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_image: Option<String>,
}

/// Entry as submitted by a client. A missing or empty `id` means "create".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub title: String,
    pub amount: f64,
    pub date: String,
    pub year_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_image: Option<String>,
}

impl EntryPayload {
    pub fn into_entry(self, id: String) -> Entry {
        Entry {
            id,
            entry_type: self.entry_type,
            title: self.title,
            amount: self.amount,
            date: self.date,
            year_id: self.year_id,
            receipt_image: self.receipt_image,
        }
    }
}

impl From<Entry> for EntryPayload {
    fn from(entry: Entry) -> Self {
        EntryPayload {
            id: Some(entry.id),
            entry_type: entry.entry_type,
            title: entry.title,
            amount: entry.amount,
            date: entry.date,
            year_id: entry.year_id,
            receipt_image: entry.receipt_image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub id: String,
    pub opening_balance: f64,
    pub is_closed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
}

impl YearRecord {
    pub fn open(id: impl Into<String>, opening_balance: f64) -> Self {
        YearRecord {
            id: id.into(),
            opening_balance,
            is_closed: false,
            closed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialStats {
    pub total_collection: f64,
    pub total_expense: f64,
    pub opening_balance: f64,
    pub current_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub collected: f64,
    pub spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub year_id: String,
    pub stats: FinancialStats,
    pub chart: Vec<MonthlyPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub years: Vec<YearRecord>,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResponse {
    pub fn ok() -> Self {
        AuthResponse {
            success: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Ack { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntryResponse {
    pub success: bool,
    pub entry: Entry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success: bool,
    pub years: usize,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub year_id: String,
    pub report: String,
}

#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    pub username: String,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_uses_camel_case_wire_names() {
        let entry = Entry {
            id: "e1".to_string(),
            entry_type: EntryType::Collection,
            title: "Dues".to_string(),
            amount: 25.0,
            date: "2024-03-01".to_string(),
            year_id: "2024".to_string(),
            receipt_image: None,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "collection");
        assert_eq!(value["yearId"], "2024");
        assert!(value.get("receiptImage").is_none());
    }

    #[test]
    fn payload_without_id_deserializes() {
        let payload: EntryPayload = serde_json::from_value(json!({
            "type": "expense",
            "title": "Paint",
            "amount": 12.5,
            "date": "2024-05-02",
            "yearId": "2024"
        }))
        .unwrap();

        assert!(payload.id.is_none());
        assert_eq!(payload.entry_type, EntryType::Expense);
    }

    #[test]
    fn year_record_reads_closed_at() {
        let year: YearRecord = serde_json::from_value(json!({
            "id": "2023",
            "openingBalance": 10.0,
            "isClosed": true,
            "closedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert!(year.is_closed);
        assert_eq!(year.closed_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
