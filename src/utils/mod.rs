use chrono::{Datelike, Local, NaiveDate, Utc};
use sha2::{Digest, Sha256};

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%Y.%m.%d"];

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn current_year_id() -> String {
    Local::now().year().to_string()
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", value)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    // Accept full timestamps by keeping the date part.
    let raw = raw.get(..10).filter(|_| raw.contains('T')).unwrap_or(raw);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn normalize_date(value: &str) -> Option<String> {
    parse_date(value).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Zero-based month of an entry date, if the date parses.
pub fn month_index(value: &str) -> Option<usize> {
    parse_date(value).map(|date| date.month0() as usize)
}
