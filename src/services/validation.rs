use base64::{engine::general_purpose, Engine as _};

use crate::error::LedgerError;
use crate::models::EntryPayload;
use crate::utils::normalize_date;

pub const MIN_SECRET_LEN: usize = 4;

/// Checks a submitted entry and normalises its date to `YYYY-MM-DD`.
pub fn validate_entry(mut payload: EntryPayload, max_receipt_bytes: usize) -> Result<EntryPayload, LedgerError> {
    payload.title = payload.title.trim().to_string();
    if payload.title.is_empty() {
        return Err(LedgerError::Validation("Title is required".to_string()));
    }
    if !payload.amount.is_finite() || payload.amount < 0.0 {
        return Err(LedgerError::Validation(
            "Amount must be a non-negative number".to_string(),
        ));
    }
    payload.date = normalize_date(&payload.date)
        .ok_or_else(|| LedgerError::Validation(format!("Invalid date: {}", payload.date)))?;
    if payload.year_id.trim().is_empty() {
        return Err(LedgerError::Validation("Fiscal year is required".to_string()));
    }

    payload.id = payload.id.filter(|id| !id.trim().is_empty());
    payload.receipt_image = payload.receipt_image.filter(|img| !img.trim().is_empty());
    if let Some(image) = payload.receipt_image.as_deref() {
        validate_receipt_image(image, max_receipt_bytes)?;
    }

    Ok(payload)
}

/// Receipts travel as `data:image/<kind>;base64,<payload>` text.
pub fn validate_receipt_image(value: &str, max_bytes: usize) -> Result<(), LedgerError> {
    let invalid = || LedgerError::Validation("Receipt must be a base64 image data URL".to_string());

    let rest = value.strip_prefix("data:image/").ok_or_else(invalid)?;
    let (_, data) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let decoded = general_purpose::STANDARD.decode(data).map_err(|_| invalid())?;

    if decoded.is_empty() {
        return Err(invalid());
    }
    if decoded.len() > max_bytes {
        return Err(LedgerError::Validation(format!(
            "Receipt image exceeds {} bytes",
            max_bytes
        )));
    }
    Ok(())
}

/// Rules for a replacement admin password or collection passkey.
pub fn validate_new_secret(new_secret: &str, confirm: Option<&str>) -> Result<(), LedgerError> {
    if new_secret.chars().count() < MIN_SECRET_LEN {
        return Err(LedgerError::Validation(format!(
            "New passkey must be at least {} characters.",
            MIN_SECRET_LEN
        )));
    }
    if let Some(confirm) = confirm {
        if confirm != new_secret {
            return Err(LedgerError::Validation("Confirm passkey does not match.".to_string()));
        }
    }
    Ok(())
}
