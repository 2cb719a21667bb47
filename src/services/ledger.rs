use std::cmp::Ordering;

use crate::error::LedgerError;
use crate::models::{Entry, EntryType, FinancialStats, MonthlyPoint, YearRecord};
use crate::utils::month_index;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn compute_stats(year_id: &str, entries: &[Entry], years: &[YearRecord]) -> FinancialStats {
    let opening_balance = years
        .iter()
        .find(|y| y.id == year_id)
        .map(|y| y.opening_balance)
        .unwrap_or(0.0);
    let total_collection = sum_amounts(entries, year_id, EntryType::Collection);
    let total_expense = sum_amounts(entries, year_id, EntryType::Expense);

    FinancialStats {
        total_collection,
        total_expense,
        opening_balance,
        current_balance: opening_balance + total_collection - total_expense,
    }
}

fn sum_amounts(entries: &[Entry], year_id: &str, entry_type: EntryType) -> f64 {
    entries
        .iter()
        .filter(|e| e.year_id == year_id && e.entry_type == entry_type)
        .map(|e| e.amount)
        .sum()
}

/// Orders year ids numerically when both parse as integers, lexically otherwise.
pub fn compare_year_ids(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Latest year first.
pub fn sort_years_desc(years: &mut [YearRecord]) {
    years.sort_by(|a, b| compare_year_ids(&b.id, &a.id));
}

pub fn latest_year(years: &[YearRecord]) -> Option<&YearRecord> {
    years.iter().max_by(|a, b| compare_year_ids(&a.id, &b.id))
}

/// Opens the fiscal year after `latest`, carrying `current_balance` forward.
/// Fails without side effects when the target id is taken.
pub fn rollover(
    latest: &YearRecord,
    current_balance: f64,
    years: &[YearRecord],
) -> Result<YearRecord, LedgerError> {
    let numeric = latest
        .id
        .trim()
        .parse::<i64>()
        .map_err(|_| LedgerError::InvalidYearId(latest.id.clone()))?;
    let next_id = numeric
        .checked_add(1)
        .ok_or_else(|| LedgerError::InvalidYearId(latest.id.clone()))?
        .to_string();

    if years.iter().any(|y| y.id == next_id) {
        return Err(LedgerError::YearExists(next_id));
    }

    Ok(YearRecord::open(next_id, current_balance))
}

pub fn next_year(years: &[YearRecord], entries: &[Entry]) -> Result<YearRecord, LedgerError> {
    let latest = latest_year(years).ok_or(LedgerError::NoYears)?;
    let closing = compute_stats(&latest.id, entries, years).current_balance;
    rollover(latest, closing, years)
}

pub fn close_year(year: &YearRecord, closed_at: String) -> Result<YearRecord, LedgerError> {
    if year.is_closed {
        return Err(LedgerError::YearClosed(year.id.clone()));
    }
    Ok(YearRecord {
        is_closed: true,
        closed_at: Some(closed_at),
        ..year.clone()
    })
}

/// The year an entry may be written into: it must exist and still be open.
pub fn writable_year<'a>(year_id: &str, years: &'a [YearRecord]) -> Result<&'a YearRecord, LedgerError> {
    let year = years
        .iter()
        .find(|y| y.id == year_id)
        .ok_or_else(|| LedgerError::YearNotFound(year_id.to_string()))?;
    if year.is_closed {
        return Err(LedgerError::YearClosed(year.id.clone()));
    }
    Ok(year)
}

pub fn monthly_series(year_id: &str, entries: &[Entry]) -> Vec<MonthlyPoint> {
    let mut collected = [0.0_f64; 12];
    let mut spent = [0.0_f64; 12];

    for entry in entries.iter().filter(|e| e.year_id == year_id) {
        let Some(month) = month_index(&entry.date) else {
            continue;
        };
        match entry.entry_type {
            EntryType::Collection => collected[month] += entry.amount,
            EntryType::Expense => spent[month] += entry.amount,
        }
    }

    MONTH_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| MonthlyPoint {
            month: label.to_string(),
            collected: collected[i],
            spent: spent[i],
        })
        .collect()
}

/// Entries of one year, optionally narrowed by type and a case-insensitive
/// title search, newest first.
pub fn filter_entries(
    entries: &[Entry],
    year_id: &str,
    entry_type: Option<EntryType>,
    search: Option<&str>,
) -> Vec<Entry> {
    let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
    let mut filtered: Vec<Entry> = entries
        .iter()
        .filter(|e| e.year_id == year_id)
        .filter(|e| entry_type.map_or(true, |t| e.entry_type == t))
        .filter(|e| {
            needle
                .as_deref()
                .map_or(true, |n| e.title.to_lowercase().contains(n))
        })
        .cloned()
        .collect();
    filtered.sort_by(|a, b| b.date.cmp(&a.date));
    filtered
}

/// Removes the collection ledger from a listing the caller may not see.
pub fn redact_collections(entries: Vec<Entry>) -> Vec<Entry> {
    entries
        .into_iter()
        .filter(|e| e.entry_type != EntryType::Collection)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, entry_type: EntryType, amount: f64, date: &str, year_id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            entry_type,
            title: format!("title {}", id),
            amount,
            date: date.to_string(),
            year_id: year_id.to_string(),
            receipt_image: None,
        }
    }

    #[test]
    fn stats_for_simple_year() {
        let entries = vec![
            entry("a", EntryType::Collection, 100.0, "2024-01-05", "2024"),
            entry("b", EntryType::Expense, 40.0, "2024-02-05", "2024"),
        ];
        let years = vec![YearRecord::open("2024", 0.0)];

        let stats = compute_stats("2024", &entries, &years);

        assert_eq!(
            stats,
            FinancialStats {
                total_collection: 100.0,
                total_expense: 40.0,
                opening_balance: 0.0,
                current_balance: 60.0,
            }
        );
    }

    #[test]
    fn stats_ignore_other_years_and_include_opening_balance() {
        let entries = vec![
            entry("a", EntryType::Collection, 100.0, "2024-01-05", "2024"),
            entry("b", EntryType::Collection, 999.0, "2023-01-05", "2023"),
            entry("c", EntryType::Expense, 25.5, "2024-03-01", "2024"),
        ];
        let years = vec![YearRecord::open("2023", 5.0), YearRecord::open("2024", 50.0)];

        let stats = compute_stats("2024", &entries, &years);

        assert_eq!(stats.total_collection, 100.0);
        assert_eq!(stats.total_expense, 25.5);
        assert_eq!(stats.opening_balance, 50.0);
        assert_eq!(stats.current_balance, 124.5);
    }

    #[test]
    fn stats_default_opening_balance_for_unknown_year() {
        let entries = vec![entry("a", EntryType::Expense, 10.0, "2031-01-01", "2031")];

        let stats = compute_stats("2031", &entries, &[]);

        assert_eq!(stats.opening_balance, 0.0);
        assert_eq!(stats.current_balance, -10.0);
    }

    #[test]
    fn stats_are_idempotent() {
        let entries = vec![
            entry("a", EntryType::Collection, 12.25, "2024-01-05", "2024"),
            entry("b", EntryType::Expense, 3.5, "2024-02-05", "2024"),
        ];
        let years = vec![YearRecord::open("2024", 1.0)];

        let first = compute_stats("2024", &entries, &years);
        let second = compute_stats("2024", &entries, &years);

        assert_eq!(first, second);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn rollover_carries_balance_forward() {
        let entries = vec![
            entry("a", EntryType::Collection, 700.0, "2024-01-05", "2024"),
            entry("b", EntryType::Expense, 200.0, "2024-02-05", "2024"),
        ];
        let years = vec![YearRecord::open("2024", 0.0)];

        let next = next_year(&years, &entries).unwrap();

        assert_eq!(
            next,
            YearRecord {
                id: "2025".to_string(),
                opening_balance: 500.0,
                is_closed: false,
                closed_at: None,
            }
        );
    }

    #[test]
    fn rollover_uses_numeric_latest_year() {
        let years = vec![YearRecord::open("9", 0.0), YearRecord::open("10", 7.0)];

        let next = next_year(&years, &[]).unwrap();

        assert_eq!(next.id, "11");
        assert_eq!(next.opening_balance, 7.0);
    }

    #[test]
    fn rollover_refuses_existing_target() {
        let latest = YearRecord::open("2024", 0.0);
        let years = vec![latest.clone(), YearRecord::open("2025", 0.0)];

        assert_eq!(
            rollover(&latest, 500.0, &years),
            Err(LedgerError::YearExists("2025".to_string()))
        );
        assert_eq!(years.len(), 2);
    }

    #[test]
    fn rollover_from_explicit_balance() {
        let latest = YearRecord::open("2024", 0.0);

        let next = rollover(&latest, 500.0, &[latest.clone()]).unwrap();

        assert_eq!(next, YearRecord::open("2025", 500.0));
    }

    #[test]
    fn rollover_errors() {
        assert_eq!(next_year(&[], &[]), Err(LedgerError::NoYears));
        assert_eq!(
            next_year(&[YearRecord::open("FY-A", 0.0)], &[]),
            Err(LedgerError::InvalidYearId("FY-A".to_string()))
        );
    }

    #[test]
    fn rollover_rejects_non_numeric_latest() {
        // Mixed ids fall back to lexical order, so "2025x" wins and cannot roll.
        let years = vec![YearRecord::open("2024", 0.0), YearRecord::open("2025x", 0.0)];
        assert!(matches!(next_year(&years, &[]), Err(LedgerError::InvalidYearId(_))));
    }

    #[test]
    fn close_stamps_timestamp_once() {
        let year = YearRecord::open("2024", 10.0);

        let closed = close_year(&year, "2025-01-01T00:00:00Z".to_string()).unwrap();

        assert!(closed.is_closed);
        assert_eq!(closed.closed_at.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(closed.opening_balance, 10.0);
        assert_eq!(
            close_year(&closed, "later".to_string()),
            Err(LedgerError::YearClosed("2024".to_string()))
        );
    }

    #[test]
    fn writable_year_checks_existence_and_state() {
        let mut closed = YearRecord::open("2023", 0.0);
        closed.is_closed = true;
        let years = vec![closed, YearRecord::open("2024", 0.0)];

        assert!(writable_year("2024", &years).is_ok());
        assert_eq!(
            writable_year("2023", &years).unwrap_err(),
            LedgerError::YearClosed("2023".to_string())
        );
        assert_eq!(
            writable_year("1999", &years).unwrap_err(),
            LedgerError::YearNotFound("1999".to_string())
        );
    }

    #[test]
    fn year_ordering_is_numeric_aware() {
        let mut years = vec![
            YearRecord::open("9", 0.0),
            YearRecord::open("2024", 0.0),
            YearRecord::open("10", 0.0),
        ];

        sort_years_desc(&mut years);

        let ids: Vec<&str> = years.iter().map(|y| y.id.as_str()).collect();
        assert_eq!(ids, vec!["2024", "10", "9"]);
        assert_eq!(latest_year(&years).map(|y| y.id.as_str()), Some("2024"));
    }

    #[test]
    fn monthly_series_groups_by_month() {
        let entries = vec![
            entry("a", EntryType::Collection, 10.0, "2024-01-05", "2024"),
            entry("b", EntryType::Collection, 5.0, "2024-01-20", "2024"),
            entry("c", EntryType::Expense, 3.0, "2024-12-31", "2024"),
            entry("d", EntryType::Expense, 100.0, "2023-12-31", "2023"),
        ];

        let series = monthly_series("2024", &entries);

        assert_eq!(series.len(), 12);
        assert_eq!(series[0].month, "Jan");
        assert_eq!(series[0].collected, 15.0);
        assert_eq!(series[11].spent, 3.0);
        assert_eq!(series[5].collected, 0.0);
    }

    #[test]
    fn filter_entries_by_type_and_search() {
        let mut a = entry("a", EntryType::Collection, 10.0, "2024-01-05", "2024");
        a.title = "Alice Smith".to_string();
        let mut b = entry("b", EntryType::Collection, 5.0, "2024-03-20", "2024");
        b.title = "Bob".to_string();
        let mut c = entry("c", EntryType::Collection, 5.0, "2024-02-20", "2024");
        c.title = "alicia".to_string();
        let d = entry("d", EntryType::Expense, 3.0, "2024-12-31", "2024");
        let entries = vec![a, b, c, d];

        let found = filter_entries(&entries, "2024", Some(EntryType::Collection), Some("ALIC"));
        let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let all = filter_entries(&entries, "2024", None, Some("  "));
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].id, "d");
    }

    #[test]
    fn redaction_drops_only_collections() {
        let entries = vec![
            entry("a", EntryType::Collection, 10.0, "2024-01-05", "2024"),
            entry("b", EntryType::Expense, 3.0, "2024-12-31", "2024"),
        ];

        let visible = redact_collections(entries);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].entry_type, EntryType::Expense);
    }
}
