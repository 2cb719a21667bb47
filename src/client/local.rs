//! Client-side copy of the ledger with optimistic updates.
//!
//! A mutation is applied here first and yields an [`Undo`]. Once the server
//! answers, [`LocalLedger::reconcile`] adopts the server's record or rolls
//! the change back.

use crate::client::{ClientResult, FundClient};
use crate::error::LedgerError;
use crate::models::{AdminSession, Entry, EntryPayload, EntryType, FinancialStats, Snapshot, YearRecord};
use crate::services::access::AccessGate;
use crate::services::ledger::{close_year, compute_stats, latest_year, next_year, sort_years_desc, writable_year};
use crate::services::validation::validate_entry;
use crate::utils::{current_year_id, now_rfc3339};

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    SaveEntry(Entry),
    DeleteEntry(String),
    OpenNextYear(YearRecord),
    CloseYear { year_id: String, closed_at: String },
}

/// What the server recorded for a persisted command.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmed {
    Entry(Entry),
    Deleted,
    Year(YearRecord),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    /// Put back whatever was stored under `id`, or remove it if nothing was.
    RestoreEntry { id: String, previous: Option<Entry> },
    RemoveYear { year_id: String, previous_selection: String },
    RestoreYear(YearRecord),
}

#[derive(Debug, Clone)]
pub struct LocalLedger {
    years: Vec<YearRecord>,
    entries: Vec<Entry>,
    selected_year_id: String,
    gate: AccessGate,
}

impl LocalLedger {
    pub fn new(snapshot: Snapshot, gate: AccessGate) -> Self {
        let mut ledger = LocalLedger {
            years: Vec::new(),
            entries: Vec::new(),
            selected_year_id: String::new(),
            gate,
        };
        ledger.replace(snapshot);
        ledger
    }

    /// Swaps in fresh server data, keeping the selection when it still exists.
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.years = snapshot.years;
        sort_years_desc(&mut self.years);
        self.entries = snapshot.entries;

        if !self.has_year(&self.selected_year_id) {
            self.selected_year_id = default_selection(&self.years);
        }
    }

    pub fn years(&self) -> &[YearRecord] {
        &self.years
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn selected_year_id(&self) -> &str {
        &self.selected_year_id
    }

    pub fn select_year(&mut self, year_id: &str) -> Result<(), LedgerError> {
        if !self.has_year(year_id) {
            return Err(LedgerError::YearNotFound(year_id.to_string()));
        }
        self.selected_year_id = year_id.to_string();
        Ok(())
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut AccessGate {
        &mut self.gate
    }

    /// What survives a page reload: the admin session, nothing else.
    pub fn persisted_session(&self) -> Option<AdminSession> {
        self.gate.persisted()
    }

    pub fn reload(&mut self) {
        self.gate = self.gate.reload();
    }

    pub fn stats(&self) -> FinancialStats {
        compute_stats(&self.selected_year_id, &self.entries, &self.years)
    }

    /// Entries of the selected year the current gate may show.
    pub fn visible_entries(&self) -> Vec<&Entry> {
        let show_collections = self.gate.can_view_collections();
        self.entries
            .iter()
            .filter(|e| e.year_id == self.selected_year_id)
            .filter(|e| show_collections || e.entry_type != EntryType::Collection)
            .collect()
    }

    fn has_year(&self, year_id: &str) -> bool {
        self.years.iter().any(|y| y.id == year_id)
    }

    pub fn prepare_save(&self, payload: EntryPayload, max_receipt_bytes: usize) -> Result<LedgerCommand, LedgerError> {
        let payload = validate_entry(payload, max_receipt_bytes)?;
        let id = payload
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(LedgerCommand::SaveEntry(payload.into_entry(id)))
    }

    pub fn prepare_next_year(&self) -> Result<LedgerCommand, LedgerError> {
        next_year(&self.years, &self.entries).map(LedgerCommand::OpenNextYear)
    }

    pub fn prepare_close(&self, year_id: &str) -> LedgerCommand {
        LedgerCommand::CloseYear {
            year_id: year_id.to_string(),
            closed_at: now_rfc3339(),
        }
    }

    /// Applies a command locally under the same rules the server enforces.
    pub fn apply(&mut self, command: &LedgerCommand) -> Result<Undo, LedgerError> {
        match command {
            LedgerCommand::SaveEntry(entry) => {
                writable_year(&entry.year_id, &self.years)?;
                let position = self.entries.iter().position(|e| e.id == entry.id);
                if let Some(i) = position {
                    writable_year(&self.entries[i].year_id, &self.years)?;
                }

                let previous = match position {
                    Some(i) => Some(std::mem::replace(&mut self.entries[i], entry.clone())),
                    None => {
                        self.entries.push(entry.clone());
                        None
                    }
                };
                Ok(Undo::RestoreEntry {
                    id: entry.id.clone(),
                    previous,
                })
            }
            LedgerCommand::DeleteEntry(id) => {
                let previous = match self.entries.iter().position(|e| &e.id == id) {
                    Some(i) => {
                        writable_year(&self.entries[i].year_id, &self.years)?;
                        Some(self.entries.remove(i))
                    }
                    None => None,
                };
                Ok(Undo::RestoreEntry {
                    id: id.clone(),
                    previous,
                })
            }
            LedgerCommand::OpenNextYear(year) => {
                if self.has_year(&year.id) {
                    return Err(LedgerError::YearExists(year.id.clone()));
                }
                let previous_selection = std::mem::replace(&mut self.selected_year_id, year.id.clone());
                self.years.push(year.clone());
                sort_years_desc(&mut self.years);
                Ok(Undo::RemoveYear {
                    year_id: year.id.clone(),
                    previous_selection,
                })
            }
            LedgerCommand::CloseYear { year_id, closed_at } => {
                let slot = self
                    .years
                    .iter_mut()
                    .find(|y| &y.id == year_id)
                    .ok_or_else(|| LedgerError::YearNotFound(year_id.clone()))?;
                let closed = close_year(slot, closed_at.clone())?;
                let previous = std::mem::replace(slot, closed);
                Ok(Undo::RestoreYear(previous))
            }
        }
    }

    pub fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::RestoreEntry { id, previous } => {
                let position = self.entries.iter().position(|e| e.id == id);
                match (position, previous) {
                    (Some(i), Some(entry)) => self.entries[i] = entry,
                    (Some(i), None) => {
                        self.entries.remove(i);
                    }
                    (None, Some(entry)) => self.entries.push(entry),
                    (None, None) => {}
                }
            }
            Undo::RemoveYear {
                year_id,
                previous_selection,
            } => {
                self.years.retain(|y| y.id != year_id);
                self.selected_year_id = previous_selection;
            }
            Undo::RestoreYear(year) => {
                if let Some(slot) = self.years.iter_mut().find(|y| y.id == year.id) {
                    *slot = year;
                }
            }
        }
    }

    /// On success the server's record replaces the optimistic one; on
    /// failure the change is rolled back. Returns whether a rollback happened.
    pub fn reconcile<E>(&mut self, undo: Undo, outcome: &Result<Confirmed, E>) -> bool {
        match outcome {
            Ok(confirmed) => {
                self.adopt(undo, confirmed.clone());
                false
            }
            Err(_) => {
                self.undo(undo);
                true
            }
        }
    }

    fn adopt(&mut self, undo: Undo, confirmed: Confirmed) {
        match confirmed {
            Confirmed::Entry(entry) => match self.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(slot) => *slot = entry,
                None => self.entries.push(entry),
            },
            Confirmed::Deleted => {}
            Confirmed::Year(year) => {
                // A rollover may land on another id than the local prediction.
                if let Undo::RemoveYear { year_id, .. } = undo {
                    if year_id != year.id {
                        self.years.retain(|y| y.id != year_id);
                    }
                    self.selected_year_id = year.id.clone();
                }
                match self.years.iter_mut().find(|y| y.id == year.id) {
                    Some(slot) => *slot = year,
                    None => {
                        self.years.push(year);
                        sort_years_desc(&mut self.years);
                    }
                }
            }
        }
    }

    /// Apply locally, persist remotely, then adopt or roll back.
    pub async fn execute(&mut self, client: &FundClient, command: LedgerCommand) -> ClientResult<Confirmed> {
        let undo = self.apply(&command)?;
        let outcome = client.persist(&command).await;
        if self.reconcile(undo, &outcome) {
            tracing::warn!(?command, "server refused change; rolled back");
        }
        outcome
    }
}

/// The current calendar year when it is registered, else the latest one.
fn default_selection(years: &[YearRecord]) -> String {
    let current = current_year_id();
    if years.iter().any(|y| y.id == current) {
        return current;
    }
    latest_year(years).map(|y| y.id.clone()).unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, kind: EntryType, amount: f64, year_id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            entry_type: kind,
            title: format!("entry {}", id),
            amount,
            date: format!("{}-03-01", year_id),
            year_id: year_id.to_string(),
            receipt_image: None,
        }
    }

    fn ledger() -> LocalLedger {
        let mut closed = YearRecord::open("2022", 0.0);
        closed.is_closed = true;
        LocalLedger::new(
            Snapshot {
                years: vec![closed, YearRecord::open("2023", 100.0)],
                entries: vec![
                    entry("c1", EntryType::Collection, 100.0, "2023"),
                    entry("x1", EntryType::Expense, 40.0, "2023"),
                    entry("old", EntryType::Expense, 5.0, "2022"),
                ],
            },
            AccessGate::new(),
        )
    }

    fn payload(year_id: &str) -> EntryPayload {
        EntryPayload {
            id: None,
            entry_type: EntryType::Collection,
            title: "Dues".to_string(),
            amount: 20.0,
            date: format!("{}-04-02", year_id),
            year_id: year_id.to_string(),
            receipt_image: None,
        }
    }

    #[test]
    fn selection_falls_back_to_latest_year() {
        let ledger = ledger();
        // Test years are in the past, so the current year is never registered.
        assert_eq!(ledger.selected_year_id(), "2023");
        assert_eq!(ledger.stats().current_balance, 160.0);
    }

    #[test]
    fn collections_hidden_until_unlocked() {
        let mut ledger = ledger();
        assert_eq!(ledger.visible_entries().len(), 1);

        ledger.gate_mut().unlock_collections();
        assert_eq!(ledger.visible_entries().len(), 2);

        ledger.reload();
        assert_eq!(ledger.visible_entries().len(), 1);
    }

    #[test]
    fn admin_session_survives_reload() {
        let mut ledger = ledger();
        ledger.gate_mut().login_succeeded(AdminSession {
            username: "admin".to_string(),
            token: "t".to_string(),
        });
        ledger.reload();
        assert!(ledger.gate().can_view_collections());
        assert!(ledger.persisted_session().is_some());
    }

    #[test]
    fn failed_save_rolls_back_new_entry() {
        let mut ledger = ledger();
        let command = ledger.prepare_save(payload("2023"), 1024).unwrap();
        let undo = ledger.apply(&command).unwrap();
        assert_eq!(ledger.stats().total_collection, 120.0);

        let outcome: Result<Confirmed, &str> = Err("offline");
        assert!(ledger.reconcile(undo, &outcome));
        assert_eq!(ledger.stats().total_collection, 100.0);
        assert_eq!(ledger.entries().len(), 3);
    }

    #[test]
    fn successful_save_is_kept() {
        let mut ledger = ledger();
        let command = ledger.prepare_save(payload("2023"), 1024).unwrap();
        let undo = ledger.apply(&command).unwrap();

        let saved = match &command {
            LedgerCommand::SaveEntry(entry) => entry.clone(),
            other => panic!("unexpected command {:?}", other),
        };

        let outcome: Result<Confirmed, &str> = Ok(Confirmed::Entry(saved));
        assert!(!ledger.reconcile(undo, &outcome));
        assert_eq!(ledger.entries().len(), 4);
    }

    #[test]
    fn server_entry_replaces_local_copy() {
        let mut ledger = ledger();
        let mut edited = ledger.entries()[1].clone();
        edited.title = "  Paint ".to_string();
        let undo = ledger.apply(&LedgerCommand::SaveEntry(edited.clone())).unwrap();

        edited.title = "Paint".to_string();
        let outcome: Result<Confirmed, &str> = Ok(Confirmed::Entry(edited));
        assert!(!ledger.reconcile(undo, &outcome));
        assert_eq!(ledger.entries()[1].title, "Paint");
        assert_eq!(ledger.entries().len(), 3);
    }

    #[test]
    fn server_opening_balance_wins_after_rollover() {
        let mut ledger = ledger();
        let command = ledger.prepare_next_year().unwrap();
        let undo = ledger.apply(&command).unwrap();
        assert_eq!(ledger.stats().opening_balance, 160.0);

        // The server also counts collections this ledger never saw.
        let outcome: Result<Confirmed, &str> = Ok(Confirmed::Year(YearRecord::open("2024", 235.0)));
        assert!(!ledger.reconcile(undo, &outcome));
        assert_eq!(ledger.selected_year_id(), "2024");
        assert_eq!(ledger.stats().opening_balance, 235.0);
        assert_eq!(ledger.years().len(), 3);
    }

    #[test]
    fn rollover_adopts_server_year_id() {
        let mut ledger = ledger();
        let command = ledger.prepare_next_year().unwrap();
        let undo = ledger.apply(&command).unwrap();

        let outcome: Result<Confirmed, &str> = Ok(Confirmed::Year(YearRecord::open("2025", 90.0)));
        assert!(!ledger.reconcile(undo, &outcome));
        assert_eq!(ledger.selected_year_id(), "2025");
        assert!(ledger.years().iter().all(|y| y.id != "2024"));
        assert_eq!(ledger.years()[0].id, "2025");
        assert_eq!(ledger.stats().opening_balance, 90.0);
    }

    #[test]
    fn failed_edit_restores_previous_values() {
        let mut ledger = ledger();
        let mut edited = ledger.entries()[1].clone();
        edited.amount = 75.0;
        let undo = ledger.apply(&LedgerCommand::SaveEntry(edited)).unwrap();
        assert_eq!(ledger.stats().total_expense, 75.0);

        ledger.undo(undo);
        assert_eq!(ledger.stats().total_expense, 40.0);
    }

    #[test]
    fn failed_delete_puts_entry_back() {
        let mut ledger = ledger();
        let undo = ledger.apply(&LedgerCommand::DeleteEntry("x1".to_string())).unwrap();
        assert_eq!(ledger.stats().total_expense, 0.0);

        ledger.undo(undo);
        assert_eq!(ledger.stats().total_expense, 40.0);
    }

    #[test]
    fn closed_year_refuses_local_writes() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.apply(&LedgerCommand::DeleteEntry("old".to_string())),
            Err(LedgerError::YearClosed("2022".to_string()))
        );
        let command = ledger.prepare_save(payload("2022"), 1024).unwrap();
        assert_eq!(ledger.apply(&command), Err(LedgerError::YearClosed("2022".to_string())));
    }

    #[test]
    fn rollover_selects_new_year_and_undo_restores() {
        let mut ledger = ledger();
        let command = ledger.prepare_next_year().unwrap();
        assert_eq!(command, LedgerCommand::OpenNextYear(YearRecord::open("2024", 160.0)));

        let undo = ledger.apply(&command).unwrap();
        assert_eq!(ledger.selected_year_id(), "2024");
        assert_eq!(ledger.stats().opening_balance, 160.0);
        assert_eq!(ledger.apply(&command), Err(LedgerError::YearExists("2024".to_string())));

        ledger.undo(undo);
        assert_eq!(ledger.selected_year_id(), "2023");
        assert_eq!(ledger.years().len(), 2);
    }

    #[test]
    fn close_then_undo_reopens() {
        let mut ledger = ledger();
        let command = ledger.prepare_close("2023");
        let undo = ledger.apply(&command).unwrap();
        assert!(ledger.years().iter().any(|y| y.id == "2023" && y.is_closed));

        ledger.undo(undo);
        assert!(ledger.years().iter().all(|y| y.id != "2023" || !y.is_closed));
    }

    #[test]
    fn select_unknown_year_is_rejected() {
        let mut ledger = ledger();
        assert!(ledger.select_year("1990").is_err());
        assert!(ledger.select_year("2022").is_ok());
        assert_eq!(ledger.selected_year_id(), "2022");
    }
}
