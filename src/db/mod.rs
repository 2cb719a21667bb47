use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::PathBuf;

use crate::models::{AdminAccount, Entry, Snapshot, YearRecord};

const YEAR_COLUMNS: &str = "id, opening_balance, is_closed, closed_at";
const ENTRY_COLUMNS: &str = "id, entry_type, title, amount, entry_date, year_id, receipt_image";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: PathBuf) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> SqlResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = vec![
            (
                "001_create_years_and_entries.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/001_create_years_and_entries.sql"
                )),
            ),
            (
                "002_create_credentials.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/002_create_credentials.sql"
                )),
            ),
            (
                "003_create_admin_sessions.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/003_create_admin_sessions.sql"
                )),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
                tracing::debug!(migration = name, "applied migration");
            }
        }

        Ok(())
    }

    pub fn get_years(&self) -> SqlResult<Vec<YearRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM years", YEAR_COLUMNS))?;
        let rows = stmt.query_map([], year_from_row)?;
        rows.collect()
    }

    pub fn get_year(&self, id: &str) -> SqlResult<Option<YearRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM years WHERE id = ?1", YEAR_COLUMNS))?;
        stmt.query_row(params![id], year_from_row).optional()
    }

    pub fn insert_year(&self, year: &YearRecord) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO years (id, opening_balance, is_closed, closed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))",
            params![year.id, year.opening_balance, year.is_closed, year.closed_at],
        )?;
        Ok(())
    }

    pub fn mark_year_closed(&self, year: &YearRecord) -> SqlResult<()> {
        self.conn.execute(
            "UPDATE years SET is_closed = 1, closed_at = ?2 WHERE id = ?1",
            params![year.id, year.closed_at],
        )?;
        Ok(())
    }

    pub fn get_entries(&self) -> SqlResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM entries ORDER BY entry_date DESC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map([], entry_from_row)?;
        rows.collect()
    }

    pub fn get_entries_for_year(&self, year_id: &str) -> SqlResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM entries WHERE year_id = ?1 ORDER BY entry_date DESC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![year_id], entry_from_row)?;
        rows.collect()
    }

    pub fn get_entry(&self, id: &str) -> SqlResult<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM entries WHERE id = ?1", ENTRY_COLUMNS))?;
        stmt.query_row(params![id], entry_from_row).optional()
    }

    pub fn upsert_entry(&self, entry: &Entry) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO entries (
                id, entry_type, title, amount, entry_date, year_id, receipt_image, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'), datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                entry_type = excluded.entry_type,
                title = excluded.title,
                amount = excluded.amount,
                entry_date = excluded.entry_date,
                year_id = excluded.year_id,
                receipt_image = excluded.receipt_image,
                updated_at = excluded.updated_at",
            params![
                entry.id,
                entry.entry_type.as_str(),
                entry.title,
                entry.amount,
                entry.date,
                entry.year_id,
                entry.receipt_image
            ],
        )?;
        Ok(())
    }

    /// Returns the number of removed rows; zero for unknown ids.
    pub fn delete_entry(&self, id: &str) -> SqlResult<usize> {
        self.conn
            .execute("DELETE FROM entries WHERE id = ?1", params![id])
    }

    /// Restores a snapshot in one transaction. Years already closed here are
    /// left untouched. Returns the years and entries actually written.
    pub fn import_snapshot(&mut self, snapshot: &Snapshot) -> SqlResult<(usize, usize)> {
        let tx = self.conn.transaction()?;
        let mut years_written = 0;
        let mut entries_written = 0;
        for year in &snapshot.years {
            years_written += tx.execute(
                "INSERT INTO years (id, opening_balance, is_closed, closed_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, datetime('now'))
                 ON CONFLICT(id) DO UPDATE SET
                    opening_balance = excluded.opening_balance,
                    is_closed = excluded.is_closed,
                    closed_at = excluded.closed_at
                 WHERE years.is_closed = 0",
                params![year.id, year.opening_balance, year.is_closed, year.closed_at],
            )?;
        }
        for entry in &snapshot.entries {
            entries_written += tx.execute(
                "INSERT OR REPLACE INTO entries (
                    id, entry_type, title, amount, entry_date, year_id, receipt_image, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'), datetime('now'))",
                params![
                    entry.id,
                    entry.entry_type.as_str(),
                    entry.title,
                    entry.amount,
                    entry.date,
                    entry.year_id,
                    entry.receipt_image
                ],
            )?;
        }
        tx.commit()?;
        Ok((years_written, entries_written))
    }

    pub fn admin_count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM admin", [], |row| row.get(0))
    }

    pub fn insert_admin(&self, username: &str, password_hash: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO admin (username, password_hash, created_at, updated_at)
             VALUES (?1, ?2, datetime('now'), datetime('now'))",
            params![username, password_hash],
        )?;
        Ok(())
    }

    /// Username lookup ignores case.
    pub fn find_admin(&self, username: &str) -> SqlResult<Option<AdminAccount>> {
        let mut stmt = self
            .conn
            .prepare("SELECT username, password_hash FROM admin WHERE username = ?1 COLLATE NOCASE")?;
        stmt.query_row(params![username], admin_from_row).optional()
    }

    pub fn update_admin_password(&self, username: &str, password_hash: &str) -> SqlResult<()> {
        self.conn.execute(
            "UPDATE admin SET password_hash = ?2, updated_at = datetime('now') WHERE username = ?1",
            params![username, password_hash],
        )?;
        Ok(())
    }

    pub fn insert_admin_session(&self, token_hash: &str, username: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO admin_sessions (token_hash, username, created_at) VALUES (?1, ?2, datetime('now'))",
            params![token_hash, username],
        )?;
        Ok(())
    }

    pub fn find_admin_session(&self, token_hash: &str) -> SqlResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT username FROM admin_sessions WHERE token_hash = ?1")?;
        stmt.query_row(params![token_hash], |row| row.get(0)).optional()
    }

    pub fn delete_admin_session(&self, token_hash: &str) -> SqlResult<()> {
        self.conn.execute(
            "DELETE FROM admin_sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(())
    }

    pub fn set_setting(&self, key: &str, value: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> SqlResult<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        stmt.query_row(params![key], |row| row.get(0)).optional()
    }
}

fn year_from_row(row: &Row<'_>) -> SqlResult<YearRecord> {
    Ok(YearRecord {
        id: row.get(0)?,
        opening_balance: row.get(1)?,
        is_closed: row.get(2)?,
        closed_at: row.get(3)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> SqlResult<Entry> {
    let raw_type: String = row.get(1)?;
    let entry_type = raw_type
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;
    Ok(Entry {
        id: row.get(0)?,
        entry_type,
        title: row.get(2)?,
        amount: row.get(3)?,
        date: row.get(4)?,
        year_id: row.get(5)?,
        receipt_image: row.get(6)?,
    })
}

fn admin_from_row(row: &Row<'_>) -> SqlResult<AdminAccount> {
    Ok(AdminAccount {
        username: row.get(0)?,
        password_hash: row.get(1)?,
    })
}
