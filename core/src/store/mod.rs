//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Everything else calls store methods — never SQL directly.
//! Read-modify-write sequences run inside `transact`.

use crate::{
    error::{BankError, BankResult},
    event::{BankEvent, EventLogEntry},
};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::{str::FromStr, time::Duration};

mod credential;
mod customer;
mod exchange;
mod ledger;

pub struct BankStore {
    conn: Connection,
    path: Option<String>, // None for :memory:
}

impl BankStore {
    /// Open (or create) the bank database at `path`.
    pub fn open(path: &str) -> BankResult<Self> {
        if let Some(parent) = std::path::Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        // WAL mode: readers do not block the single writer.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn, path: Some(path.to_string()) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> BankResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> BankResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_bank.sql"))?;
        Ok(())
    }

    /// Run `f` inside one immediate transaction. Any error rolls back every
    /// write `f` made.
    pub fn transact<T>(&self, f: impl FnOnce(&Self) -> BankResult<T>) -> BankResult<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        let result = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT;")?;
            Ok(value)
        });
        if result.is_err() && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK;") {
                log::error!("rollback failed: {e}");
            }
        }
        result
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &BankEvent, at: &str) -> BankResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (created_at, event_type, payload) VALUES (?1, ?2, ?3)",
            params![at, event.type_name(), serde_json::to_string(event)?],
        )?;
        Ok(())
    }

    pub fn events(&self) -> BankResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, event_type, payload FROM event_log ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    created_at: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn events_of_type(&self, event_type: &str) -> BankResult<Vec<BankEvent>> {
        self.events()?
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| serde_json::from_str(&e.payload).map_err(BankError::from))
            .collect()
    }
}

/// Read a decimal stored as text.
fn decimal_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(raw.trim()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
