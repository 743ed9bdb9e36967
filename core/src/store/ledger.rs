use super::{decimal_at, BankStore};
use crate::{
    error::BankResult,
    ledger::{format_txn_id, LedgerEntry, TxnType},
    types::TxnId,
};
use rusqlite::{params, types::Type, Row};
use std::str::FromStr;

const COLUMNS: &str = "txn_id, customer_id, account_no, txn_ts, txn_type, amount, balance_after,
    channel, reference, status, remarks";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let raw_type: String = row.get(4)?;
    let txn_type = TxnType::from_str(&raw_type)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;
    Ok(LedgerEntry {
        txn_id: row.get(0)?,
        customer_id: row.get(1)?,
        account_no: row.get(2)?,
        txn_ts: row.get(3)?,
        txn_type,
        amount: decimal_at(row, 5)?,
        balance_after: decimal_at(row, 6)?,
        channel: row.get(7)?,
        reference: row.get(8)?,
        status: row.get(9)?,
        remarks: row.get(10)?,
    })
}

impl BankStore {
    // ── Transaction ids ───────────────────────────────────────────

    /// Bump the durable counter and return the id it now names.
    /// Call inside `transact` so the bump and the insert commit together.
    ///
    /// Ids follow the counter, not the rows currently stored. After an older
    /// snapshot is re-imported the next id is counter + 1, which can leave a
    /// gap above the highest id in the ledger; ids are never reused.
    pub(crate) fn allocate_txn_id(&self) -> BankResult<TxnId> {
        self.conn.execute(
            "UPDATE txn_sequence SET last_value = last_value + 1 WHERE id = 1",
            [],
        )?;
        let seq: i64 = self.conn.query_row(
            "SELECT last_value FROM txn_sequence WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(format_txn_id(seq.max(0) as u64))
    }

    pub fn txn_sequence(&self) -> BankResult<u64> {
        let seq: i64 = self.conn.query_row(
            "SELECT last_value FROM txn_sequence WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(seq.max(0) as u64)
    }

    /// Never moves the counter backwards.
    pub(crate) fn raise_txn_sequence(&self, at_least: u64) -> BankResult<()> {
        self.conn.execute(
            "UPDATE txn_sequence SET last_value = MAX(last_value, ?1) WHERE id = 1",
            params![i64::try_from(at_least).unwrap_or(i64::MAX)],
        )?;
        Ok(())
    }

    // ── Ledger ────────────────────────────────────────────────────

    pub(crate) fn append_ledger_entry(&self, e: &LedgerEntry) -> BankResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO ledger_entry ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                &e.txn_id,
                &e.customer_id,
                &e.account_no,
                &e.txn_ts,
                e.txn_type.as_str(),
                e.amount.to_string(),
                e.balance_after.to_string(),
                &e.channel,
                &e.reference,
                &e.status,
                &e.remarks,
            ],
        )?;
        Ok(())
    }

    /// One customer's rows in insertion order.
    pub fn ledger_for(&self, customer_id: &str) -> BankResult<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM ledger_entry WHERE customer_id = ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![customer_id], entry_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn all_ledger(&self) -> BankResult<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM ledger_entry ORDER BY seq ASC"))?;
        let rows = stmt.query_map([], entry_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
