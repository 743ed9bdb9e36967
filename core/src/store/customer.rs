use super::{decimal_at, BankStore};
use crate::{customer::CustomerRecord, error::BankResult};
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

const COLUMNS: &str = "customer_id, full_name, dob, gender, phone, email, address_line1, city,
    state, pincode, kyc_status, account_status, created_at, account_no, account_type,
    current_balance";

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerRecord> {
    Ok(CustomerRecord {
        customer_id: row.get(0)?,
        full_name: row.get(1)?,
        dob: row.get(2)?,
        gender: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        address_line1: row.get(6)?,
        city: row.get(7)?,
        state: row.get(8)?,
        pincode: row.get(9)?,
        kyc_status: row.get(10)?,
        account_status: row.get(11)?,
        created_at: row.get(12)?,
        account_no: row.get(13)?,
        account_type: row.get(14)?,
        current_balance: decimal_at(row, 15)?,
    })
}

impl BankStore {
    // ── Customer ──────────────────────────────────────────────────

    pub fn insert_customer(&self, c: &CustomerRecord) -> BankResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO customer ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                &c.customer_id,
                &c.full_name,
                &c.dob,
                &c.gender,
                &c.phone,
                &c.email,
                &c.address_line1,
                &c.city,
                &c.state,
                &c.pincode,
                &c.kyc_status,
                &c.account_status,
                &c.created_at,
                &c.account_no,
                &c.account_type,
                c.current_balance.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn customer(&self, customer_id: &str) -> BankResult<Option<CustomerRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM customer WHERE customer_id = ?1"),
                params![customer_id],
                customer_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Only called next to `append_ledger_entry`, inside one transaction.
    pub(crate) fn set_customer_balance(&self, customer_id: &str, balance: Decimal) -> BankResult<()> {
        self.conn.execute(
            "UPDATE customer SET current_balance = ?1 WHERE customer_id = ?2",
            params![balance.to_string(), customer_id],
        )?;
        Ok(())
    }

    pub fn all_customers(&self) -> BankResult<Vec<CustomerRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM customer ORDER BY rowid ASC"))?;
        let rows = stmt.query_map([], customer_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn customer_count(&self) -> BankResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM customer", [], |row| row.get(0))?;
        Ok(n)
    }
}
