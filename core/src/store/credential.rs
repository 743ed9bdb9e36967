use super::BankStore;
use crate::{
    auth::{username_key, CredentialRecord},
    error::BankResult,
};
use rusqlite::{params, OptionalExtension, Row};

const COLUMNS: &str =
    "username, password, customer_id, is_locked, failed_attempts, locked_at, last_login_at";

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<CredentialRecord> {
    Ok(CredentialRecord {
        username: row.get(0)?,
        password: row.get(1)?,
        customer_id: row.get(2)?,
        is_locked: row.get::<_, i64>(3)? != 0,
        failed_attempts: u32::try_from(row.get::<_, i64>(4)?.max(0)).unwrap_or(u32::MAX),
        locked_at: row.get(5)?,
        last_login_at: row.get(6)?,
    })
}

impl BankStore {
    // ── Credential ────────────────────────────────────────────────

    pub fn insert_credential(&self, c: &CredentialRecord) -> BankResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO credential (username_key, {COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                username_key(&c.username),
                c.username.trim(),
                &c.password,
                &c.customer_id,
                c.is_locked as i64,
                c.failed_attempts as i64,
                &c.locked_at,
                &c.last_login_at,
            ],
        )?;
        Ok(())
    }

    /// Case-insensitive lookup through `username_key`.
    pub fn credential(&self, username: &str) -> BankResult<Option<CredentialRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM credential WHERE username_key = ?1"),
                params![username_key(username)],
                credential_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Write back lock state, counters, timestamps and secret.
    pub fn put_credential(&self, c: &CredentialRecord) -> BankResult<()> {
        self.conn.execute(
            "UPDATE credential
             SET password = ?2, customer_id = ?3, is_locked = ?4, failed_attempts = ?5,
                 locked_at = ?6, last_login_at = ?7
             WHERE username_key = ?1",
            params![
                username_key(&c.username),
                &c.password,
                &c.customer_id,
                c.is_locked as i64,
                c.failed_attempts as i64,
                &c.locked_at,
                &c.last_login_at,
            ],
        )?;
        Ok(())
    }

    pub fn all_credentials(&self) -> BankResult<Vec<CredentialRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM credential ORDER BY rowid ASC"))?;
        let rows = stmt.query_map([], credential_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> BankStore {
        let store = BankStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn lookup_folds_non_ascii_case() {
        let store = store();
        store.insert_credential(&CredentialRecord::new(" Ärzt ", "pw", "C1")).unwrap();

        let found = store.credential("ärzt").unwrap().unwrap();
        assert_eq!(found.username, "Ärzt");
        assert!(store.credential("ÄRZT").unwrap().is_some());
        assert!(store.credential("arzt").unwrap().is_none());
    }

    #[test]
    fn put_matches_by_folded_name() {
        let store = store();
        store.insert_credential(&CredentialRecord::new("Ölaf", "pw", "C1")).unwrap();

        let mut record = store.credential("ölaf").unwrap().unwrap();
        record.failed_attempts = 2;
        record.username = "ÖLAF".into();
        store.put_credential(&record).unwrap();
        assert_eq!(store.credential("Ölaf").unwrap().unwrap().failed_attempts, 2);
    }

    #[test]
    fn oversized_counter_saturates() {
        let store = store();
        store.insert_credential(&CredentialRecord::new("big", "pw", "C1")).unwrap();
        store
            .conn
            .execute("UPDATE credential SET failed_attempts = ?1", params![i64::MAX])
            .unwrap();
        assert_eq!(store.credential("big").unwrap().unwrap().failed_attempts, u32::MAX);
    }
}
