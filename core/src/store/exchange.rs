//! Whole-database import/export against the in-memory `Tables` form.

use super::BankStore;
use crate::{banking::Tables, error::BankResult, ledger::max_txn_seq};

impl BankStore {
    // ── Import / export ───────────────────────────────────────────

    /// Replace every credential, customer and ledger row with `tables`.
    ///
    /// The id counter is raised to the largest imported numeric id, so ids
    /// already handed out stay unique even if the import is older.
    pub fn import_tables(&self, tables: &Tables) -> BankResult<()> {
        self.transact(|store| {
            store.conn.execute_batch(
                "DELETE FROM ledger_entry;
                 DELETE FROM customer;
                 DELETE FROM credential;",
            )?;
            for c in &tables.credentials {
                store.insert_credential(c)?;
            }
            for c in &tables.customers {
                store.insert_customer(c)?;
            }
            for e in &tables.ledger {
                store.append_ledger_entry(e)?;
            }
            store.raise_txn_sequence(max_txn_seq(
                tables.ledger.iter().map(|e| e.txn_id.as_str()),
            ))?;
            log::info!(
                "imported {} credentials, {} customers, {} ledger rows",
                tables.credentials.len(),
                tables.customers.len(),
                tables.ledger.len()
            );
            Ok(())
        })
    }

    pub fn export_tables(&self) -> BankResult<Tables> {
        Ok(Tables {
            credentials: self.all_credentials()?,
            customers: self.all_customers()?,
            ledger: self.all_ledger()?,
        })
    }
}
