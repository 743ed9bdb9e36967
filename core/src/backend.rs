//! Storage backends behind the teller.
//!
//! RULE: every read-modify-write a backend performs is atomic with respect to
//! other writers of the same data. `BankStore` gets that from SQLite
//! transactions; `WorkbookBackend` holds an exclusive lock file for the whole
//! load → change → save cycle. A lock left behind by a writer that died is
//! broken once it is older than the stale threshold.

use crate::{
    auth::{self, authenticate_record, CredentialVerifier, LoginOutcome},
    banking::{Posting, Tables},
    customer::CustomerRecord,
    error::{BankError, BankResult},
    event::BankEvent,
    ledger::LedgerEntry,
    store::BankStore,
    workbook::{sibling, Workbook},
};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    process, thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

pub trait BankBackend {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// One login attempt. Blank input and unknown users change nothing.
    fn authenticate(
        &self,
        username: &str,
        password: &str,
        verifier: &dyn CredentialVerifier,
        now: &str,
    ) -> BankResult<LoginOutcome>;

    /// Clear the lock and the failure counter. False if no such user.
    fn unlock(&self, username: &str) -> BankResult<bool>;

    fn customer(&self, customer_id: &str) -> BankResult<Option<CustomerRecord>>;

    /// Apply `posting` and append its ledger row as one unit.
    fn post(&self, customer_id: &str, posting: &Posting, now: &str) -> BankResult<LedgerEntry>;

    /// The customer's ledger rows in insertion order.
    fn transactions_for(&self, customer_id: &str) -> BankResult<Vec<LedgerEntry>>;

    /// Replace plaintext secrets with salted hashes. Returns how many changed.
    fn hash_passwords(&self) -> BankResult<usize>;

    /// Persist an audit event. Backends without an event log drop it.
    fn record(&self, _event: &BankEvent, _at: &str) -> BankResult<()> {
        Ok(())
    }
}

impl<B: BankBackend + ?Sized> BankBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn authenticate(
        &self,
        username: &str,
        password: &str,
        verifier: &dyn CredentialVerifier,
        now: &str,
    ) -> BankResult<LoginOutcome> {
        (**self).authenticate(username, password, verifier, now)
    }

    fn unlock(&self, username: &str) -> BankResult<bool> {
        (**self).unlock(username)
    }

    fn customer(&self, customer_id: &str) -> BankResult<Option<CustomerRecord>> {
        (**self).customer(customer_id)
    }

    fn post(&self, customer_id: &str, posting: &Posting, now: &str) -> BankResult<LedgerEntry> {
        (**self).post(customer_id, posting, now)
    }

    fn transactions_for(&self, customer_id: &str) -> BankResult<Vec<LedgerEntry>> {
        (**self).transactions_for(customer_id)
    }

    fn hash_passwords(&self) -> BankResult<usize> {
        (**self).hash_passwords()
    }

    fn record(&self, event: &BankEvent, at: &str) -> BankResult<()> {
        (**self).record(event, at)
    }
}

fn customer_not_found() -> BankError {
    BankError::NotFound("Customer not found.".into())
}

// ── SQLite ───────────────────────────────────────────────────

impl BankBackend for BankStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn authenticate(
        &self,
        username: &str,
        password: &str,
        verifier: &dyn CredentialVerifier,
        now: &str,
    ) -> BankResult<LoginOutcome> {
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            return Ok(LoginOutcome::MissingCredentials);
        }
        self.transact(|store| {
            let Some(mut record) = store.credential(username)? else {
                return Ok(LoginOutcome::UserNotFound);
            };
            let outcome = authenticate_record(&mut record, verifier, password, now);
            if outcome.mutated() {
                store.put_credential(&record)?;
            }
            Ok(outcome)
        })
    }

    fn unlock(&self, username: &str) -> BankResult<bool> {
        self.transact(|store| match store.credential(username)? {
            Some(mut record) => {
                record.unlock();
                store.put_credential(&record)?;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn customer(&self, customer_id: &str) -> BankResult<Option<CustomerRecord>> {
        BankStore::customer(self, customer_id)
    }

    fn post(&self, customer_id: &str, posting: &Posting, now: &str) -> BankResult<LedgerEntry> {
        self.transact(|store| {
            let customer = BankStore::customer(store, customer_id)?.ok_or_else(customer_not_found)?;
            let balance_after = posting.apply(customer.current_balance)?;
            let txn_id = store.allocate_txn_id()?;
            let entry = LedgerEntry::record(txn_id, now, posting.to_transaction(&customer, balance_after));
            store.append_ledger_entry(&entry)?;
            store.set_customer_balance(customer_id, balance_after)?;
            Ok(entry)
        })
    }

    fn transactions_for(&self, customer_id: &str) -> BankResult<Vec<LedgerEntry>> {
        self.ledger_for(customer_id)
    }

    fn hash_passwords(&self) -> BankResult<usize> {
        self.transact(|store| {
            let mut credentials = store.all_credentials()?;
            let changed = auth::hash_plaintext(&mut credentials);
            if changed > 0 {
                for record in &credentials {
                    store.put_credential(record)?;
                }
            }
            Ok(changed)
        })
    }

    fn record(&self, event: &BankEvent, at: &str) -> BankResult<()> {
        self.append_event(event, at)
    }
}

// ── Workbook file ────────────────────────────────────────────

const LOCK_RETRY: Duration = Duration::from_millis(50);
/// A lock older than this belongs to a writer that died holding it.
const STALE_LOCK_AFTER: Duration = Duration::from_secs(60);

/// Works directly on a workbook file: every operation reloads all sheets and
/// every change rewrites the whole file.
pub struct WorkbookBackend {
    path: PathBuf,
    lock_timeout: Duration,
    stale_lock_after: Duration,
}

impl WorkbookBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_secs(5),
            stale_lock_after: STALE_LOCK_AFTER,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_after = age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `tables` as a fresh workbook, replacing any existing file.
    pub fn create(path: impl Into<PathBuf>, tables: &Tables) -> BankResult<Self> {
        let backend = Self::new(path);
        let _guard = backend.lock()?;
        tables.to_workbook().save(&backend.path)?;
        Ok(backend)
    }

    pub fn read(&self) -> BankResult<Tables> {
        Tables::from_workbook(&Workbook::load(&self.path)?)
    }

    /// Load, let `f` change the tables, and save if `f` reports a change.
    /// Errors from `f` leave the file as it was.
    fn modify<T>(&self, f: impl FnOnce(&mut Tables) -> BankResult<(T, bool)>) -> BankResult<T> {
        let _guard = self.lock()?;
        let mut tables = self.read()?;
        let (value, changed) = f(&mut tables)?;
        if changed {
            tables.to_workbook().save(&self.path)?;
        }
        Ok(value)
    }

    fn lock(&self) -> BankResult<WorkbookLock> {
        let path = sibling(&self.path, "lock");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let lock = WorkbookLock { path };
                    writeln!(file, "pid={} at={}", process::id(), unix_secs(SystemTime::now()))?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_age(&path).is_some_and(|age| age >= self.stale_lock_after) {
                        log::warn!("breaking stale lock {}", path.display());
                        match fs::remove_file(&path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    if started.elapsed() >= self.lock_timeout {
                        return Err(BankError::Storage(format!(
                            "Workbook is busy: {}",
                            self.path.display()
                        )));
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn unix_secs(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// How long ago the lock at `path` was taken: the `at=` stamp its holder
/// wrote, or the file's modification time while that is still missing.
fn lock_age(path: &Path) -> Option<Duration> {
    let stamped = fs::read_to_string(path).ok().and_then(|text| {
        text.split_whitespace()
            .find_map(|field| field.strip_prefix("at="))
            .and_then(|secs| secs.parse::<u64>().ok())
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
    });
    let taken = match stamped {
        Some(at) => at,
        None => fs::metadata(path).and_then(|m| m.modified()).ok()?,
    };
    SystemTime::now().duration_since(taken).ok()
}

/// Held for one load → change → save cycle; removed on drop.
struct WorkbookLock {
    path: PathBuf,
}

impl Drop for WorkbookLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not remove lock file {}: {e}", self.path.display());
        }
    }
}

impl BankBackend for WorkbookBackend {
    fn name(&self) -> &'static str {
        "workbook"
    }

    fn authenticate(
        &self,
        username: &str,
        password: &str,
        verifier: &dyn CredentialVerifier,
        now: &str,
    ) -> BankResult<LoginOutcome> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Ok(LoginOutcome::MissingCredentials);
        }
        self.modify(|tables| {
            let outcome = auth::authenticate(&mut tables.credentials, verifier, username, password, now);
            let changed = outcome.mutated();
            Ok((outcome, changed))
        })
    }

    fn unlock(&self, username: &str) -> BankResult<bool> {
        self.modify(|tables| {
            let found = auth::unlock(&mut tables.credentials, username);
            Ok((found, found))
        })
    }

    fn customer(&self, customer_id: &str) -> BankResult<Option<CustomerRecord>> {
        Ok(self.read()?.customer(customer_id).cloned())
    }

    fn post(&self, customer_id: &str, posting: &Posting, now: &str) -> BankResult<LedgerEntry> {
        self.modify(|tables| Ok((tables.post(customer_id, posting, now)?, true)))
    }

    fn transactions_for(&self, customer_id: &str) -> BankResult<Vec<LedgerEntry>> {
        Ok(self.read()?.transactions_for(customer_id))
    }

    fn hash_passwords(&self) -> BankResult<usize> {
        self.modify(|tables| {
            let changed = auth::hash_plaintext(&mut tables.credentials);
            Ok((changed, changed > 0))
        })
    }
}
