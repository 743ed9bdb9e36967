//! Credential checks and the login lock-out state machine.
//!
//! A credential record is either unlocked or locked. The only transitions are:
//!   unlocked → locked   on the MAX_FAILED_ATTEMPTS-th consecutive failure
//!   locked   → unlocked on an explicit `unlock`
//! The lock is checked before the password is compared.

use crate::types::CustomerId;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const MAX_FAILED_ATTEMPTS: u32 = 3;

/// Prefix of salted-hash secrets. Anything else is a legacy plaintext value.
const HASH_SCHEME: &str = "sha256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub username: String,
    pub password: String,
    pub customer_id: CustomerId,
    pub is_locked: bool,
    pub failed_attempts: u32,
    pub locked_at: String,
    pub last_login_at: String,
}

impl CredentialRecord {
    pub fn new(username: &str, password: &str, customer_id: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            customer_id: customer_id.to_string(),
            is_locked: false,
            failed_attempts: 0,
            locked_at: String::new(),
            last_login_at: String::new(),
        }
    }

    pub fn matches_username(&self, username: &str) -> bool {
        username_key(&self.username) == username_key(username)
    }

    pub fn attempts_left(&self) -> u32 {
        MAX_FAILED_ATTEMPTS.saturating_sub(self.failed_attempts)
    }

    /// Clear lock flag, counter and lock time. Unconditional.
    pub fn unlock(&mut self) {
        self.is_locked = false;
        self.failed_attempts = 0;
        self.locked_at.clear();
    }

    /// True once the stored secret uses the salted-hash scheme.
    pub fn is_hashed(&self) -> bool {
        parse_hashed(&self.password).is_some()
    }
}

/// Lookup key for a username: trimmed and lowercased with full Unicode
/// folding, so every backend matches the same names.
pub fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

// ── Credential verification ──────────────────────────────────

pub trait CredentialVerifier: Send + Sync {
    /// Does `supplied` match the `stored` secret?
    fn verify(&self, stored: &str, supplied: &str) -> bool;
}

/// Verifies both salted hashes and legacy plaintext secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredSecretVerifier;

impl CredentialVerifier for StoredSecretVerifier {
    fn verify(&self, stored: &str, supplied: &str) -> bool {
        let stored = stored.trim();
        match parse_hashed(stored) {
            Some((salt, digest)) => bool::from(salted_digest(&salt, supplied).ct_eq(&digest)),
            None => bool::from(stored.as_bytes().ct_eq(supplied.as_bytes())),
        }
    }
}

/// Produce `sha256$<salt hex>$<digest hex>` with a fresh 16-byte salt.
pub fn hash_password(plain: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!(
        "{HASH_SCHEME}${}${}",
        hex::encode(salt),
        hex::encode(salted_digest(&salt, plain))
    )
}

fn salted_digest(salt: &[u8], plain: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plain.as_bytes());
    hasher.finalize().to_vec()
}

fn parse_hashed(stored: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != HASH_SCHEME {
        return None;
    }
    let salt = hex::decode(parts.next()?).ok()?;
    let digest = hex::decode(parts.next()?).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((salt, digest))
}

// ── Authentication ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success { customer_id: CustomerId },
    MissingCredentials,
    UserNotFound,
    Locked,
    LockedOut,
    WrongPassword { attempts_left: u32 },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Self::Success { customer_id } => Some(customer_id),
            _ => None,
        }
    }

    /// True when the attempt changed the credential record.
    pub fn mutated(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::LockedOut | Self::WrongPassword { .. }
        )
    }

    pub fn message(&self) -> String {
        match self {
            Self::Success { .. } => "Login successful".into(),
            Self::MissingCredentials => "Please enter username and password.".into(),
            Self::UserNotFound => "User not found.".into(),
            Self::Locked => "Account is locked. Please contact admin to unlock.".into(),
            Self::LockedOut => format!(
                "Account locked ({MAX_FAILED_ATTEMPTS} wrong attempts). Contact admin."
            ),
            Self::WrongPassword { attempts_left } => {
                format!("Wrong password. Attempts left: {attempts_left}")
            }
        }
    }
}

/// Apply one login attempt to a single, already matched record.
pub fn authenticate_record(
    record: &mut CredentialRecord,
    verifier: &dyn CredentialVerifier,
    password: &str,
    now: &str,
) -> LoginOutcome {
    if record.is_locked {
        return LoginOutcome::Locked;
    }

    if verifier.verify(&record.password, password.trim()) {
        record.failed_attempts = 0;
        record.last_login_at = now.to_string();
        return LoginOutcome::Success {
            customer_id: record.customer_id.clone(),
        };
    }

    record.failed_attempts += 1;
    if record.failed_attempts >= MAX_FAILED_ATTEMPTS {
        record.is_locked = true;
        record.locked_at = now.to_string();
        return LoginOutcome::LockedOut;
    }
    LoginOutcome::WrongPassword {
        attempts_left: record.attempts_left(),
    }
}

/// Authenticate against a whole credentials table, updating it in place.
///
/// Blank input and unknown users leave the table untouched.
pub fn authenticate(
    table: &mut [CredentialRecord],
    verifier: &dyn CredentialVerifier,
    username: &str,
    password: &str,
    now: &str,
) -> LoginOutcome {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return LoginOutcome::MissingCredentials;
    }

    match table.iter_mut().find(|r| r.matches_username(username)) {
        Some(record) => authenticate_record(record, verifier, password, now),
        None => LoginOutcome::UserNotFound,
    }
}

/// Unlock `username` in the table. Returns false if no such user.
pub fn unlock(table: &mut [CredentialRecord], username: &str) -> bool {
    let username = username.trim();
    match table.iter_mut().find(|r| r.matches_username(username)) {
        Some(record) => {
            record.unlock();
            true
        }
        None => false,
    }
}

/// Replace every plaintext secret in `table` with a salted hash.
/// Returns how many records changed.
pub fn hash_plaintext(table: &mut [CredentialRecord]) -> usize {
    let mut changed = 0;
    for record in table.iter_mut().filter(|r| !r.is_hashed()) {
        record.password = hash_password(record.password.trim());
        changed += 1;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2024-05-01 10:00:00";

    fn table() -> Vec<CredentialRecord> {
        vec![
            CredentialRecord::new("Rahul", "secret", "C0001"),
            CredentialRecord::new("demo", "demo123", "C0002"),
        ]
    }

    #[test]
    fn blank_input_does_not_touch_table() {
        let mut t = table();
        let before = t.clone();
        let out = authenticate(&mut t, &StoredSecretVerifier, "  ", "x", NOW);
        assert_eq!(out, LoginOutcome::MissingCredentials);
        assert_eq!(t, before);
    }

    #[test]
    fn username_match_ignores_case_and_padding() {
        let mut t = table();
        let out = authenticate(&mut t, &StoredSecretVerifier, " rAhUl ", " secret ", NOW);
        assert_eq!(out.customer_id(), Some("C0001"));
        assert_eq!(t[0].last_login_at, NOW);
    }

    #[test]
    fn third_failure_locks() {
        let mut t = table();
        let v = StoredSecretVerifier;
        assert_eq!(
            authenticate(&mut t, &v, "demo", "nope", NOW),
            LoginOutcome::WrongPassword { attempts_left: 2 }
        );
        assert_eq!(
            authenticate(&mut t, &v, "demo", "nope", NOW),
            LoginOutcome::WrongPassword { attempts_left: 1 }
        );
        assert_eq!(authenticate(&mut t, &v, "demo", "nope", NOW), LoginOutcome::LockedOut);
        assert!(t[1].is_locked);
        assert_eq!(t[1].locked_at, NOW);
        assert_eq!(authenticate(&mut t, &v, "demo", "demo123", NOW), LoginOutcome::Locked);
        assert_eq!(t[1].failed_attempts, 3);
    }

    #[test]
    fn success_resets_counter() {
        let mut t = table();
        let v = StoredSecretVerifier;
        authenticate(&mut t, &v, "demo", "nope", NOW);
        authenticate(&mut t, &v, "demo", "nope", NOW);
        assert!(authenticate(&mut t, &v, "demo", "demo123", NOW).is_success());
        assert_eq!(t[1].failed_attempts, 0);
        assert_eq!(
            authenticate(&mut t, &v, "demo", "nope", NOW),
            LoginOutcome::WrongPassword { attempts_left: 2 }
        );
    }

    #[test]
    fn unlock_clears_state() {
        let mut t = table();
        t[1].is_locked = true;
        t[1].failed_attempts = 3;
        t[1].locked_at = NOW.into();
        assert!(unlock(&mut t, "DEMO"));
        assert!(!t[1].is_locked);
        assert_eq!(t[1].failed_attempts, 0);
        assert!(t[1].locked_at.is_empty());
        assert!(!unlock(&mut t, "ghost"));
    }

    #[test]
    fn hashed_secrets_verify() {
        let stored = hash_password("hunter2");
        assert!(stored.starts_with("sha256$"));
        assert!(StoredSecretVerifier.verify(&stored, "hunter2"));
        assert!(!StoredSecretVerifier.verify(&stored, "hunter3"));
        assert_ne!(stored, hash_password("hunter2"), "salt must differ per hash");
    }

    #[test]
    fn plaintext_secrets_need_an_exact_match() {
        assert!(StoredSecretVerifier.verify(" pass ", "pass"));
        assert!(!StoredSecretVerifier.verify("pass", "pas"));
        assert!(!StoredSecretVerifier.verify("pass", "passs"));
        assert!(!StoredSecretVerifier.verify("pass", "Pass"));
    }

    #[test]
    fn usernames_fold_beyond_ascii() {
        assert_eq!(username_key("  ÄRZT "), "ärzt");
        assert!(CredentialRecord::new("Ärzt", "pw", "C1").matches_username("ärzt"));
    }

    #[test]
    fn hashing_plaintext_keeps_logins_working() {
        let mut t = table();
        t[0].password = hash_password("secret");
        assert_eq!(hash_plaintext(&mut t), 1);
        assert!(t.iter().all(CredentialRecord::is_hashed));
        assert_eq!(hash_plaintext(&mut t), 0);
        assert!(authenticate(&mut t, &StoredSecretVerifier, "demo", "demo123", NOW).is_success());
        assert!(authenticate(&mut t, &StoredSecretVerifier, "rahul", "secret", NOW).is_success());
    }
}
