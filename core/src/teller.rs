//! The teller: every customer-facing operation, gated by the session.
//!
//! RULE: no operation other than `login` touches customer data without a
//! logged-in session. The teller never talks to storage directly; it goes
//! through a `BankBackend`.

use crate::{
    auth::{CredentialVerifier, LoginOutcome, StoredSecretVerifier},
    backend::BankBackend,
    banking::Posting,
    clock::{Clock, SystemClock},
    config::BankConfig,
    customer::CustomerRecord,
    error::{BankError, BankResult},
    event::BankEvent,
    ledger::{LedgerEntry, TxnType},
    money::format_currency,
    session::{Session, SessionUser},
    statement::{
        render_statement, select_recent, StatementDocument, StatementFormat, StatementInput,
        StatementRange,
    },
    validate::validate_amount,
};
use rust_decimal::Decimal;
use serde::Serialize;

/// What the account summary screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub customer: CustomerRecord,
    pub balance: String,
    pub recent: Vec<LedgerEntry>,
}

/// Result of a successful deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub entry: LedgerEntry,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
}

impl Receipt {
    fn from_entry(entry: LedgerEntry) -> Self {
        let previous_balance = match entry.txn_type {
            TxnType::Deposit => entry.balance_after - entry.amount,
            TxnType::Withdraw => entry.balance_after + entry.amount,
        };
        Self { new_balance: entry.balance_after, previous_balance, entry }
    }

    pub fn message(&self) -> String {
        let verb = match self.entry.txn_type {
            TxnType::Deposit => "Deposit successful! Deposited",
            TxnType::Withdraw => "Withdrawal successful! Withdrawn",
        };
        format!(
            "{verb} {} (Txn ID: {}). Updated Balance: {}",
            format_currency(self.entry.amount),
            self.entry.txn_id,
            format_currency(self.new_balance)
        )
    }
}

pub struct Teller<B: BankBackend> {
    backend: B,
    config: BankConfig,
    clock: Box<dyn Clock>,
    verifier: Box<dyn CredentialVerifier>,
}

impl<B: BankBackend> Teller<B> {
    pub fn new(backend: B, config: BankConfig) -> Self {
        Self {
            backend,
            config,
            clock: Box::new(SystemClock),
            verifier: Box::new(StoredSecretVerifier),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_verifier(mut self, verifier: impl CredentialVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    // ── Authentication ───────────────────────────────────────

    /// Check the credentials and, on success, open `session` for the user.
    ///
    /// Failed attempts are persisted before the error is returned, so the
    /// lockout counter survives a restart.
    pub fn login(&self, session: &mut Session, username: &str, password: &str) -> BankResult<SessionUser> {
        let now = self.clock.now_str();
        let outcome = self
            .backend
            .authenticate(username, password, self.verifier.as_ref(), &now)?;
        let username = username.trim();

        match &outcome {
            LoginOutcome::Success { customer_id } => {
                log::info!("login: {username} -> {customer_id}");
                self.audit(BankEvent::LoginSucceeded {
                    username: username.to_string(),
                    customer_id: customer_id.clone(),
                });
                return Ok(session.open(username, customer_id, &now).clone());
            }
            LoginOutcome::MissingCredentials => {}
            LoginOutcome::LockedOut => {
                log::warn!("login: {username} locked after repeated failures");
                self.audit(self.login_failed(username, &outcome));
                self.audit(BankEvent::AccountLocked { username: username.to_string() });
            }
            _ => {
                log::warn!("login: {username} rejected ({})", outcome.message());
                self.audit(self.login_failed(username, &outcome));
            }
        }

        let message = outcome.message();
        Err(match outcome {
            LoginOutcome::MissingCredentials => BankError::Validation(message),
            LoginOutcome::UserNotFound => BankError::NotFound(message),
            _ => BankError::Authorization(message),
        })
    }

    pub fn logout(&self, session: &mut Session) -> Option<SessionUser> {
        let user = session.close();
        if let Some(u) = &user {
            log::info!("logout: {}", u.username);
        }
        user
    }

    /// Operator action: clear the lock and failure counter of `username`.
    pub fn unlock(&self, username: &str) -> BankResult<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BankError::Validation("Please enter a username to unlock.".into()));
        }
        if !self.backend.unlock(username)? {
            return Err(BankError::NotFound("User not found.".into()));
        }
        log::info!("unlock: {username}");
        self.audit(BankEvent::AccountUnlocked { username: username.to_string() });
        Ok(())
    }

    // ── Account ──────────────────────────────────────────────

    pub fn summary(&self, session: &Session) -> BankResult<AccountSummary> {
        let customer = self.current_customer(session)?;
        let history = self.backend.transactions_for(&customer.customer_id)?;
        let recent = select_recent(history, StatementRange::Last(self.config.summary_preview_rows));
        Ok(AccountSummary {
            balance: format_currency(customer.current_balance),
            customer,
            recent,
        })
    }

    pub fn deposit(&self, session: &Session, amount: &str, remarks: &str) -> BankResult<Receipt> {
        let customer_id = session.require_customer()?;
        let amount = validate_amount(amount)?;
        let entry = self.backend.post(customer_id, &Posting::deposit(amount, remarks), &self.clock.now_str())?;

        log::info!("deposit: {customer_id} {} -> {}", entry.amount, entry.txn_id);
        self.audit(BankEvent::FundsDeposited {
            customer_id: customer_id.to_string(),
            txn_id: entry.txn_id.clone(),
            amount: entry.amount,
            balance_after: entry.balance_after,
        });
        Ok(Receipt::from_entry(entry))
    }

    pub fn withdraw(&self, session: &Session, amount: &str, remarks: &str) -> BankResult<Receipt> {
        let customer_id = session.require_customer()?;
        let amount = validate_amount(amount)?;
        let posted = self.backend.post(customer_id, &Posting::withdraw(amount, remarks), &self.clock.now_str());

        let entry = match posted {
            Ok(entry) => entry,
            Err(BankError::InsufficientFunds { available }) => {
                log::warn!("withdraw: {customer_id} asked {amount}, has {available}");
                self.audit(BankEvent::WithdrawalRejected {
                    customer_id: customer_id.to_string(),
                    amount,
                    available,
                });
                return Err(BankError::InsufficientFunds { available });
            }
            Err(e) => return Err(e),
        };

        log::info!("withdraw: {customer_id} {} -> {}", entry.amount, entry.txn_id);
        self.audit(BankEvent::FundsWithdrawn {
            customer_id: customer_id.to_string(),
            txn_id: entry.txn_id.clone(),
            amount: entry.amount,
            balance_after: entry.balance_after,
        });
        Ok(Receipt::from_entry(entry))
    }

    // ── Statements ───────────────────────────────────────────

    /// The customer's newest transactions, newest first.
    pub fn mini_statement(&self, session: &Session, range: StatementRange) -> BankResult<Vec<LedgerEntry>> {
        let customer_id = session.require_customer()?;
        Ok(select_recent(self.backend.transactions_for(customer_id)?, range))
    }

    pub fn export_statement(
        &self,
        session: &Session,
        range: StatementRange,
        format: &dyn StatementFormat,
    ) -> BankResult<StatementDocument> {
        let customer = self.current_customer(session)?;
        let entries = select_recent(self.backend.transactions_for(&customer.customer_id)?, range);
        let doc = render_statement(
            &StatementInput {
                bank_name: &self.config.bank_name,
                customer: &customer,
                entries: &entries,
                generated_at: self.clock.now(),
            },
            format,
        );

        log::info!("statement: {} ({} rows)", doc.file_name, entries.len());
        self.audit(BankEvent::StatementExported {
            customer_id: customer.customer_id.clone(),
            file_name: doc.file_name.clone(),
            rows: entries.len(),
        });
        Ok(doc)
    }

    // ── Helpers ──────────────────────────────────────────────

    fn current_customer(&self, session: &Session) -> BankResult<CustomerRecord> {
        let customer_id = session.require_customer()?;
        self.backend
            .customer(customer_id)?
            .ok_or_else(|| BankError::NotFound("Customer not found.".into()))
    }

    fn login_failed(&self, username: &str, outcome: &LoginOutcome) -> BankEvent {
        BankEvent::LoginFailed {
            username: username.to_string(),
            reason: outcome.message(),
        }
    }

    /// The audit trail never fails an operation that already happened.
    fn audit(&self, event: BankEvent) {
        if let Err(e) = self.backend.record(&event, &self.clock.now_str()) {
            log::warn!("could not record {} event: {e}", event.type_name());
        }
    }
}
