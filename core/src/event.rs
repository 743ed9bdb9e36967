//! Audit events: every security- or balance-relevant action.
//!
//! Variants are only ever appended.

use crate::types::{CustomerId, TxnId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BankEvent {
    // ── Authentication ─────────────────────────────
    LoginSucceeded {
        username: String,
        customer_id: CustomerId,
    },
    LoginFailed {
        username: String,
        reason: String,
    },
    AccountLocked {
        username: String,
    },
    AccountUnlocked {
        username: String,
    },

    // ── Ledger ─────────────────────────────────────
    FundsDeposited {
        customer_id: CustomerId,
        txn_id: TxnId,
        amount: Decimal,
        balance_after: Decimal,
    },
    FundsWithdrawn {
        customer_id: CustomerId,
        txn_id: TxnId,
        amount: Decimal,
        balance_after: Decimal,
    },
    WithdrawalRejected {
        customer_id: CustomerId,
        amount: Decimal,
        available: Decimal,
    },

    // ── Statements ─────────────────────────────────
    StatementExported {
        customer_id: CustomerId,
        file_name: String,
        rows: usize,
    },
}

impl BankEvent {
    /// Stable name stored in the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LoginSucceeded { .. }     => "login_succeeded",
            Self::LoginFailed { .. }        => "login_failed",
            Self::AccountLocked { .. }      => "account_locked",
            Self::AccountUnlocked { .. }    => "account_unlocked",
            Self::FundsDeposited { .. }     => "funds_deposited",
            Self::FundsWithdrawn { .. }     => "funds_withdrawn",
            Self::WithdrawalRejected { .. } => "withdrawal_rejected",
            Self::StatementExported { .. }  => "statement_exported",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub created_at: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized BankEvent
}
