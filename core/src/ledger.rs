//! Append-only transaction ledger.
//!
//! Transaction ids are `T` + a 7-digit zero-padded sequence. The next id is
//! one past the largest numeric id present; ids whose remainder is not all
//! digits (legacy imports) are ignored by the scan.

use crate::types::{CustomerId, TxnId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TXN_ID_PREFIX: char = 'T';
pub const DEFAULT_CHANNEL: &str = "ONLINE";
pub const DEFAULT_REFERENCE: &str = "SELF";
pub const DEFAULT_STATUS: &str = "SUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnType {
    Deposit,
    Withdraw,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(Self::Deposit),
            "WITHDRAW" | "WITHDRAWAL" => Ok(Self::Withdraw),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub txn_id: TxnId,
    pub customer_id: CustomerId,
    pub account_no: String,
    pub txn_ts: String,
    pub txn_type: TxnType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub channel: String,
    pub reference: String,
    pub status: String,
    pub remarks: String,
}

impl LedgerEntry {
    /// Materialize a new transaction under an already allocated id.
    pub fn record(txn_id: TxnId, txn_ts: &str, txn: NewTransaction) -> Self {
        Self {
            txn_id,
            customer_id: txn.customer_id,
            account_no: txn.account_no,
            txn_ts: txn_ts.to_string(),
            txn_type: txn.txn_type,
            amount: txn.amount,
            balance_after: txn.balance_after,
            channel: txn.channel,
            reference: txn.reference,
            status: txn.status,
            remarks: txn.remarks,
        }
    }

    /// Numeric part of the id, if the id follows the `T<digits>` form.
    pub fn sequence(&self) -> Option<u64> {
        parse_txn_seq(&self.txn_id)
    }
}

/// Everything the caller supplies for a ledger row; id and time are assigned
/// by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub customer_id: CustomerId,
    pub account_no: String,
    pub txn_type: TxnType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub channel: String,
    pub reference: String,
    pub status: String,
    pub remarks: String,
}

impl NewTransaction {
    pub fn new(
        customer_id: &str,
        account_no: &str,
        txn_type: TxnType,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            account_no: account_no.to_string(),
            txn_type,
            amount,
            balance_after,
            channel: DEFAULT_CHANNEL.to_string(),
            reference: DEFAULT_REFERENCE.to_string(),
            status: DEFAULT_STATUS.to_string(),
            remarks: String::new(),
        }
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }

    pub fn reference(mut self, reference: &str) -> Self {
        self.reference = reference.to_string();
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn remarks(mut self, remarks: &str) -> Self {
        self.remarks = remarks.trim().to_string();
        self
    }
}

/// `"T0000042"` → 42, `"42"` → 42, `"LEGACY-7"` → None.
pub fn parse_txn_seq(txn_id: &str) -> Option<u64> {
    let id = txn_id.trim();
    let digits = id.strip_prefix(TXN_ID_PREFIX).unwrap_or(id);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn format_txn_id(seq: u64) -> TxnId {
    format!("{TXN_ID_PREFIX}{seq:07}")
}

/// Largest numeric sequence among `ids`, 0 when there is none.
pub fn max_txn_seq<'a>(ids: impl IntoIterator<Item = &'a str>) -> u64 {
    ids.into_iter().filter_map(parse_txn_seq).max().unwrap_or(0)
}

pub fn next_txn_id(entries: &[LedgerEntry]) -> TxnId {
    format_txn_id(max_txn_seq(entries.iter().map(|e| e.txn_id.as_str())) + 1)
}

/// Append `txn` as the last row of `ledger` and return a copy of the new row.
///
/// Earlier rows are never touched. The amount is not validated here.
pub fn append_transaction(
    ledger: &mut Vec<LedgerEntry>,
    txn: NewTransaction,
    now: &str,
) -> LedgerEntry {
    let entry = LedgerEntry::record(next_txn_id(ledger), now, txn);
    ledger.push(entry.clone());
    entry
}
