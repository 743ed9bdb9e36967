//! Shared primitive types used across the whole crate.

/// Stable identifier of a customer, e.g. `C0001`.
pub type CustomerId = String;

/// Ledger transaction identifier, `T` followed by seven digits.
pub type TxnId = String;

/// Timestamp format used for every stored time value.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
