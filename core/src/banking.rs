//! Deposit and withdrawal rules, and their whole-table form.
//!
//! RULE: a balance never changes without a ledger row recording it.

use crate::{
    auth::CredentialRecord,
    customer::CustomerRecord,
    error::{BankError, BankResult},
    ledger::{append_transaction, LedgerEntry, NewTransaction, TxnType},
};
use rust_decimal::Decimal;

/// A validated balance movement requested by a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub txn_type: TxnType,
    pub amount: Decimal,
    pub remarks: String,
}

impl Posting {
    pub fn deposit(amount: Decimal, remarks: &str) -> Self {
        Self { txn_type: TxnType::Deposit, amount, remarks: remarks.trim().to_string() }
    }

    pub fn withdraw(amount: Decimal, remarks: &str) -> Self {
        Self { txn_type: TxnType::Withdraw, amount, remarks: remarks.trim().to_string() }
    }

    /// Balance after applying this posting to `balance`.
    ///
    /// Withdrawals beyond the balance fail. Deposits have no upper bound
    /// of their own, but a balance that would leave the decimal range is
    /// rejected before anything changes.
    pub fn apply(&self, balance: Decimal) -> BankResult<Decimal> {
        let next = match self.txn_type {
            TxnType::Deposit => balance.checked_add(self.amount),
            TxnType::Withdraw if self.amount > balance => {
                return Err(BankError::InsufficientFunds { available: balance })
            }
            TxnType::Withdraw => balance.checked_sub(self.amount),
        };
        next.ok_or_else(|| BankError::Validation("Amount is too large.".into()))
    }

    /// The ledger row for this posting against `customer` once it has
    /// reached `balance_after`.
    pub fn to_transaction(&self, customer: &CustomerRecord, balance_after: Decimal) -> NewTransaction {
        NewTransaction::new(
            &customer.customer_id,
            &customer.account_no,
            self.txn_type,
            self.amount,
            balance_after,
        )
        .reference(self.txn_type.as_str())
        .remarks(&self.remarks)
    }
}

/// The three tables of the bank held fully in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    pub credentials: Vec<CredentialRecord>,
    pub customers: Vec<CustomerRecord>,
    pub ledger: Vec<LedgerEntry>,
}

impl Tables {
    pub fn customer(&self, customer_id: &str) -> Option<&CustomerRecord> {
        self.customers.iter().find(|c| c.customer_id == customer_id)
    }

    /// Ledger rows for one customer, in table order.
    pub fn transactions_for(&self, customer_id: &str) -> Vec<LedgerEntry> {
        self.ledger
            .iter()
            .filter(|e| e.customer_id == customer_id)
            .cloned()
            .collect()
    }

    /// Apply `posting` to the customer's balance and append the matching
    /// ledger row. On error neither table is modified.
    pub fn post(&mut self, customer_id: &str, posting: &Posting, now: &str) -> BankResult<LedgerEntry> {
        let customer = self
            .customers
            .iter_mut()
            .find(|c| c.customer_id == customer_id)
            .ok_or_else(|| BankError::NotFound("Customer not found.".into()))?;

        let new_balance = posting.apply(customer.current_balance)?;
        let txn = posting.to_transaction(customer, new_balance);
        customer.current_balance = new_balance;
        Ok(append_transaction(&mut self.ledger, txn, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tables(balance: Decimal) -> Tables {
        Tables {
            customers: vec![CustomerRecord {
                customer_id: "C0001".into(),
                account_no: "ACC1".into(),
                current_balance: balance,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn deposit_adds_and_records() {
        let mut t = tables(dec!(1000.00));
        let e = t.post("C0001", &Posting::deposit(dec!(500), "salary"), "2024-01-01 09:00:00").unwrap();
        assert_eq!(t.customers[0].current_balance, dec!(1500.00));
        assert_eq!(e.txn_type, TxnType::Deposit);
        assert_eq!(e.reference, "DEPOSIT");
        assert_eq!(e.balance_after, dec!(1500.00));
        assert_eq!(t.ledger.len(), 1);
    }

    #[test]
    fn overdraw_leaves_tables_alone() {
        let mut t = tables(dec!(200.00));
        let before = t.clone();
        let err = t.post("C0001", &Posting::withdraw(dec!(300), ""), "2024-01-01 09:00:00").unwrap_err();
        assert!(matches!(err, BankError::InsufficientFunds { available } if available == dec!(200.00)));
        assert_eq!(t, before);
    }

    #[test]
    fn withdraw_whole_balance() {
        let mut t = tables(dec!(200.00));
        let e = t.post("C0001", &Posting::withdraw(dec!(200), ""), "2024-01-01 09:00:00").unwrap();
        assert_eq!(e.balance_after, Decimal::ZERO);
    }

    #[test]
    fn deposit_past_decimal_range_is_rejected() {
        let mut t = tables(dec!(1));
        let before = t.clone();
        let err = t.post("C0001", &Posting::deposit(Decimal::MAX, ""), "2024-01-01 09:00:00").unwrap_err();
        assert!(matches!(err, BankError::Validation(ref m) if m == "Amount is too large."));
        assert_eq!(t, before);
    }

    #[test]
    fn unknown_customer() {
        let mut t = tables(dec!(1));
        let err = t.post("C9999", &Posting::deposit(dec!(1), ""), "2024-01-01 09:00:00").unwrap_err();
        assert!(matches!(err, BankError::NotFound(_)));
    }
}
