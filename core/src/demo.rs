//! Deterministic demo data: customers, logins and a short history each.
//!
//! RULE: nothing here calls a platform RNG. The same seed always produces
//! the same tables, down to every amount and timestamp.

use crate::{
    auth::CredentialRecord,
    banking::{Posting, Tables},
    customer::CustomerRecord,
    error::BankResult,
    types::TIMESTAMP_FORMAT,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use rust_decimal::Decimal;

/// Password given to every demo login.
pub const DEMO_PASSWORD: &str = "demo123";
/// Username of the first demo customer.
pub const DEMO_USERNAME: &str = "demo";

const FIRST_NAMES: &[&str] = &[
    "Aarav", "Vivaan", "Aditya", "Arjun", "Rahul", "Rohan", "Karan", "Vikram", "Sanjay",
    "Nikhil", "Anil", "Suresh", "Ravi", "Manoj", "Deepak", "Priya", "Ananya", "Diya", "Kavya",
    "Meera", "Sneha", "Pooja", "Neha", "Lakshmi", "Asha", "Divya", "Isha", "Nisha", "Riya",
    "Sunita",
];

const LAST_NAMES: &[&str] = &[
    "Sharma", "Verma", "Gupta", "Iyer", "Reddy", "Nair", "Patel", "Singh", "Kumar", "Das",
    "Mehta", "Joshi", "Rao", "Menon", "Pillai", "Chatterjee", "Banerjee", "Kulkarni",
    "Deshpande", "Bhat",
];

const CITIES: &[(&str, &str, &str)] = &[
    ("Mumbai", "Maharashtra", "400001"),
    ("Pune", "Maharashtra", "411001"),
    ("Bengaluru", "Karnataka", "560001"),
    ("Chennai", "Tamil Nadu", "600001"),
    ("Hyderabad", "Telangana", "500001"),
    ("Kolkata", "West Bengal", "700001"),
    ("Jaipur", "Rajasthan", "302001"),
    ("Kochi", "Kerala", "682001"),
];

const STREETS: &[&str] = &["MG Road", "Station Road", "Park Street", "Lake View", "Temple Street"];

const REMARKS: &[&str] = &["salary", "rent", "groceries", "cash", "transfer", "bills", ""];

// ── RNG ──────────────────────────────────────────────────────

/// A seeded PCG stream.
pub struct DemoRng {
    inner: Pcg64Mcg,
}

impl DemoRng {
    pub fn new(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    /// Roll a u64 in [0, n).
    pub fn below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Inclusive range.
    pub fn between(&mut self, lo: u64, hi: u64) -> u64 {
        lo + self.below(hi - lo + 1)
    }

    /// Bernoulli trial: true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        let bits = self.inner.next_u64();
        ((bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)) < p
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len() as u64) as usize]
    }

    pub fn full_name(&mut self) -> (String, String) {
        (self.pick(FIRST_NAMES).to_string(), self.pick(LAST_NAMES).to_string())
    }
}

// ── Seeder ───────────────────────────────────────────────────

pub struct DemoSeeder {
    rng: DemoRng,
    start: NaiveDateTime,
}

impl DemoSeeder {
    pub fn new(seed: u64) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap_or_default();
        Self { rng: DemoRng::new(seed), start }
    }

    /// Build `count` customers with logins and a short transaction history.
    ///
    /// The first login is always `demo` / `demo123`; the rest are
    /// `<firstname><n>` with the same password.
    pub fn generate(mut self, count: usize) -> BankResult<Tables> {
        let mut tables = Tables::default();
        for n in 1..=count {
            let customer = self.customer(n);
            let username = if n == 1 {
                DEMO_USERNAME.to_string()
            } else {
                let first = customer.full_name.split_whitespace().next().unwrap_or("user");
                format!("{}{n}", first.to_lowercase())
            };
            tables
                .credentials
                .push(CredentialRecord::new(&username, DEMO_PASSWORD, &customer.customer_id));
            let customer_id = customer.customer_id.clone();
            tables.customers.push(customer);
            self.history(&mut tables, &customer_id)?;
        }
        log::info!(
            "demo: {} customers, {} ledger rows",
            tables.customers.len(),
            tables.ledger.len()
        );
        Ok(tables)
    }

    fn customer(&mut self, n: usize) -> CustomerRecord {
        let (first, last) = self.rng.full_name();
        let (city, state, pincode) = *self.rng.pick(CITIES);
        let dob = NaiveDate::from_ymd_opt(1960, 1, 1)
            .map(|d| d + Duration::days(self.rng.below(365 * 40) as i64))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        CustomerRecord {
            customer_id: format!("C{n:04}"),
            full_name: format!("{first} {last}"),
            dob,
            gender: if self.rng.chance(0.5) { "M" } else { "F" }.into(),
            phone: format!("9{:09}", self.rng.below(1_000_000_000)),
            email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
            address_line1: format!("{} {}", self.rng.between(1, 250), self.rng.pick(STREETS)),
            city: city.into(),
            state: state.into(),
            pincode: pincode.into(),
            kyc_status: "VERIFIED".into(),
            account_status: "ACTIVE".into(),
            created_at: self.start.format(TIMESTAMP_FORMAT).to_string(),
            account_no: format!("{:012}", 100_000_000_000 + n as u64),
            account_type: if self.rng.chance(0.7) { "SAVINGS" } else { "CURRENT" }.into(),
            current_balance: Decimal::ZERO,
        }
    }

    /// An opening deposit, then a handful of deposits and withdrawals that
    /// never overdraw.
    fn history(&mut self, tables: &mut Tables, customer_id: &str) -> BankResult<()> {
        let mut at = self.start + Duration::minutes(self.rng.below(600) as i64);
        let opening = Decimal::from(self.rng.between(10, 500) * 100);
        tables.post(customer_id, &Posting::deposit(opening, "opening deposit"), &stamp(at))?;

        for _ in 0..self.rng.between(2, 8) {
            at += Duration::hours(self.rng.between(6, 24 * 14) as i64);
            let remarks = *self.rng.pick(REMARKS);
            let balance = tables
                .customer(customer_id)
                .map(|c| c.current_balance)
                .unwrap_or_default();
            let posting = if self.rng.chance(0.45) && balance >= Decimal::ONE {
                let ceiling = u64::try_from(balance.trunc().mantissa()).unwrap_or(1).max(1);
                Posting::withdraw(Decimal::from(self.rng.between(1, ceiling.min(50_000))), remarks)
            } else {
                Posting::deposit(Decimal::new(self.rng.between(100, 2_500_000) as i64, 2), remarks)
            };
            tables.post(customer_id, &posting, &stamp(at))?;
        }
        Ok(())
    }
}

fn stamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_tables() {
        let a = DemoSeeder::new(42).generate(5).unwrap();
        let b = DemoSeeder::new(42).generate(5).unwrap();
        assert_eq!(a, b);
        let c = DemoSeeder::new(43).generate(5).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn balances_match_last_ledger_row() {
        let t = DemoSeeder::new(7).generate(8).unwrap();
        assert_eq!(t.customers.len(), 8);
        assert_eq!(t.credentials[0].username, "demo");
        for c in &t.customers {
            let rows = t.transactions_for(&c.customer_id);
            assert!(rows.len() >= 3);
            assert_eq!(rows.last().unwrap().balance_after, c.current_balance);
            assert!(c.current_balance >= Decimal::ZERO);
        }
    }

    #[test]
    fn ids_are_sequential() {
        let t = DemoSeeder::new(1).generate(3).unwrap();
        for (i, e) in t.ledger.iter().enumerate() {
            assert_eq!(e.txn_id, format!("T{:07}", i + 1));
        }
    }
}
