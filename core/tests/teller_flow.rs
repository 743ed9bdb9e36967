//! End-to-end customer flows against the SQLite store.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use teller_core::{
    auth::CredentialRecord,
    banking::Tables,
    clock::FixedClock,
    config::BankConfig,
    customer::CustomerRecord,
    error::BankError,
    ledger::{LedgerEntry, NewTransaction, TxnType},
    session::Session,
    statement::{MarkdownStatement, StatementRange, TextStatement},
    store::BankStore,
    teller::Teller,
};

fn customer(id: &str, name: &str, balance: Decimal) -> CustomerRecord {
    CustomerRecord {
        customer_id: id.into(),
        full_name: name.into(),
        account_no: format!("1000000{id}"),
        account_type: "SAVINGS".into(),
        account_status: "ACTIVE".into(),
        current_balance: balance,
        ..Default::default()
    }
}

fn store_with(balance: Decimal, ledger: Vec<LedgerEntry>) -> BankStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = BankStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
        .import_tables(&Tables {
            credentials: vec![
                CredentialRecord::new("rahul", "secret", "C0001"),
                CredentialRecord::new("priya", "pass", "C0002"),
            ],
            customers: vec![
                customer("C0001", "Rahul Sharma", balance),
                customer("C0002", "Priya Nair", dec!(50)),
            ],
            ledger,
        })
        .expect("import");
    store
}

fn teller(store: BankStore) -> (Teller<BankStore>, FixedClock) {
    let clock = FixedClock::at("2024-03-01 10:00:00").expect("clock");
    let teller = Teller::new(store, BankConfig::default_test()).with_clock(clock.clone());
    (teller, clock)
}

fn login(teller: &Teller<BankStore>, user: &str, password: &str) -> Session {
    let mut session = Session::new();
    teller.login(&mut session, user, password).expect("login");
    session
}

// ── Deposit / withdraw ───────────────────────────────────────

#[test]
fn deposit_updates_balance_and_ledger() {
    let (teller, _) = teller(store_with(dec!(1000.00), vec![]));
    let session = login(&teller, "rahul", "secret");

    let receipt = teller.deposit(&session, "500", "salary").unwrap();
    assert_eq!(receipt.previous_balance, dec!(1000.00));
    assert_eq!(receipt.new_balance, dec!(1500.00));
    assert_eq!(receipt.entry.txn_id, "T0000001");
    assert_eq!(receipt.entry.txn_ts, "2024-03-01 10:00:00");
    assert_eq!(receipt.entry.reference, "DEPOSIT");

    let store = teller.backend();
    assert_eq!(store.customer("C0001").unwrap().unwrap().current_balance, dec!(1500.00));
    let rows = store.ledger_for("C0001").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].txn_type, TxnType::Deposit);
    assert_eq!(rows[0].amount, dec!(500));
    assert_eq!(rows[0].balance_after, dec!(1500.00));
    assert_eq!(rows[0].remarks, "salary");
    assert_eq!(store.events_of_type("funds_deposited").unwrap().len(), 1);
}

#[test]
fn withdrawal_of_whole_balance_is_allowed() {
    let (teller, _) = teller(store_with(dec!(200), vec![]));
    let session = login(&teller, "rahul", "secret");

    let receipt = teller.withdraw(&session, "200", "").unwrap();
    assert_eq!(receipt.new_balance, Decimal::ZERO);
    assert_eq!(receipt.entry.txn_type, TxnType::Withdraw);
    assert_eq!(receipt.entry.reference, "WITHDRAW");
}

#[test]
fn overdraw_is_rejected_without_any_change() {
    let (teller, _) = teller(store_with(dec!(200.00), vec![]));
    let session = login(&teller, "rahul", "secret");

    let err = teller.withdraw(&session, "300", "").unwrap_err();
    assert!(matches!(err, BankError::InsufficientFunds { available } if available == dec!(200.00)));
    assert_eq!(err.to_string(), "Insufficient balance. You can withdraw up to INR 200.00");

    let store = teller.backend();
    assert!(store.ledger_for("C0001").unwrap().is_empty());
    assert_eq!(store.customer("C0001").unwrap().unwrap().current_balance, dec!(200.00));
    assert_eq!(store.txn_sequence().unwrap(), 0);
    assert_eq!(store.events_of_type("withdrawal_rejected").unwrap().len(), 1);
}

#[test]
fn bad_amounts_are_rejected() {
    let (teller, _) = teller(store_with(dec!(100), vec![]));
    let session = login(&teller, "rahul", "secret");

    let err = teller.deposit(&session, "abc", "").unwrap_err();
    assert_eq!(err.to_string(), "Please enter a valid numeric amount.");
    let err = teller.withdraw(&session, "0", "").unwrap_err();
    assert_eq!(err.to_string(), "Amount must be greater than 0.");
    let err = teller.deposit(&session, "-10", "").unwrap_err();
    assert_eq!(err.kind(), "validation");

    assert!(teller.backend().ledger_for("C0001").unwrap().is_empty());
}

#[test]
fn deposit_beyond_decimal_range_is_rejected_and_store_stays_usable() {
    let (teller, _) = teller(store_with(dec!(1), vec![]));
    let session = login(&teller, "rahul", "secret");

    let err = teller.deposit(&session, "79228162514264337593543950335", "").unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(err.to_string(), "Amount is too large.");

    let store = teller.backend();
    assert_eq!(store.customer("C0001").unwrap().unwrap().current_balance, dec!(1));
    assert_eq!(store.txn_sequence().unwrap(), 0);

    // The failed posting rolled back, so the next one commits normally.
    let receipt = teller.deposit(&session, "10", "").unwrap();
    assert_eq!(receipt.entry.txn_id, "T0000001");
    assert_eq!(receipt.new_balance, dec!(11));
}

#[test]
fn ids_continue_past_imported_numeric_ids() {
    let old = |id: &str| {
        LedgerEntry::record(
            id.into(),
            "2023-12-31 23:00:00",
            NewTransaction::new("C0002", "1000000C0002", TxnType::Deposit, dec!(50), dec!(50)),
        )
    };
    let store = store_with(dec!(100), vec![old("T0000005"), old("LEGACY-900"), old("T0000002")]);
    assert_eq!(store.txn_sequence().unwrap(), 5);

    let (teller, _) = teller(store);
    let session = login(&teller, "rahul", "secret");
    assert_eq!(teller.deposit(&session, "1", "").unwrap().entry.txn_id, "T0000006");
    assert_eq!(teller.deposit(&session, "1", "").unwrap().entry.txn_id, "T0000007");
}

// ── Session gate ─────────────────────────────────────────────

#[test]
fn customer_operations_require_login() {
    let (teller, _) = teller(store_with(dec!(100), vec![]));
    let session = Session::new();

    for err in [
        teller.deposit(&session, "10", "").unwrap_err(),
        teller.withdraw(&session, "10", "").unwrap_err(),
        teller.summary(&session).unwrap_err(),
        teller.mini_statement(&session, StatementRange::All).unwrap_err(),
        teller.export_statement(&session, StatementRange::All, &MarkdownStatement).unwrap_err(),
    ] {
        assert!(matches!(err, BankError::Authorization(_)), "got {err:?}");
    }
    assert!(teller.backend().ledger_for("C0001").unwrap().is_empty());
}

#[test]
fn logout_closes_the_gate() {
    let (teller, _) = teller(store_with(dec!(100), vec![]));
    let mut session = login(&teller, "rahul", "secret");
    assert_eq!(session.current_customer(), Some("C0001"));

    let user = teller.logout(&mut session).unwrap();
    assert_eq!(user.username, "rahul");
    assert!(teller.summary(&session).is_err());
}

#[test]
fn sessions_are_independent() {
    let (teller, _) = teller(store_with(dec!(100), vec![]));
    let rahul = login(&teller, "rahul", "secret");
    let priya = login(&teller, "priya", "pass");

    teller.deposit(&priya, "25", "").unwrap();
    assert_eq!(teller.summary(&rahul).unwrap().customer.current_balance, dec!(100));
    assert_eq!(teller.summary(&priya).unwrap().customer.current_balance, dec!(75));
    assert_ne!(rahul.user().unwrap().token, priya.user().unwrap().token);
}

// ── Login / lockout ──────────────────────────────────────────

#[test]
fn third_wrong_password_locks_the_account() {
    let (teller, _) = teller(store_with(dec!(100), vec![]));
    let mut session = Session::new();

    let err = teller.login(&mut session, "rahul", "nope").unwrap_err();
    assert_eq!(err.to_string(), "Wrong password. Attempts left: 2");
    let err = teller.login(&mut session, "rahul", "nope").unwrap_err();
    assert_eq!(err.to_string(), "Wrong password. Attempts left: 1");
    let err = teller.login(&mut session, "rahul", "nope").unwrap_err();
    assert_eq!(err.to_string(), "Account locked (3 wrong attempts). Contact admin.");

    let err = teller.login(&mut session, "rahul", "secret").unwrap_err();
    assert_eq!(err.to_string(), "Account is locked. Please contact admin to unlock.");
    assert!(matches!(err, BankError::Authorization(_)));
    assert!(!session.is_authenticated());

    let record = teller.backend().credential("rahul").unwrap().unwrap();
    assert!(record.is_locked);
    assert_eq!(record.failed_attempts, 3);
    assert_eq!(record.locked_at, "2024-03-01 10:00:00");
    assert_eq!(teller.backend().events_of_type("account_locked").unwrap().len(), 1);
}

#[test]
fn unlock_restores_access() {
    let (teller, clock) = teller(store_with(dec!(100), vec![]));
    let mut session = Session::new();
    for _ in 0..3 {
        let _ = teller.login(&mut session, "rahul", "nope");
    }

    teller.unlock(" RAHUL ").unwrap();
    let record = teller.backend().credential("rahul").unwrap().unwrap();
    assert!(!record.is_locked);
    assert_eq!(record.failed_attempts, 0);
    assert!(record.locked_at.is_empty());

    clock.advance_secs(60);
    let user = teller.login(&mut session, "Rahul", "secret").unwrap();
    assert_eq!(user.customer_id, "C0001");
    assert_eq!(
        teller.backend().credential("rahul").unwrap().unwrap().last_login_at,
        "2024-03-01 10:01:00"
    );
}

#[test]
fn success_resets_the_failure_counter() {
    let (teller, _) = teller(store_with(dec!(100), vec![]));
    let mut session = Session::new();
    let _ = teller.login(&mut session, "rahul", "nope");
    let _ = teller.login(&mut session, "rahul", "nope");
    teller.login(&mut session, "rahul", "secret").unwrap();
    assert_eq!(teller.backend().credential("rahul").unwrap().unwrap().failed_attempts, 0);
}

#[test]
fn login_rejections_are_classified() {
    let (teller, _) = teller(store_with(dec!(100), vec![]));
    let mut session = Session::new();

    let err = teller.login(&mut session, "  ", "secret").unwrap_err();
    assert!(matches!(err, BankError::Validation(ref m) if m == "Please enter username and password."));
    let err = teller.login(&mut session, "ghost", "secret").unwrap_err();
    assert!(matches!(err, BankError::NotFound(ref m) if m == "User not found."));
    assert!(matches!(teller.unlock("ghost"), Err(BankError::NotFound(_))));

    // Unknown users never touch existing records.
    assert_eq!(teller.backend().credential("rahul").unwrap().unwrap().failed_attempts, 0);
}

#[test]
fn non_ascii_usernames_match_without_case() {
    let store = BankStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
        .import_tables(&Tables {
            credentials: vec![CredentialRecord::new("Ärzt", "heil", "C0001")],
            customers: vec![customer("C0001", "Dr. Ärzt", dec!(10))],
            ledger: vec![],
        })
        .expect("import");
    let (teller, _) = teller(store);

    let session = login(&teller, "ärzt", "heil");
    assert_eq!(session.current_customer(), Some("C0001"));
    let mut other = Session::new();
    let err = teller.login(&mut other, "ÄRZT", "wrong").unwrap_err();
    assert_eq!(err.to_string(), "Wrong password. Attempts left: 2");
    assert_eq!(teller.backend().credential("Ärzt").unwrap().unwrap().failed_attempts, 1);
}

// ── Summary / statements ─────────────────────────────────────

#[test]
fn statement_is_newest_first() {
    let (teller, clock) = teller(store_with(dec!(1000), vec![]));
    let session = login(&teller, "rahul", "secret");
    for amount in ["10", "20", "30"] {
        teller.deposit(&session, amount, "").unwrap();
        clock.advance_secs(3600);
    }
    teller.withdraw(&session, "5", "atm").unwrap();

    let rows = teller.mini_statement(&session, StatementRange::Last(2)).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].txn_id, "T0000004");
    assert_eq!(rows[1].txn_id, "T0000003");

    let all = teller.mini_statement(&session, StatementRange::pick(true, 2)).unwrap();
    assert_eq!(all.len(), 4);

    let summary = teller.summary(&session).unwrap();
    assert_eq!(summary.balance, "INR 1,055.00");
    assert_eq!(summary.recent.len(), 4);
    assert_eq!(summary.recent[0].remarks, "atm");
}

#[test]
fn export_names_the_file_after_the_customer() {
    let (teller, _) = teller(store_with(dec!(1000), vec![]));
    let session = login(&teller, "rahul", "secret");
    teller.deposit(&session, "250.5", "").unwrap();

    let doc = teller
        .export_statement(&session, StatementRange::Last(10), &TextStatement::new(5))
        .unwrap();
    assert_eq!(doc.file_name, "C0001_mini_statement.txt");
    assert_eq!(doc.mime_type, "text/plain");
    let text = String::from_utf8(doc.bytes).unwrap();
    assert!(text.starts_with("Test Bank\n"));
    assert!(text.contains("Rahul Sharma"));
    assert!(text.contains("INR 1,250.50"));
    assert!(text.contains("Page 1 of 1"));
    assert!(text.contains("(c) 2024 Test Bank"));

    let events = teller.backend().events_of_type("statement_exported").unwrap();
    assert_eq!(events.len(), 1);
}

#[test]
fn empty_history_still_exports() {
    let (teller, _) = teller(store_with(dec!(0), vec![]));
    let session = login(&teller, "rahul", "secret");
    let doc = teller
        .export_statement(&session, StatementRange::All, &MarkdownStatement)
        .unwrap();
    assert_eq!(doc.file_name, "C0001_mini_statement.md");
    assert!(String::from_utf8(doc.bytes).unwrap().contains("No transactions found."));
}
