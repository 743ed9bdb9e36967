//! Workbook file: the three bank tables as named sheets in a single file.
//!
//! On disk every sheet is a run of CSV records introduced by a marker record
//! `#sheet,<name>`, followed by the sheet's header record and its rows:
//!
//! ```text
//! #sheet,login_details
//! username,password,customer_id,is_locked,failed_attempts,locked_at,last_login_at
//! demo,demo123,C0001,0,0,,
//! #sheet,customers
//! ...
//! ```
//!
//! Reads and writes are always whole-file.

use crate::{
    auth::CredentialRecord,
    banking::Tables,
    customer::CustomerRecord,
    error::{BankError, BankResult},
    ledger::{LedgerEntry, TxnType},
};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use rust_decimal::Decimal;
use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

pub const SHEET_CREDENTIALS: &str = "login_details";
pub const SHEET_CUSTOMERS: &str = "customers";
pub const SHEET_LEDGER: &str = "transactions";
pub const SHEETS: [&str; 3] = [SHEET_CREDENTIALS, SHEET_CUSTOMERS, SHEET_LEDGER];

const SHEET_MARKER: &str = "#sheet";

const CREDENTIAL_COLUMNS: [&str; 7] = [
    "username", "password", "customer_id", "is_locked", "failed_attempts", "locked_at",
    "last_login_at",
];
const CUSTOMER_COLUMNS: [&str; 16] = [
    "customer_id", "full_name", "dob", "gender", "phone", "email", "address_line1", "city",
    "state", "pincode", "kyc_status", "account_status", "created_at", "account_no",
    "account_type", "current_balance",
];
const LEDGER_COLUMNS: [&str; 11] = [
    "txn_id", "customer_id", "account_no", "txn_ts", "txn_type", "amount", "balance_after",
    "channel", "reference", "status", "remarks",
];

// ── Sheet ────────────────────────────────────────────────────

/// One named table: a header row and string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Add `name` with `default` in every row unless it already exists.
    pub fn ensure_column(&mut self, name: &str, default: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.resize(self.headers.len() - 1, String::new());
            row.push(default.to_string());
        }
        self.headers.len() - 1
    }

    /// Append a row, padded or cut to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Cell text, empty for missing columns or short rows.
    pub fn get(&self, row: usize, column: &str) -> &str {
        self.column(column)
            .and_then(|c| self.rows.get(row)?.get(c))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set(&mut self, row: usize, column: &str, value: &str) {
        let c = self.ensure_column(column, "");
        if let Some(r) = self.rows.get_mut(row) {
            r.resize(self.headers.len(), String::new());
            r[c] = value.to_string();
        }
    }
}

// ── Workbook ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<(String, Sheet)>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the whole workbook. Every required sheet must be present.
    pub fn load(path: &Path) -> BankResult<Self> {
        if !path.exists() {
            return Err(BankError::Storage(format!("Workbook not found: {}", path.display())));
        }
        let book = Self::read_from(fs::File::open(path)?)?;
        for name in SHEETS {
            book.sheet(name)?;
        }
        log::debug!("loaded workbook {} ({} sheets)", path.display(), book.sheets.len());
        Ok(book)
    }

    pub fn read_from<R: Read>(reader: R) -> BankResult<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut book = Workbook::new();
        let mut current: Option<(String, Option<Sheet>)> = None;

        for result in rdr.records() {
            let record: StringRecord = result?;
            if record.get(0) == Some(SHEET_MARKER) {
                let name = record.get(1).unwrap_or("").trim().to_string();
                if name.is_empty() {
                    return Err(BankError::Storage("sheet marker without a name".into()));
                }
                if let Some((prev, sheet)) = current.take() {
                    book.replace_sheet(&prev, sheet.unwrap_or_default());
                }
                current = Some((name, None));
                continue;
            }

            let Some((_, sheet)) = current.as_mut() else {
                return Err(BankError::Storage("workbook data before the first sheet marker".into()));
            };
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            match sheet {
                None => {
                    let headers: Vec<&str> = cells.iter().map(|h| h.trim()).collect();
                    *sheet = Some(Sheet::new(&headers));
                }
                Some(s) => s.push_row(cells),
            }
        }
        if let Some((name, sheet)) = current {
            book.replace_sheet(&name, sheet.unwrap_or_default());
        }
        Ok(book)
    }

    /// Overwrite the file at `path` with every sheet. Parent directories are
    /// created; the file is replaced in one rename.
    pub fn save(&self, path: &Path) -> BankResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = sibling(path, "tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            self.write_to(&mut file)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        log::debug!("saved workbook {}", path.display());
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: W) -> BankResult<()> {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        for (name, sheet) in &self.sheets {
            wtr.write_record([SHEET_MARKER, name.as_str()])?;
            wtr.write_record(&sheet.headers)?;
            for row in &sheet.rows {
                wtr.write_record(row)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|(n, _)| n.as_str())
    }

    /// Full-table read by name.
    pub fn sheet(&self, name: &str) -> BankResult<&Sheet> {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
            .ok_or_else(|| BankError::Storage(format!("Worksheet named '{name}' not found")))
    }

    /// Full-table overwrite by name; new names are appended.
    pub fn replace_sheet(&mut self, name: &str, sheet: Sheet) {
        match self.sheets.iter_mut().find(|(n, _)| n == name) {
            Some((_, s)) => *s = sheet,
            None => self.sheets.push((name.to_string(), sheet)),
        }
    }
}

/// `dir/bank.csv` → `dir/bank.csv.<suffix>`.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}

// ── Typed tables ─────────────────────────────────────────────

/// Fill in credential columns that older workbooks lack. A legacy
/// `password_hash` column stands in for a missing `password` column.
pub fn ensure_credential_columns(sheet: &mut Sheet) {
    sheet.ensure_column("username", "");
    if sheet.column("password").is_none() {
        let legacy: Vec<String> = (0..sheet.len())
            .map(|r| sheet.get(r, "password_hash").to_string())
            .collect();
        sheet.ensure_column("password", "");
        for (r, value) in legacy.into_iter().enumerate() {
            sheet.set(r, "password", &value);
        }
    }
    for (column, default) in [
        ("customer_id", ""),
        ("is_locked", "0"),
        ("failed_attempts", "0"),
        ("locked_at", ""),
        ("last_login_at", ""),
    ] {
        sheet.ensure_column(column, default);
    }
}

fn parse_flag(raw: &str) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => false,
        "true" | "yes" => true,
        other => other.parse::<f64>().map(|v| v != 0.0).unwrap_or(false),
    }
}

fn parse_count(raw: &str) -> u32 {
    let raw = raw.trim();
    raw.parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u32))
        .unwrap_or(0)
}

fn parse_money(raw: &str, column: &str, key: &str) -> BankResult<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| BankError::Storage(format!("invalid {column} '{raw}' for {key}")))
}

impl Tables {
    pub fn from_workbook(book: &Workbook) -> BankResult<Self> {
        let mut creds = book.sheet(SHEET_CREDENTIALS)?.clone();
        ensure_credential_columns(&mut creds);
        let credentials = (0..creds.len())
            .map(|r| CredentialRecord {
                username: creds.get(r, "username").trim().to_string(),
                password: creds.get(r, "password").to_string(),
                customer_id: creds.get(r, "customer_id").trim().to_string(),
                is_locked: parse_flag(creds.get(r, "is_locked")),
                failed_attempts: parse_count(creds.get(r, "failed_attempts")),
                locked_at: creds.get(r, "locked_at").to_string(),
                last_login_at: creds.get(r, "last_login_at").to_string(),
            })
            .collect();

        let cust = book.sheet(SHEET_CUSTOMERS)?;
        let customers = (0..cust.len())
            .map(|r| {
                let customer_id = cust.get(r, "customer_id").trim().to_string();
                Ok(CustomerRecord {
                    current_balance: parse_money(
                        cust.get(r, "current_balance"),
                        "current_balance",
                        &customer_id,
                    )?,
                    full_name: cust.get(r, "full_name").to_string(),
                    dob: cust.get(r, "dob").to_string(),
                    gender: cust.get(r, "gender").to_string(),
                    phone: cust.get(r, "phone").to_string(),
                    email: cust.get(r, "email").to_string(),
                    address_line1: cust.get(r, "address_line1").to_string(),
                    city: cust.get(r, "city").to_string(),
                    state: cust.get(r, "state").to_string(),
                    pincode: cust.get(r, "pincode").to_string(),
                    kyc_status: cust.get(r, "kyc_status").to_string(),
                    account_status: cust.get(r, "account_status").to_string(),
                    created_at: cust.get(r, "created_at").to_string(),
                    account_no: cust.get(r, "account_no").trim().to_string(),
                    account_type: cust.get(r, "account_type").to_string(),
                    customer_id,
                })
            })
            .collect::<BankResult<Vec<_>>>()?;

        let txns = book.sheet(SHEET_LEDGER)?;
        let ledger = (0..txns.len())
            .map(|r| {
                let txn_id = txns.get(r, "txn_id").trim().to_string();
                let txn_type = TxnType::from_str(txns.get(r, "txn_type"))
                    .map_err(|e| BankError::Storage(format!("{e} for {txn_id}")))?;
                Ok(LedgerEntry {
                    amount: parse_money(txns.get(r, "amount"), "amount", &txn_id)?,
                    balance_after: parse_money(txns.get(r, "balance_after"), "balance_after", &txn_id)?,
                    customer_id: txns.get(r, "customer_id").trim().to_string(),
                    account_no: txns.get(r, "account_no").trim().to_string(),
                    txn_ts: txns.get(r, "txn_ts").to_string(),
                    txn_type,
                    channel: txns.get(r, "channel").to_string(),
                    reference: txns.get(r, "reference").to_string(),
                    status: txns.get(r, "status").to_string(),
                    remarks: txns.get(r, "remarks").to_string(),
                    txn_id,
                })
            })
            .collect::<BankResult<Vec<_>>>()?;

        Ok(Self { credentials, customers, ledger })
    }

    pub fn to_workbook(&self) -> Workbook {
        let mut creds = Sheet::new(&CREDENTIAL_COLUMNS);
        for c in &self.credentials {
            creds.push_row(vec![
                c.username.clone(),
                c.password.clone(),
                c.customer_id.clone(),
                if c.is_locked { "1" } else { "0" }.to_string(),
                c.failed_attempts.to_string(),
                c.locked_at.clone(),
                c.last_login_at.clone(),
            ]);
        }

        let mut custs = Sheet::new(&CUSTOMER_COLUMNS);
        for c in &self.customers {
            custs.push_row(vec![
                c.customer_id.clone(),
                c.full_name.clone(),
                c.dob.clone(),
                c.gender.clone(),
                c.phone.clone(),
                c.email.clone(),
                c.address_line1.clone(),
                c.city.clone(),
                c.state.clone(),
                c.pincode.clone(),
                c.kyc_status.clone(),
                c.account_status.clone(),
                c.created_at.clone(),
                c.account_no.clone(),
                c.account_type.clone(),
                c.current_balance.to_string(),
            ]);
        }

        let mut txns = Sheet::new(&LEDGER_COLUMNS);
        for e in &self.ledger {
            txns.push_row(vec![
                e.txn_id.clone(),
                e.customer_id.clone(),
                e.account_no.clone(),
                e.txn_ts.clone(),
                e.txn_type.to_string(),
                e.amount.to_string(),
                e.balance_after.to_string(),
                e.channel.clone(),
                e.reference.clone(),
                e.status.clone(),
                e.remarks.clone(),
            ]);
        }

        let mut book = Workbook::new();
        book.replace_sheet(SHEET_CREDENTIALS, creds);
        book.replace_sheet(SHEET_CUSTOMERS, custs);
        book.replace_sheet(SHEET_LEDGER, txns);
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "\
#sheet,login_details
username,password_hash,customer_id
rahul,pw1,C0001
#sheet,customers
customer_id,full_name,current_balance
C0001,Rahul,1000.5
#sheet,transactions
txn_id,customer_id,txn_type,amount,balance_after
";

    #[test]
    fn missing_credential_columns_get_defaults() {
        let book = Workbook::read_from(LEGACY.as_bytes()).unwrap();
        let tables = Tables::from_workbook(&book).unwrap();
        let c = &tables.credentials[0];
        assert_eq!(c.password, "pw1");
        assert!(!c.is_locked);
        assert_eq!(c.failed_attempts, 0);
        assert!(c.locked_at.is_empty() && c.last_login_at.is_empty());
        assert!(tables.ledger.is_empty());
        assert_eq!(tables.customers[0].current_balance.to_string(), "1000.5");
    }

    #[test]
    fn ensure_column_pads_existing_rows() {
        let mut s = Sheet::new(&["a"]);
        s.push_row(vec!["1".into()]);
        s.ensure_column("is_locked", "0");
        assert_eq!(s.get(0, "is_locked"), "0");
        assert_eq!(s.ensure_column("a", "x"), 0);
        assert_eq!(s.get(0, "a"), "1");
    }

    #[test]
    fn data_before_marker_is_rejected() {
        let err = Workbook::read_from("a,b\n1,2\n".as_bytes()).unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn missing_sheet_is_a_storage_error() {
        let book = Workbook::read_from("#sheet,customers\ncustomer_id\n".as_bytes()).unwrap();
        assert!(matches!(book.sheet(SHEET_LEDGER), Err(BankError::Storage(_))));
    }

    #[test]
    fn flags_accept_spreadsheet_spellings() {
        assert!(parse_flag("1"));
        assert!(parse_flag("1.0"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag(""));
        assert_eq!(parse_count("2.0"), 2);
        assert_eq!(parse_count(""), 0);
    }
}
