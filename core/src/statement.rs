//! Mini statement selection and document rendering.
//!
//! Rendering is pure formatting: callers hand over an already selected,
//! newest-first slice of ledger rows.

use crate::{
    customer::{or_na, CustomerRecord},
    ledger::LedgerEntry,
    money::format_currency,
    types::TIMESTAMP_FORMAT,
};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const TITLE: &str = "Mini Statement";
pub const NO_TRANSACTIONS: &str = "No transactions found.";
pub const DISCLAIMER: &str = "This is a system-generated statement for reference only.";
const COLUMNS: [&str; 7] = [
    "TXN TS", "TXN ID", "TXN TYPE", "AMOUNT", "BALANCE AFTER", "STATUS", "REMARKS",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementRange {
    Last(usize),
    All,
}

impl StatementRange {
    /// The "show all" toggle wins over the row count.
    pub fn pick(show_all: bool, last: usize) -> Self {
        if show_all {
            Self::All
        } else {
            Self::Last(last)
        }
    }
}

/// Newest first by timestamp, same-second rows by descending id; then cut
/// to `range`.
pub fn select_recent(mut entries: Vec<LedgerEntry>, range: StatementRange) -> Vec<LedgerEntry> {
    entries.sort_by(|a, b| {
        b.txn_ts
            .cmp(&a.txn_ts)
            .then_with(|| b.sequence().cmp(&a.sequence()))
    });
    if let StatementRange::Last(n) = range {
        entries.truncate(n);
    }
    entries
}

pub struct StatementInput<'a> {
    pub bank_name: &'a str,
    pub customer: &'a CustomerRecord,
    pub entries: &'a [LedgerEntry],
    pub generated_at: NaiveDateTime,
}

impl StatementInput<'_> {
    fn generated_at_str(&self) -> String {
        self.generated_at.format(TIMESTAMP_FORMAT).to_string()
    }

    fn copyright(&self) -> String {
        format!("(c) {} {}", self.generated_at.year(), self.bank_name)
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        let c = self.customer;
        vec![
            ("Customer Name", or_na(&c.full_name).to_string()),
            ("Customer ID", or_na(&c.customer_id).to_string()),
            ("Account No", or_na(&c.account_no).to_string()),
            ("Account Type", or_na(&c.account_type).to_string()),
            ("Phone", or_na(&c.phone).to_string()),
            ("Email", or_na(&c.email).to_string()),
            ("Current Balance", format_currency(c.current_balance)),
            ("Status", or_na(&c.account_status).to_string()),
        ]
    }

    fn rows(&self) -> Vec<[String; 7]> {
        self.entries
            .iter()
            .map(|e| {
                [
                    e.txn_ts.clone(),
                    e.txn_id.clone(),
                    e.txn_type.to_string(),
                    format_currency(e.amount),
                    format_currency(e.balance_after),
                    e.status.clone(),
                    e.remarks.clone(),
                ]
            })
            .collect()
    }
}

pub trait StatementFormat {
    fn render(&self, input: &StatementInput<'_>) -> String;

    fn extension(&self) -> &'static str;

    fn mime_type(&self) -> &'static str;
}

/// A rendered statement ready to hand out as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementDocument {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn statement_file_name(customer_id: &str, extension: &str) -> String {
    let id = if customer_id.trim().is_empty() { "CUST" } else { customer_id.trim() };
    format!("{id}_mini_statement.{extension}")
}

pub fn render_statement(input: &StatementInput<'_>, format: &dyn StatementFormat) -> StatementDocument {
    StatementDocument {
        file_name: statement_file_name(&input.customer.customer_id, format.extension()),
        mime_type: format.mime_type(),
        bytes: format.render(input).into_bytes(),
    }
}

// ============================================================================
// Plain text
// ============================================================================

/// Paginated plain text. The column header repeats on every page and pages
/// are separated by a form feed.
pub struct TextStatement {
    pub page_rows: usize,
}

impl TextStatement {
    pub fn new(page_rows: usize) -> Self {
        Self { page_rows: page_rows.max(1) }
    }
}

impl StatementFormat for TextStatement {
    fn render(&self, input: &StatementInput<'_>) -> String {
        let rows = input.rows();
        let mut widths = COLUMNS.map(str::len);
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(widths)
                .map(|(c, w)| format!("{c:<w$}"))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };
        let header = line(&COLUMNS.map(String::from));
        let rule = "-".repeat(header.len());

        let mut out = String::new();
        out.push_str(input.bank_name);
        out.push('\n');
        out.push_str(&format!("{TITLE} - Generated at: {}\n\n", input.generated_at_str()));
        for (label, value) in input.details() {
            out.push_str(&format!("{label:<16}: {value}\n"));
        }
        out.push_str("\nRecent Transactions\n");

        if rows.is_empty() {
            out.push_str(NO_TRANSACTIONS);
            out.push('\n');
        } else {
            let pages: Vec<_> = rows.chunks(self.page_rows).collect();
            let total = pages.len();
            for (i, page) in pages.into_iter().enumerate() {
                if i > 0 {
                    out.push('\x0c');
                    out.push_str(&format!("{} - {TITLE} (continued)\n", input.bank_name));
                }
                out.push_str(&header);
                out.push('\n');
                out.push_str(&rule);
                out.push('\n');
                for row in page {
                    out.push_str(&line(row));
                    out.push('\n');
                }
                out.push_str(&format!("Page {} of {total}\n", i + 1));
            }
        }

        out.push('\n');
        out.push_str(DISCLAIMER);
        out.push('\n');
        out.push_str(&input.copyright());
        out.push('\n');
        out
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn mime_type(&self) -> &'static str {
        "text/plain"
    }
}

// ============================================================================
// Markdown
// ============================================================================

pub struct MarkdownStatement;

fn md_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

impl StatementFormat for MarkdownStatement {
    fn render(&self, input: &StatementInput<'_>) -> String {
        let mut out = format!("# {}\n\n", input.bank_name);
        out.push_str(&format!("_{TITLE} - Generated at: {}_\n\n", input.generated_at_str()));
        for (label, value) in input.details() {
            out.push_str(&format!("- **{label}:** {}\n", md_cell(&value)));
        }
        out.push_str("\n### Recent Transactions\n\n");

        let rows = input.rows();
        if rows.is_empty() {
            out.push_str(NO_TRANSACTIONS);
            out.push('\n');
        } else {
            out.push_str(&format!("| {} |\n", COLUMNS.join(" | ")));
            out.push_str(&format!("|{}\n", "---|".repeat(COLUMNS.len())));
            for row in rows {
                let cells: Vec<_> = row.iter().map(|c| md_cell(c)).collect();
                out.push_str(&format!("| {} |\n", cells.join(" | ")));
            }
        }

        out.push_str(&format!("\n---\n\n{DISCLAIMER}\n\n{}\n", input.copyright()));
        out
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn mime_type(&self) -> &'static str {
        "text/markdown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerEntry, NewTransaction, TxnType};
    use rust_decimal_macros::dec;

    fn entry(id: &str, ts: &str) -> LedgerEntry {
        LedgerEntry::record(
            id.into(),
            ts,
            NewTransaction::new("C0001", "ACC1", TxnType::Deposit, dec!(1250), dec!(2250)),
        )
    }

    fn customer() -> CustomerRecord {
        CustomerRecord {
            customer_id: "C0001".into(),
            full_name: "Asha Rao".into(),
            current_balance: dec!(2250),
            ..Default::default()
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-05 12:00:00", TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn newest_first_with_id_tiebreak() {
        let picked = select_recent(
            vec![
                entry("T0000001", "2024-01-01 10:00:00"),
                entry("T0000003", "2024-01-02 10:00:00"),
                entry("T0000002", "2024-01-02 10:00:00"),
            ],
            StatementRange::Last(2),
        );
        let ids: Vec<_> = picked.iter().map(|e| e.txn_id.as_str()).collect();
        assert_eq!(ids, ["T0000003", "T0000002"]);
    }

    #[test]
    fn show_all_ignores_count() {
        assert_eq!(StatementRange::pick(true, 5), StatementRange::All);
        assert_eq!(StatementRange::pick(false, 5), StatementRange::Last(5));
    }

    #[test]
    fn empty_statement_has_placeholder() {
        let c = customer();
        let input = StatementInput { bank_name: "Test Bank", customer: &c, entries: &[], generated_at: at() };
        let text = TextStatement::new(10).render(&input);
        assert!(text.contains(NO_TRANSACTIONS));
        assert!(!text.contains("TXN ID"));
        assert!(text.contains("Current Balance : INR 2,250.00"));
        assert!(text.contains("(c) 2024 Test Bank"));
    }

    #[test]
    fn text_pages_repeat_header() {
        let c = customer();
        let entries: Vec<_> = (1..=5)
            .map(|i| entry(&format!("T{i:07}"), "2024-01-01 10:00:00"))
            .collect();
        let input = StatementInput { bank_name: "Test Bank", customer: &c, entries: &entries, generated_at: at() };
        let text = TextStatement::new(2).render(&input);
        assert_eq!(text.matches("TXN TS").count(), 3);
        assert_eq!(text.matches('\x0c').count(), 2);
        assert!(text.contains("Page 3 of 3"));
        assert!(text.contains("INR 1,250.00"));
    }

    #[test]
    fn document_metadata() {
        let c = customer();
        let entries = [entry("T0000001", "2024-01-01 10:00:00")];
        let input = StatementInput { bank_name: "Test Bank", customer: &c, entries: &entries, generated_at: at() };
        let doc = render_statement(&input, &MarkdownStatement);
        assert_eq!(doc.file_name, "C0001_mini_statement.md");
        assert_eq!(doc.mime_type, "text/markdown");
        let body = String::from_utf8(doc.bytes).unwrap();
        assert!(body.contains("| T0000001 |") || body.contains("| 2024-01-01 10:00:00 | T0000001 |"));
        assert_eq!(statement_file_name("", "txt"), "CUST_mini_statement.txt");
    }
}
