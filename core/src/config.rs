use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_BANK_NAME: &str = "BANK_NAME";
pub const ENV_DB_PATH: &str = "BANK_DB_PATH";
pub const ENV_WORKBOOK_PATH: &str = "BANK_WORKBOOK_PATH";
/// Older deployments name the workbook with this variable.
pub const ENV_LEGACY_WORKBOOK_PATH: &str = "DB_EXCEL_PATH";

/// Offered "last N transactions" choices for the mini statement.
pub const STATEMENT_ROW_CHOICES: [usize; 5] = [5, 10, 15, 20, 50];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Display name on screens and statements.
    pub bank_name: String,
    /// SQLite database backing the bank.
    pub db_path: PathBuf,
    /// When set, run against this legacy workbook file instead of SQLite.
    pub workbook_path: Option<PathBuf>,
    /// Transaction rows per page of a text statement.
    pub statement_page_rows: usize,
    /// Rows on the account summary preview.
    pub summary_preview_rows: usize,
    /// Rows on a mini statement when the user picks nothing.
    pub default_statement_rows: usize,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            bank_name: "State Bank of Rust".into(),
            db_path: PathBuf::from("data/bank.db"),
            workbook_path: None,
            statement_page_rows: 40,
            summary_preview_rows: 10,
            default_statement_rows: STATEMENT_ROW_CHOICES[1],
        }
    }
}

impl BankConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: BankConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validated()
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `BANK_NAME`, `BANK_DB_PATH` and `BANK_WORKBOOK_PATH` from `lookup`.
    /// `DB_EXCEL_PATH` is read when `BANK_WORKBOOK_PATH` is unset.
    /// Blank values are ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(name) = get(ENV_BANK_NAME) {
            self.bank_name = name;
        }
        if let Some(db) = get(ENV_DB_PATH) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(wb) = get(ENV_WORKBOOK_PATH).or_else(|| get(ENV_LEGACY_WORKBOOK_PATH)) {
            self.workbook_path = Some(PathBuf::from(wb));
        }
        self
    }

    fn validated(self) -> anyhow::Result<Self> {
        anyhow::ensure!(!self.bank_name.trim().is_empty(), "bank_name must not be empty");
        anyhow::ensure!(self.statement_page_rows > 0, "statement_page_rows must be positive");
        anyhow::ensure!(self.default_statement_rows > 0, "default_statement_rows must be positive");
        Ok(self)
    }

    /// Config with hardcoded values for use in tests.
    pub fn default_test() -> Self {
        Self {
            bank_name: "Test Bank".into(),
            db_path: PathBuf::from(":memory:"),
            workbook_path: None,
            statement_page_rows: 5,
            summary_preview_rows: 10,
            default_statement_rows: 10,
        }
    }
}
