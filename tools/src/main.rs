//! teller: operator commands and the customer session front end.
//!
//! Usage:
//!   teller init --demo --seed 42 --count 10
//!   teller import legacy_bank.csv
//!   teller export backup.csv
//!   teller unlock rahul
//!   teller hash-passwords
//!   teller session            # JSON lines on stdin/stdout
//!   teller --workbook bank.csv session

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};
use teller_core::{
    backend::{BankBackend, WorkbookBackend},
    banking::Tables,
    config::{BankConfig, ENV_BANK_NAME, ENV_DB_PATH, ENV_WORKBOOK_PATH, STATEMENT_ROW_CHOICES},
    demo::DemoSeeder,
    error::{BankError, BankResult},
    session::Session,
    statement::{MarkdownStatement, StatementFormat, StatementRange, TextStatement},
    store::BankStore,
    teller::Teller,
    workbook::Workbook,
};

/// Teller - customer logins, deposits, withdrawals and mini statements
#[derive(Parser)]
#[command(name = "teller")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file [env: BANK_DB_PATH]
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Run against a workbook file instead of the database [env: BANK_WORKBOOK_PATH, DB_EXCEL_PATH]
    #[arg(long, global = true)]
    workbook: Option<PathBuf>,

    /// Bank name shown on statements [env: BANK_NAME]
    #[arg(long, global = true)]
    bank_name: Option<String>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store, optionally filled with demo customers
    Init {
        /// Generate demo customers (first login: demo / demo123)
        #[arg(long)]
        demo: bool,
        /// Seed for the demo generator
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Number of demo customers
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Replace existing data
        #[arg(long)]
        force: bool,
    },

    /// Replace the database contents with a workbook file
    Import {
        path: PathBuf,
    },

    /// Write the database contents to a workbook file
    Export {
        path: PathBuf,
    },

    /// Clear a login lock-out (operator only)
    Unlock {
        username: String,
    },

    /// Replace plaintext passwords with salted hashes
    HashPasswords,

    /// Serve one customer session as JSON lines on stdin/stdout
    Session,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Init { demo, seed, count, force } => init(&config, demo, seed, count, force),
        Commands::Import { path } => {
            let tables = Tables::from_workbook(&Workbook::load(&path)?)?;
            let store = open_store(&config)?;
            store.import_tables(&tables)?;
            println!(
                "Imported {} logins, {} customers, {} transactions from {}",
                tables.credentials.len(),
                tables.customers.len(),
                tables.ledger.len(),
                path.display()
            );
            Ok(())
        }
        Commands::Export { path } => {
            let tables = open_store(&config)?.export_tables()?;
            tables.to_workbook().save(&path)?;
            println!("Exported {} customers to {}", tables.customers.len(), path.display());
            Ok(())
        }
        Commands::Unlock { username } => {
            let teller = Teller::new(open_backend(&config)?, config);
            teller.unlock(&username)?;
            println!("Unlocked: {}", username.trim());
            Ok(())
        }
        Commands::HashPasswords => {
            let changed = open_backend(&config)?.hash_passwords()?;
            println!("Hashed {changed} plaintext password(s)");
            Ok(())
        }
        Commands::Session => {
            let teller = Teller::new(open_backend(&config)?, config);
            run_session(&teller)
        }
    }
}

/// Config file (or defaults), then the environment, then flags.
fn load_config(cli: &Cli) -> Result<BankConfig> {
    let base = match &cli.config {
        Some(path) => BankConfig::load(&path.to_string_lossy())?,
        None => BankConfig::default(),
    };
    let path_str = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().into_owned());
    let from_env = base.with_env_overrides(|key| std::env::var(key).ok());
    Ok(from_env.with_env_overrides(|key| match key {
        ENV_BANK_NAME => cli.bank_name.clone(),
        ENV_DB_PATH => path_str(&cli.db),
        ENV_WORKBOOK_PATH => path_str(&cli.workbook),
        _ => None,
    }))
}

fn open_store(config: &BankConfig) -> Result<BankStore> {
    let path = config
        .db_path
        .to_str()
        .context("database path is not valid UTF-8")?;
    let store = BankStore::open(path)?;
    store.migrate()?;
    Ok(store)
}

fn open_backend(config: &BankConfig) -> Result<Box<dyn BankBackend>> {
    let backend: Box<dyn BankBackend> = match &config.workbook_path {
        Some(path) => Box::new(WorkbookBackend::new(path)),
        None => Box::new(open_store(config)?),
    };
    log::info!("using {} backend", backend.name());
    Ok(backend)
}

fn init(config: &BankConfig, demo: bool, seed: u64, count: usize, force: bool) -> Result<()> {
    let tables = if demo {
        DemoSeeder::new(seed).generate(count)?
    } else {
        Tables::default()
    };

    if let Some(path) = &config.workbook_path {
        if path.exists() && !force {
            bail!("{} already exists; pass --force to replace it", path.display());
        }
        WorkbookBackend::create(path, &tables)?;
        println!("Created workbook {} ({} customers)", path.display(), tables.customers.len());
        return Ok(());
    }

    let store = open_store(config)?;
    if demo {
        if store.customer_count()? > 0 && !force {
            bail!("database already has customers; pass --force to replace them");
        }
        store.import_tables(&tables)?;
    }
    println!(
        "Initialised {} ({} customers)",
        config.db_path.display(),
        store.customer_count()?
    );
    Ok(())
}

// ── Session loop ─────────────────────────────────────────────

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum FormatArg {
    #[default]
    Text,
    Markdown,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SessionRequest {
    Login {
        username: String,
        password: String,
    },
    Logout,
    Status,
    Summary,
    Deposit {
        amount: Value,
        #[serde(default)]
        remarks: String,
    },
    Withdraw {
        amount: Value,
        #[serde(default)]
        remarks: String,
    },
    Statement {
        #[serde(default)]
        last: Option<usize>,
        #[serde(default)]
        all: bool,
    },
    Export {
        #[serde(default)]
        last: Option<usize>,
        #[serde(default)]
        all: bool,
        #[serde(default)]
        format: FormatArg,
        #[serde(default)]
        dir: Option<PathBuf>,
    },
    Quit,
}

fn run_session<B: BankBackend>(teller: &Teller<B>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();
    let mut session = Session::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let request: SessionRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                let err_json = json!({ "ok": false, "kind": "request", "error": e.to_string() });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(request, SessionRequest::Quit) {
            break;
        }

        let reply = match handle_request(teller, &mut session, request) {
            Ok(data) => json!({ "ok": true, "data": data }),
            Err(e) => {
                if e.is_storage() {
                    log::error!("session request failed: {e}");
                }
                json!({ "ok": false, "kind": e.kind(), "error": e.to_string() })
            }
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    teller.logout(&mut session);
    Ok(())
}

fn handle_request<B: BankBackend>(
    teller: &Teller<B>,
    session: &mut Session,
    request: SessionRequest,
) -> BankResult<Value> {
    match request {
        SessionRequest::Login { username, password } => {
            let user = teller.login(session, &username, &password)?;
            Ok(json!({
                "message": "Login successful",
                "customer_id": user.customer_id,
                "token": user.token,
            }))
        }
        SessionRequest::Logout => {
            teller.logout(session);
            Ok(json!({ "message": "Logged out successfully." }))
        }
        SessionRequest::Status => Ok(json!({
            "authenticated": session.is_authenticated(),
            "customer_id": session.current_customer(),
        })),
        SessionRequest::Summary => Ok(serde_json::to_value(teller.summary(session)?)?),
        SessionRequest::Deposit { amount, remarks } => {
            let receipt = teller.deposit(session, &raw_amount(&amount), &remarks)?;
            Ok(json!({ "message": receipt.message(), "receipt": receipt }))
        }
        SessionRequest::Withdraw { amount, remarks } => {
            let receipt = teller.withdraw(session, &raw_amount(&amount), &remarks)?;
            Ok(json!({ "message": receipt.message(), "receipt": receipt }))
        }
        SessionRequest::Statement { last, all } => {
            let range = statement_range(teller.config(), last, all)?;
            Ok(serde_json::to_value(teller.mini_statement(session, range)?)?)
        }
        SessionRequest::Export { last, all, format, dir } => {
            let range = statement_range(teller.config(), last, all)?;
            let renderer: Box<dyn StatementFormat> = match format {
                FormatArg::Text => Box::new(TextStatement::new(teller.config().statement_page_rows)),
                FormatArg::Markdown => Box::new(MarkdownStatement),
            };
            let doc = teller.export_statement(session, range, renderer.as_ref())?;
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            let path = write_document(&dir, &doc.file_name, &doc.bytes)?;
            Ok(json!({
                "file": path.display().to_string(),
                "mime_type": doc.mime_type,
                "bytes": doc.bytes.len(),
            }))
        }
        SessionRequest::Quit => Ok(Value::Null),
    }
}

/// Amounts may arrive as JSON numbers or as typed text.
fn raw_amount(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn statement_range(config: &BankConfig, last: Option<usize>, all: bool) -> BankResult<StatementRange> {
    if let Some(n) = last.filter(|_| !all) {
        if !STATEMENT_ROW_CHOICES.contains(&n) {
            return Err(BankError::Validation(format!(
                "Show last N transactions must be one of {STATEMENT_ROW_CHOICES:?}"
            )));
        }
    }
    Ok(StatementRange::pick(all, last.unwrap_or(config.default_statement_rows)))
}

fn write_document(dir: &Path, file_name: &str, bytes: &[u8]) -> BankResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)?;
    Ok(path)
}
