//! Teller core: customer logins, balances, the transaction ledger and mini
//! statements over a SQLite store or a legacy workbook file.

pub mod auth;
pub mod backend;
pub mod banking;
pub mod clock;
pub mod config;
pub mod customer;
pub mod demo;
pub mod error;
pub mod event;
pub mod ledger;
pub mod money;
pub mod session;
pub mod statement;
pub mod store;
pub mod teller;
pub mod types;
pub mod validate;
pub mod workbook;
