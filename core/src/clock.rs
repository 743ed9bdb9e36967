//! Wall clock behind a trait so tests can pin time.

use crate::{
    error::{BankError, BankResult},
    types::TIMESTAMP_FORMAT,
};
use chrono::{Local, NaiveDateTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Current time in the stored timestamp format.
    fn now_str(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Local time of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant. Advance it by hand.
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: std::sync::Arc<std::sync::Mutex<NaiveDateTime>>,
}

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self { at: std::sync::Arc::new(std::sync::Mutex::new(at)) }
    }

    /// Clock frozen at a `YYYY-MM-DD HH:MM:SS` timestamp.
    pub fn at(ts: &str) -> BankResult<Self> {
        NaiveDateTime::parse_from_str(ts.trim(), TIMESTAMP_FORMAT)
            .map(Self::new)
            .map_err(|e| BankError::Validation(format!("Bad timestamp {ts:?}: {e}")))
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut at = self.at.lock().unwrap_or_else(|p| p.into_inner());
        *at += chrono::Duration::seconds(secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.at.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_parses_and_advances() {
        let clock = FixedClock::at("2024-03-01 10:00:00").unwrap();
        clock.advance_secs(90);
        assert_eq!(clock.now_str(), "2024-03-01 10:01:30");
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let err = FixedClock::at("yesterday").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
