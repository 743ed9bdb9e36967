//! Per-user session: the gate in front of every customer operation.

use crate::{
    error::{BankError, BankResult},
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub token: String,
    pub username: String,
    pub customer_id: CustomerId,
    pub opened_at: String,
}

/// Created empty, filled by a successful login, emptied by logout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    user: Option<SessionUser>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn current_customer(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.customer_id.as_str())
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// The logged-in customer, or an authorization error.
    pub fn require_customer(&self) -> BankResult<&str> {
        self.current_customer().ok_or_else(|| {
            BankError::Authorization("You are not logged in. Please login first.".into())
        })
    }

    pub(crate) fn open(&mut self, username: &str, customer_id: &str, now: &str) -> &SessionUser {
        self.user.insert(SessionUser {
            token: Uuid::new_v4().to_string(),
            username: username.trim().to_string(),
            customer_id: customer_id.to_string(),
            opened_at: now.to_string(),
        })
    }

    /// Drop the authenticated user. Returns the user that was logged in.
    pub fn close(&mut self) -> Option<SessionUser> {
        self.user.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_follows_login_and_logout() {
        let mut s = Session::new();
        assert!(!s.is_authenticated());
        assert!(s.require_customer().is_err());

        let token = s.open("demo", "C0002", "2024-01-01 00:00:00").token.clone();
        assert!(!token.is_empty());
        assert_eq!(s.current_customer(), Some("C0002"));
        assert_eq!(s.require_customer().unwrap(), "C0002");

        assert_eq!(s.close().map(|u| u.username), Some("demo".into()));
        assert_eq!(s.current_customer(), None);
    }
}
