use crate::types::CustomerId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Profile and balance of one customer account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: CustomerId,
    pub full_name: String,
    pub dob: String,
    pub gender: String,
    pub phone: String,
    pub email: String,
    pub address_line1: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub kyc_status: String,
    pub account_status: String,
    pub created_at: String,
    pub account_no: String,
    pub account_type: String,
    pub current_balance: Decimal,
}

impl CustomerRecord {
    /// Single-line postal address, skipping empty parts.
    pub fn address(&self) -> String {
        let locality = [&self.address_line1, &self.city, &self.state]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        match (locality.is_empty(), self.pincode.trim()) {
            (_, "") => locality,
            (true, pin) => pin.to_string(),
            (false, pin) => format!("{locality} - {pin}"),
        }
    }
}

/// Stand-in for blank profile fields on screens and documents.
pub fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "NA"
    } else {
        value
    }
}
