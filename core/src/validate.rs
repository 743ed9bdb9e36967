//! Monetary input validation.

use crate::error::BankError;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Please enter a valid numeric amount.")]
    NotNumeric,
    #[error("Amount must be greater than 0.")]
    NotPositive,
}

impl From<AmountError> for BankError {
    fn from(e: AmountError) -> Self {
        BankError::Validation(e.to_string())
    }
}

/// Parse a user-entered amount and require it to be strictly positive.
///
/// Accepts plain decimals (`"500"`, `" 12.75 "`) and scientific notation
/// (`"1e3"`). No upper bound and no rounding are applied.
pub fn validate_amount(raw: &str) -> Result<Decimal, AmountError> {
    let text = raw.trim();
    let amount = Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| AmountError::NotNumeric)?;

    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_plain_and_padded_amounts() {
        assert_eq!(validate_amount("500"), Ok(dec!(500)));
        assert_eq!(validate_amount("  12.75 "), Ok(dec!(12.75)));
        assert_eq!(validate_amount("1e3"), Ok(dec!(1000)));
    }

    #[test]
    fn rejects_non_numeric() {
        assert_eq!(validate_amount("abc"), Err(AmountError::NotNumeric));
        assert_eq!(validate_amount(""), Err(AmountError::NotNumeric));
        assert_eq!(validate_amount("12,50"), Err(AmountError::NotNumeric));
    }

    #[test]
    fn rejects_zero_and_negative() {
        assert_eq!(validate_amount("0"), Err(AmountError::NotPositive));
        assert_eq!(validate_amount("-5"), Err(AmountError::NotPositive));
    }
}
