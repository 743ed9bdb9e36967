//! Currency display helpers.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency label printed in front of every amount.
pub const CURRENCY: &str = "INR";

/// `1234567.891` → `1,234,567.89`.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// `1500` → `INR 1,500.00`.
pub fn format_currency(amount: Decimal) -> String {
    format!("{CURRENCY} {}", format_amount(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(999.5)), "999.50");
        assert_eq!(format_amount(dec!(1000)), "1,000.00");
        assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
    }

    #[test]
    fn keeps_sign_and_rounds_half_away() {
        assert_eq!(format_amount(dec!(-2500.005)), "-2,500.01");
        assert_eq!(format_currency(dec!(1500)), "INR 1,500.00");
    }
}
