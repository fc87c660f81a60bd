//! The floating-field Prisme interfaces: G68 payouts and G69 postings.
//!
//! Unlike 10Q, whose records are fixed width, these lines are made of
//! `&`-separated fields that each start with a numeric field id.

use std::fmt::Display;

use chrono::NaiveDate;

use crate::tenq::FieldError;

pub mod g68;
pub mod g69;

pub use g68::{G68Payout, G68TransactionWriter, RecipientType, TransactionType};
pub use g69::{G69Field, G69Transaction, G69TransactionWriter, G69Value, PostType};

/// Separates the fields of a floating-field line.
pub const FIELD_SEPARATOR: char = '&';

/// Formats `value` zero filled to `width` digits.
fn zero_filled<T: Display>(field: &'static str, value: T, width: usize) -> Result<String, FieldError> {
    let digits = value.to_string();
    if digits.chars().count() > width {
        return Err(FieldError::Overflow {
            field,
            value: digits,
            width,
        });
    }
    Ok(format!("{:0>width$}", digits, width = width))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Rejects characters that would break the field framing of a line.
fn check_text(field: &'static str, value: &str, illegal: &[char]) -> Result<(), FieldError> {
    if let Some(c) = value
        .chars()
        .find(|c| illegal.contains(c) || c.is_control())
    {
        return Err(FieldError::Malformed {
            field,
            value: value.to_string(),
            reason: if c.is_control() {
                "contains control characters"
            } else {
                "contains a reserved character"
            },
        });
    }
    Ok(())
}
