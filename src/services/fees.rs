//! Late fee computation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

/// Whole days between due date and return, floored, never negative
pub fn late_days(due_date: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
    (returned_at - due_date).num_days().max(0)
}

/// Fee owed for `late_days` at `per_day`
pub fn compute_late_fee(late_days: i64, per_day: Decimal) -> AppResult<Decimal> {
    if late_days < 0 || per_day.is_sign_negative() {
        return Err(AppError::Validation(format!(
            "Cannot compute a fee for {} days at {} per day",
            late_days, per_day
        )));
    }

    Decimal::from(late_days)
        .checked_mul(per_day)
        .ok_or_else(|| AppError::Internal("Late fee overflowed".to_string()))
}
