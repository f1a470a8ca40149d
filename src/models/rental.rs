//! Rental (borrow) model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Rental status. Only `Active` and `Returned` are ever stored; `Overdue`
/// is derived when reading an active rental past its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Active,
    Returned,
    Overdue,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::Returned => "returned",
            RentalStatus::Overdue => "overdue",
        }
    }
}

impl std::str::FromStr for RentalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RentalStatus::Active),
            "returned" => Ok(RentalStatus::Returned),
            "overdue" => Ok(RentalStatus::Overdue),
            _ => Err(format!("Invalid rental status: {}", s)),
        }
    }
}

text_column!(RentalStatus);

/// Rental model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Rental {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub rental_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: RentalStatus,
    /// Borrower display name at rental time
    pub user_name: String,
    /// Book title at rental time
    pub book_title: String,
}

impl Rental {
    pub fn is_active(&self) -> bool {
        self.status == RentalStatus::Active
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.return_date.is_none() && now > self.due_date
    }

    /// Apply the read-time overdue classification
    pub fn classify(mut self, now: DateTime<Utc>) -> Self {
        if self.is_overdue_at(now) {
            self.status = RentalStatus::Overdue;
        }
        self
    }
}

/// Row to insert into `rentals`
#[derive(Debug, Clone)]
pub struct NewRental {
    pub user_id: i32,
    pub book_id: i32,
    pub rental_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub user_name: String,
    pub book_title: String,
}

/// How an extension moves the due date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendBy {
    NewDueDate(DateTime<Utc>),
    AdditionalDays(i32),
}

/// Outcome of a return: the committed rental plus the best-effort fee
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RentalReturn {
    pub rental: Rental,
    pub late_days: i64,
    /// Late fee, absent when it could not be computed
    pub fee: Option<Decimal>,
}

/// Create rental request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRental {
    pub book_id: i32,
    /// Borrower (honored for staff only)
    pub user_id: Option<i32>,
    /// Due date (defaults to the configured loan duration)
    pub due_date: Option<DateTime<Utc>>,
}

/// Extend rental request; exactly one field must be set
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtendRental {
    pub new_due_date: Option<DateTime<Utc>>,
    pub additional_days: Option<i32>,
}

impl ExtendRental {
    pub fn extend_by(&self) -> AppResult<ExtendBy> {
        match (self.new_due_date, self.additional_days) {
            (Some(date), None) => Ok(ExtendBy::NewDueDate(date)),
            (None, Some(days)) => Ok(ExtendBy::AdditionalDays(days)),
            _ => Err(AppError::Validation(
                "Exactly one of new_due_date or additional_days is required".to_string(),
            )),
        }
    }
}
