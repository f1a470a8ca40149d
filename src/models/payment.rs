//! Payment model (late fees charged on return)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub const LATE_FEE: &str = "late_fee";

/// Payment model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: i32,
    pub user_id: i32,
    pub rental_id: Option<i32>,
    pub amount: Decimal,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Row to insert into `payments`
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i32,
    pub rental_id: Option<i32>,
    pub amount: Decimal,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}
