//! Per-user balance accumulators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Balance accumulators for a user. Settlement only ever increases
/// `available_balance`; pending and withdrawn totals belong to payout flows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: Uuid,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub total_withdrawn: Decimal,
    pub updated_utc: DateTime<Utc>,
}
