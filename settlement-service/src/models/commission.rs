//! Commission records earned along a referral chain.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Commission lifecycle states. Settlement only ever produces `Available`;
/// the remaining states are reached by payout processing elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Available,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted commission row.
///
/// `level` is an opaque ordinal label for display; it is never compared
/// arithmetically.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub earner_user_id: Uuid,
    pub service_request_id: Uuid,
    pub payer_user_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub level: String,
    pub available_at: DateTime<Utc>,
    pub description: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for inserting a commission row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommission {
    pub earner_user_id: Uuid,
    pub service_request_id: Uuid,
    pub payer_user_id: Uuid,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub level: String,
    pub available_at: DateTime<Utc>,
    pub description: String,
}

/// One planned payout computed by the chain walker, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionAward {
    pub earner_user_id: Uuid,
    pub level: u32,
    pub amount: Decimal,
    pub description: String,
}

impl CommissionAward {
    /// Render the chain position as the opaque label stored on the row.
    pub fn level_label(&self) -> String {
        self.level.to_string()
    }
}
