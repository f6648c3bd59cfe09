//! Service request (purchase) model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Gateway-facing payment status of a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
}

impl PaymentStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchase of a service by a user, created unpaid and settled exactly
/// once when the gateway confirms payment.
///
/// `gateway_payment_id` is the primary payment correlation key;
/// `external_reference` may carry a comma-separated list of request ids and
/// is used as fallback correlation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub payer_user_id: Uuid,
    pub service_id: Uuid,
    pub quantity: i32,
    pub total_price: Decimal,
    pub paid: bool,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_payment_id: Option<String>,
    pub external_reference: Option<String>,
    pub created_utc: DateTime<Utc>,
}
