//! Per-(user, service) price configuration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What a user pays upstream for a service and what they charge downstream.
///
/// `resale_price = None` means not configured or invalidated by an upstream
/// price change; such a user earns no commission for the service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserServicePrice {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub cost_price: Decimal,
    pub resale_price: Option<Decimal>,
    pub updated_utc: DateTime<Utc>,
}

impl UserServicePrice {
    /// Per-unit margin eligible for commission, if resale is configured.
    pub fn margin(&self) -> Option<Decimal> {
        self.resale_price.map(|resale| resale - self.cost_price)
    }
}
