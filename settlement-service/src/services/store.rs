//! Storage and collaborator seams of the settlement engine.
//!
//! The engine never talks to Postgres directly; it is wired against these
//! traits so tests can inject in-memory fakes. `Database` implements all of
//! them.

use crate::models::{NewCommission, NewNotification, ServiceRequest, User, UserServicePrice};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

/// Read access to the referral graph. Traversal is always keyed by referral
/// code, never by id.
#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn user_by_code(&self, referral_code: &str) -> Result<Option<User>, AppError>;

    /// All users whose `referred_by` equals the given code.
    async fn direct_referrals(&self, referral_code: &str) -> Result<Vec<User>, AppError>;
}

/// Per-(user, service) price table access.
#[async_trait]
pub trait PricingStore: Send + Sync {
    async fn price_for(
        &self,
        user_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<UserServicePrice>, AppError>;

    /// Set the user's own resale price, leaving cost untouched. Returns
    /// false when the user has no price row for the service.
    async fn update_resale_price(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        resale_price: Decimal,
    ) -> Result<bool, AppError>;

    /// Overwrite the cost price, retaining the resale price.
    async fn update_cost_price(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        cost_price: Decimal,
    ) -> Result<(), AppError>;

    /// Overwrite the cost price and null out the resale price.
    async fn invalidate_resale(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        cost_price: Decimal,
    ) -> Result<(), AppError>;
}

/// Service request resolution and the transactional settlement write.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn requests_by_gateway_payment(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Vec<ServiceRequest>, AppError>;

    async fn requests_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceRequest>, AppError>;

    /// Atomically mark one unpaid request paid and persist its commission
    /// rows and the matching balance credits. All writes share a single
    /// transaction: a failure leaves the request unpaid and retryable.
    ///
    /// Returns the number of commissions created, or `None` when the
    /// request was already paid (idempotent no-op, guarded by
    /// `paid = false` inside the transaction).
    async fn settle_request(
        &self,
        request_id: Uuid,
        paid_at: DateTime<Utc>,
        commissions: &[NewCommission],
    ) -> Result<Option<u64>, AppError>;
}

/// Atomic credit of a user's available balance.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Credit `amount` to the user's available balance. Seeds a zeroed row
    /// when none exists. The increment is a single atomic operation, never
    /// read-modify-write, so concurrent credits cannot lose an update.
    async fn credit(&self, user_id: Uuid, amount: Decimal) -> Result<(), AppError>;
}

/// Fire-and-forget notification sink. Callers log and swallow failures.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: NewNotification) -> Result<(), AppError>;
}
