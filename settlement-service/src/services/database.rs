//! Database service for settlement-service.

use crate::models::{
    NewCommission, NewNotification, PaymentStatus, ServiceRequest, User, UserServicePrice,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{
    BalanceLedger, NotificationSink, PricingStore, ReferralStore, SettlementStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, referral_code, referred_by, role, approved, created_utc";
const REQUEST_COLUMNS: &str = "id, payer_user_id, service_id, quantity, total_price, paid, \
     payment_status, paid_at, gateway_payment_id, external_reference, created_utc";
const PRICE_COLUMNS: &str = "user_id, service_id, cost_price, resale_price, updated_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "settlement-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Atomic balance credit against any executor (pool or open
    /// transaction). A single upsert statement: the increment can never
    /// lose a concurrent update, and a missing row is seeded with zeroed
    /// pending/withdrawn accumulators.
    async fn credit_balance<'e, E>(
        executor: E,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<(), AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO user_balances (user_id, available_balance, pending_balance, total_withdrawn, updated_utc)
            VALUES ($1, $2, 0, 0, now())
            ON CONFLICT (user_id) DO UPDATE
            SET available_balance = user_balances.available_balance + EXCLUDED.available_balance,
                updated_utc = now()
            "#,
        )
        .bind(user_id)
        .bind(amount.round_dp(2))
        .execute(executor)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to credit balance: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ReferralStore for Database {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn user_by_code(&self, referral_code: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE referral_code = $1",
            USER_COLUMNS
        ))
        .bind(referral_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get user by code: {}", e))
        })?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn direct_referrals(&self, referral_code: &str) -> Result<Vec<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["direct_referrals"])
            .start_timer();

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE referred_by = $1 ORDER BY created_utc",
            USER_COLUMNS
        ))
        .bind(referral_code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list referrals: {}", e))
        })?;

        timer.observe_duration();

        Ok(users)
    }
}

#[async_trait]
impl PricingStore for Database {
    #[instrument(skip(self), fields(user_id = %user_id, service_id = %service_id))]
    async fn price_for(
        &self,
        user_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<UserServicePrice>, AppError> {
        let price = sqlx::query_as::<_, UserServicePrice>(&format!(
            "SELECT {} FROM user_service_prices WHERE user_id = $1 AND service_id = $2",
            PRICE_COLUMNS
        ))
        .bind(user_id)
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get price: {}", e)))?;

        Ok(price)
    }

    #[instrument(skip(self), fields(user_id = %user_id, service_id = %service_id))]
    async fn update_resale_price(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        resale_price: Decimal,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE user_service_prices
            SET resale_price = $3, updated_utc = now()
            WHERE user_id = $1 AND service_id = $2
            "#,
        )
        .bind(user_id)
        .bind(service_id)
        .bind(resale_price.round_dp(2))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update resale price: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id, service_id = %service_id))]
    async fn update_cost_price(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        cost_price: Decimal,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE user_service_prices
            SET cost_price = $3, updated_utc = now()
            WHERE user_id = $1 AND service_id = $2
            "#,
        )
        .bind(user_id)
        .bind(service_id)
        .bind(cost_price.round_dp(2))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update cost price: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, service_id = %service_id))]
    async fn invalidate_resale(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        cost_price: Decimal,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE user_service_prices
            SET cost_price = $3, resale_price = NULL, updated_utc = now()
            WHERE user_id = $1 AND service_id = $2
            "#,
        )
        .bind(user_id)
        .bind(service_id)
        .bind(cost_price.round_dp(2))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to invalidate resale price: {}", e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl SettlementStore for Database {
    #[instrument(skip(self))]
    async fn requests_by_gateway_payment(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Vec<ServiceRequest>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["requests_by_gateway_payment"])
            .start_timer();

        let requests = sqlx::query_as::<_, ServiceRequest>(&format!(
            "SELECT {} FROM service_requests WHERE gateway_payment_id = $1",
            REQUEST_COLUMNS
        ))
        .bind(gateway_payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to resolve requests: {}", e))
        })?;

        timer.observe_duration();

        Ok(requests)
    }

    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    async fn requests_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceRequest>, AppError> {
        let requests = sqlx::query_as::<_, ServiceRequest>(&format!(
            "SELECT {} FROM service_requests WHERE id = ANY($1)",
            REQUEST_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to resolve requests: {}", e))
        })?;

        Ok(requests)
    }

    #[instrument(skip(self, commissions), fields(request_id = %request_id, commission_count = commissions.len()))]
    async fn settle_request(
        &self,
        request_id: Uuid,
        paid_at: DateTime<Utc>,
        commissions: &[NewCommission],
    ) -> Result<Option<u64>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["settle_request"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // The paid = false guard makes redelivery a no-op even under
        // concurrent settlement of the same request.
        let updated = sqlx::query(
            r#"
            UPDATE service_requests
            SET paid = TRUE, payment_status = $2, paid_at = $3
            WHERE id = $1 AND paid = FALSE
            "#,
        )
        .bind(request_id)
        .bind(PaymentStatus::Confirmed.as_str())
        .bind(paid_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark request paid: {}", e))
        })?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        }

        for commission in commissions {
            sqlx::query(
                r#"
                INSERT INTO commissions
                    (id, earner_user_id, service_request_id, payer_user_id, amount, status, level, available_at, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(commission.earner_user_id)
            .bind(commission.service_request_id)
            .bind(commission.payer_user_id)
            .bind(commission.amount)
            .bind(commission.status.as_str())
            .bind(&commission.level)
            .bind(commission.available_at)
            .bind(&commission.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert commission: {}", e))
            })?;

            Self::credit_balance(&mut *tx, commission.earner_user_id, commission.amount).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit settlement: {}", e))
        })?;

        timer.observe_duration();

        info!(
            request_id = %request_id,
            commission_count = commissions.len(),
            "request settled"
        );

        Ok(Some(commissions.len() as u64))
    }
}

#[async_trait]
impl BalanceLedger for Database {
    #[instrument(skip(self), fields(user_id = %user_id, amount = %amount))]
    async fn credit(&self, user_id: Uuid, amount: Decimal) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["credit_balance"])
            .start_timer();

        Self::credit_balance(&self.pool, user_id, amount).await?;

        timer.observe_duration();
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for Database {
    #[instrument(skip(self, notification), fields(user_id = %notification.user_id, kind = %notification.kind))]
    async fn notify(&self, notification: NewNotification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, link, related_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(notification.related_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert notification: {}", e))
        })?;

        Ok(())
    }
}
