//! Common test utilities for settlement-service tests.
//!
//! `MemoryStore` is an in-memory implementation of the engine's storage
//! seams with optional failure injection, mirroring the semantics of the
//! Postgres store.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use settlement_service::models::{
    Commission, NewCommission, NewNotification, PaymentStatus, ServiceRequest, User,
    UserServicePrice,
};
use settlement_service::services::{
    BalanceLedger, ChainWalker, NotificationSink, PriceCascade, PricingStore, ReferralGraph,
    ReferralStore, SettlementEngine, SettlementStore,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("invalid decimal literal")
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<User>>,
    pub requests: Mutex<HashMap<Uuid, ServiceRequest>>,
    pub prices: Mutex<HashMap<(Uuid, Uuid), UserServicePrice>>,
    pub commissions: Mutex<Vec<Commission>>,
    pub balances: Mutex<HashMap<Uuid, Decimal>>,
    pub notifications: Mutex<Vec<NewNotification>>,
    /// Request ids whose settlement fails before any write.
    pub fail_settlement_for: Mutex<HashSet<Uuid>>,
    /// User ids whose price-table writes fail.
    pub fail_price_writes_for: Mutex<HashSet<Uuid>>,
    /// When set, every notification insert fails.
    pub fail_notifications: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(
        &self,
        name: &str,
        referral_code: &str,
        referred_by: Option<&str>,
        role: &str,
        approved: bool,
    ) -> Uuid {
        let mut users = self.users.lock().unwrap();
        let id = Uuid::new_v4();
        let created_utc = base_time() + Duration::seconds(users.len() as i64);
        users.push(User {
            id,
            name: name.to_string(),
            referral_code: referral_code.to_string(),
            referred_by: referred_by.map(|c| c.to_string()),
            role: role.to_string(),
            approved,
            created_utc,
        });
        id
    }

    pub fn add_admin(&self, referral_code: &str) -> Uuid {
        self.add_user("admin", referral_code, None, "admin", true)
    }

    pub fn add_request(
        &self,
        payer_user_id: Uuid,
        service_id: Uuid,
        quantity: i32,
        total_price: Decimal,
        gateway_payment_id: Option<&str>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.requests.lock().unwrap().insert(
            id,
            ServiceRequest {
                id,
                payer_user_id,
                service_id,
                quantity,
                total_price,
                paid: false,
                payment_status: PaymentStatus::Pending.as_str().to_string(),
                paid_at: None,
                gateway_payment_id: gateway_payment_id.map(|g| g.to_string()),
                external_reference: None,
                created_utc: base_time(),
            },
        );
        id
    }

    pub fn set_price(&self, user_id: Uuid, service_id: Uuid, cost: &str, resale: Option<&str>) {
        self.prices.lock().unwrap().insert(
            (user_id, service_id),
            UserServicePrice {
                user_id,
                service_id,
                cost_price: dec(cost),
                resale_price: resale.map(dec),
                updated_utc: base_time(),
            },
        );
    }

    pub fn mark_paid(&self, request_id: Uuid) {
        let mut requests = self.requests.lock().unwrap();
        let request = requests.get_mut(&request_id).expect("unknown request");
        request.paid = true;
        request.payment_status = PaymentStatus::Confirmed.as_str().to_string();
        request.paid_at = Some(base_time());
    }

    pub fn request(&self, request_id: Uuid) -> ServiceRequest {
        self.requests.lock().unwrap()[&request_id].clone()
    }

    pub fn price(&self, user_id: Uuid, service_id: Uuid) -> Option<UserServicePrice> {
        self.prices.lock().unwrap().get(&(user_id, service_id)).cloned()
    }

    pub fn balance(&self, user_id: Uuid) -> Decimal {
        self.balances
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn commissions_for(&self, user_id: Uuid) -> Vec<Commission> {
        self.commissions
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.earner_user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn commission_count(&self) -> usize {
        self.commissions.lock().unwrap().len()
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<NewNotification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReferralStore for MemoryStore {
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn user_by_code(&self, referral_code: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.referral_code == referral_code)
            .cloned())
    }

    async fn direct_referrals(&self, referral_code: &str) -> Result<Vec<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.referred_by.as_deref() == Some(referral_code))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PricingStore for MemoryStore {
    async fn price_for(
        &self,
        user_id: Uuid,
        service_id: Uuid,
    ) -> Result<Option<UserServicePrice>, AppError> {
        Ok(self.price(user_id, service_id))
    }

    async fn update_resale_price(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        resale_price: Decimal,
    ) -> Result<bool, AppError> {
        self.check_price_writes(user_id)?;
        let mut prices = self.prices.lock().unwrap();
        match prices.get_mut(&(user_id, service_id)) {
            Some(price) => {
                price.resale_price = Some(resale_price.round_dp(2));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_cost_price(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        cost_price: Decimal,
    ) -> Result<(), AppError> {
        self.check_price_writes(user_id)?;
        if let Some(price) = self.prices.lock().unwrap().get_mut(&(user_id, service_id)) {
            price.cost_price = cost_price.round_dp(2);
        }
        Ok(())
    }

    async fn invalidate_resale(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        cost_price: Decimal,
    ) -> Result<(), AppError> {
        self.check_price_writes(user_id)?;
        if let Some(price) = self.prices.lock().unwrap().get_mut(&(user_id, service_id)) {
            price.cost_price = cost_price.round_dp(2);
            price.resale_price = None;
        }
        Ok(())
    }
}

impl MemoryStore {
    fn check_price_writes(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.fail_price_writes_for.lock().unwrap().contains(&user_id) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected price write failure for {}",
                user_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn requests_by_gateway_payment(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Vec<ServiceRequest>, AppError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned()
            .collect())
    }

    async fn requests_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceRequest>, AppError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .values()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn settle_request(
        &self,
        request_id: Uuid,
        paid_at: DateTime<Utc>,
        commissions: &[NewCommission],
    ) -> Result<Option<u64>, AppError> {
        // Injected failures happen before any write, like a rolled-back
        // transaction.
        if self.fail_settlement_for.lock().unwrap().contains(&request_id) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected settlement failure for {}",
                request_id
            )));
        }

        {
            let mut requests = self.requests.lock().unwrap();
            let request = requests
                .get_mut(&request_id)
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("request not found")))?;
            if request.paid {
                return Ok(None);
            }
            request.paid = true;
            request.payment_status = PaymentStatus::Confirmed.as_str().to_string();
            request.paid_at = Some(paid_at);
        }

        let mut rows = self.commissions.lock().unwrap();
        let mut balances = self.balances.lock().unwrap();
        for commission in commissions {
            rows.push(Commission {
                id: Uuid::new_v4(),
                earner_user_id: commission.earner_user_id,
                service_request_id: commission.service_request_id,
                payer_user_id: commission.payer_user_id,
                amount: commission.amount,
                status: commission.status.as_str().to_string(),
                level: commission.level.clone(),
                available_at: commission.available_at,
                description: commission.description.clone(),
                created_utc: paid_at,
            });
            *balances.entry(commission.earner_user_id).or_default() += commission.amount;
        }

        Ok(Some(commissions.len() as u64))
    }
}

#[async_trait]
impl BalanceLedger for MemoryStore {
    async fn credit(&self, user_id: Uuid, amount: Decimal) -> Result<(), AppError> {
        let mut balances = self.balances.lock().unwrap();
        *balances.entry(user_id).or_default() += amount.round_dp(2);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn notify(&self, notification: NewNotification) -> Result<(), AppError> {
        if *self.fail_notifications.lock().unwrap() {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected notification failure"
            )));
        }
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Wire a settlement engine against a shared in-memory store.
pub fn settlement_engine(store: &Arc<MemoryStore>) -> SettlementEngine {
    let walker = ChainWalker::new(store.clone(), store.clone());
    SettlementEngine::new(store.clone(), walker)
}

/// Wire a price cascade against a shared in-memory store.
pub fn price_cascade(store: &Arc<MemoryStore>) -> PriceCascade {
    let graph = ReferralGraph::new(store.clone());
    PriceCascade::new(graph, store.clone(), store.clone(), store.clone())
}

/// Wire a graph accessor against a shared in-memory store.
pub fn referral_graph(store: &Arc<MemoryStore>) -> ReferralGraph {
    ReferralGraph::new(store.clone())
}
