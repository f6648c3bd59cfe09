//! Payment settlement orchestrator.
//!
//! Entry point for confirmed-payment events. Resolves the affected service
//! requests, and settles each unpaid one: the chain walker computes the
//! commission plan, then the store applies mark-paid, commission rows and
//! balance credits in one transaction per request.

use crate::models::{CommissionStatus, NewCommission, ServiceRequest};
use crate::services::commission::ChainWalker;
use crate::services::metrics::{COMMISSIONS_TOTAL, SETTLEMENT_REQUESTS_TOTAL};
use crate::services::store::SettlementStore;
use anyhow::anyhow;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// A confirmed-payment event as delivered by the gateway (at-least-once).
///
/// Payer and value are carried for display and logging only; the financial
/// truth is that the event says confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub gateway_payment_id: String,
    pub external_reference: Option<String>,
    pub payer: Option<String>,
    pub value: Option<Decimal>,
}

/// Result of settling one payment event.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SettlementOutcome {
    /// Requests transitioned to paid by this call.
    pub updated_count: u64,
    /// Commission rows created by this call.
    pub commissions_created: u64,
}

/// Parse the external-reference fallback: a comma-separated list of request
/// ids. Malformed entries are ignored.
pub(crate) fn parse_reference_ids(reference: &str) -> Vec<Uuid> {
    reference
        .split(',')
        .filter_map(|part| Uuid::parse_str(part.trim()).ok())
        .collect()
}

pub struct SettlementEngine {
    store: Arc<dyn SettlementStore>,
    walker: ChainWalker,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn SettlementStore>, walker: ChainWalker) -> Self {
        Self { store, walker }
    }

    /// Settle a confirmed-payment event.
    ///
    /// Returns `AppError::NotFound` only when no service request matches by
    /// either correlation strategy. An event whose matches are all already
    /// paid reports success with zero updates: redelivery is a no-op.
    #[instrument(skip(self, event), fields(gateway_payment_id = %event.gateway_payment_id))]
    pub async fn settle(&self, event: &PaymentEvent) -> Result<SettlementOutcome, AppError> {
        let mut candidates = self
            .store
            .requests_by_gateway_payment(&event.gateway_payment_id)
            .await?;

        if candidates.is_empty() {
            if let Some(reference) = event.external_reference.as_deref() {
                let ids = parse_reference_ids(reference);
                if !ids.is_empty() {
                    candidates = self.store.requests_by_ids(&ids).await?;
                }
            }
        }

        if candidates.is_empty() {
            SETTLEMENT_REQUESTS_TOTAL
                .with_label_values(&["not_found"])
                .inc();
            return Err(AppError::NotFound(anyhow!(
                "no service requests match payment {}",
                event.gateway_payment_id
            )));
        }

        let unpaid: Vec<ServiceRequest> =
            candidates.into_iter().filter(|r| !r.paid).collect();
        if unpaid.is_empty() {
            info!("all matched requests already settled");
            SETTLEMENT_REQUESTS_TOTAL
                .with_label_values(&["already_settled"])
                .inc();
            return Ok(SettlementOutcome::default());
        }

        let mut outcome = SettlementOutcome::default();
        for request in &unpaid {
            match self.settle_one(request).await {
                Ok(Some(created)) => {
                    outcome.updated_count += 1;
                    outcome.commissions_created += created;
                    SETTLEMENT_REQUESTS_TOTAL
                        .with_label_values(&["settled"])
                        .inc();
                }
                Ok(None) => {
                    // Concurrent delivery won the paid=false guard.
                    info!(request_id = %request.id, "request settled concurrently, skipping");
                    SETTLEMENT_REQUESTS_TOTAL
                        .with_label_values(&["already_settled"])
                        .inc();
                }
                Err(e) => {
                    // The transaction rolled back: the request stays unpaid
                    // and settles on redelivery. Siblings are unaffected.
                    error!(
                        request_id = %request.id,
                        error = %e,
                        "failed to settle request, left unpaid for retry"
                    );
                    SETTLEMENT_REQUESTS_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                }
            }
        }

        info!(
            updated_count = outcome.updated_count,
            commissions_created = outcome.commissions_created,
            "payment event settled"
        );
        Ok(outcome)
    }

    /// Plan and apply settlement of a single request.
    async fn settle_one(&self, request: &ServiceRequest) -> Result<Option<u64>, AppError> {
        let paid_at = Utc::now();
        let awards = self
            .walker
            .plan(request.payer_user_id, request.service_id, request.quantity)
            .await?;

        let commissions: Vec<NewCommission> = awards
            .iter()
            .map(|award| NewCommission {
                earner_user_id: award.earner_user_id,
                service_request_id: request.id,
                payer_user_id: request.payer_user_id,
                amount: award.amount,
                status: CommissionStatus::Available,
                level: award.level_label(),
                available_at: paid_at,
                description: award.description.clone(),
            })
            .collect();

        let settled = self
            .store
            .settle_request(request.id, paid_at, &commissions)
            .await?;

        if settled.is_some() {
            for commission in &commissions {
                COMMISSIONS_TOTAL
                    .with_label_values(&[commission.level.as_str()])
                    .inc();
            }
        }
        Ok(settled)
    }
}
