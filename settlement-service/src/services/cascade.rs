//! Price cascade invalidator.
//!
//! When a user changes their resale price, that value becomes the cost seen
//! by everyone downstream. The cascade overwrites each descendant's cost
//! price and either keeps their resale (still >= new cost) or nulls it.
//! It never recomputes a descendant's resale automatically.

use crate::models::{NewNotification, NotificationKind};
use crate::services::graph::ReferralGraph;
use crate::services::metrics::CASCADE_UPDATES_TOTAL;
use crate::services::store::{NotificationSink, PricingStore, ReferralStore};
use anyhow::anyhow;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of one cascade run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CascadeOutcome {
    /// Descendants whose resale price was nulled out.
    pub invalidated: u64,
    /// Descendants whose resale price survived the cost update.
    pub retained: u64,
}

pub struct PriceCascade {
    graph: ReferralGraph,
    referrals: Arc<dyn ReferralStore>,
    prices: Arc<dyn PricingStore>,
    notifications: Arc<dyn NotificationSink>,
}

impl PriceCascade {
    pub fn new(
        graph: ReferralGraph,
        referrals: Arc<dyn ReferralStore>,
        prices: Arc<dyn PricingStore>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            graph,
            referrals,
            prices,
            notifications,
        }
    }

    /// Propagate a user's new resale price as the cost of their entire
    /// downstream subtree.
    ///
    /// A failing descendant is logged and skipped; the loop and the
    /// originating price update are never aborted.
    #[instrument(skip(self), fields(acting_user_id = %acting_user_id, service_id = %service_id, new_price = %new_price))]
    pub async fn propagate(
        &self,
        acting_user_id: Uuid,
        service_id: Uuid,
        new_price: Decimal,
    ) -> Result<CascadeOutcome, AppError> {
        let acting = self
            .referrals
            .user_by_id(acting_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("user {} not found", acting_user_id)))?;

        let descendants = self
            .graph
            .transitive_referrals(&acting.referral_code)
            .await?;

        let mut outcome = CascadeOutcome::default();
        for descendant_id in descendants {
            // Cyclic data can rediscover the acting user downstream; their
            // own row was already written by the caller and must stand.
            if descendant_id == acting_user_id {
                continue;
            }
            if let Err(e) = self
                .apply_to_descendant(descendant_id, service_id, new_price, &mut outcome)
                .await
            {
                CASCADE_UPDATES_TOTAL.with_label_values(&["failed"]).inc();
                warn!(
                    descendant_id = %descendant_id,
                    error = %e,
                    "cascade step failed, continuing with remaining descendants"
                );
            }
        }

        info!(
            invalidated = outcome.invalidated,
            retained = outcome.retained,
            "price cascade completed"
        );
        Ok(outcome)
    }

    async fn apply_to_descendant(
        &self,
        user_id: Uuid,
        service_id: Uuid,
        new_cost: Decimal,
        outcome: &mut CascadeOutcome,
    ) -> Result<(), AppError> {
        // Descendants without a price row for this service are untouched.
        let price = match self.prices.price_for(user_id, service_id).await? {
            Some(price) => price,
            None => return Ok(()),
        };

        match price.resale_price {
            Some(resale) if resale < new_cost => {
                self.prices
                    .invalidate_resale(user_id, service_id, new_cost)
                    .await?;
                outcome.invalidated += 1;
                CASCADE_UPDATES_TOTAL
                    .with_label_values(&["invalidated"])
                    .inc();
                self.dispatch(NewNotification {
                    user_id,
                    kind: NotificationKind::PriceInvalidated,
                    title: "Resale price invalidated".to_string(),
                    message: format!(
                        "Your resale price {} fell below the new cost {}. \
                         Configure a new price of at least {}.",
                        resale, new_cost, new_cost
                    ),
                    link: Some("/prices".to_string()),
                    related_id: Some(service_id),
                })
                .await;
            }
            _ => {
                self.prices
                    .update_cost_price(user_id, service_id, new_cost)
                    .await?;
                outcome.retained += 1;
                CASCADE_UPDATES_TOTAL
                    .with_label_values(&["retained"])
                    .inc();
                self.dispatch(NewNotification {
                    user_id,
                    kind: NotificationKind::CostUpdated,
                    title: "Cost price updated".to_string(),
                    message: format!(
                        "Your cost for this service is now {}. Your resale price was kept.",
                        new_cost
                    ),
                    link: Some("/prices".to_string()),
                    related_id: Some(service_id),
                })
                .await;
            }
        }
        Ok(())
    }

    /// Fire-and-forget dispatch: a failed notification never fails the
    /// cascade step that produced it.
    async fn dispatch(&self, notification: NewNotification) {
        if let Err(e) = self.notifications.notify(notification).await {
            warn!(error = %e, "notification dispatch failed");
        }
    }
}
