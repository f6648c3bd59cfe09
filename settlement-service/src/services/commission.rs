//! Referral chain walker and commission calculator.

use crate::models::CommissionAward;
use crate::services::store::{PricingStore, ReferralStore};
use anyhow::anyhow;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Hard bound on chain length. The referral graph has no structural
/// acyclicity guarantee, so the walk must terminate regardless of shape.
pub const MAX_CHAIN_DEPTH: u32 = 10;

/// Per-unit margin times quantity, rounded to 2 decimal places.
fn award_amount(margin: Decimal, quantity: i32) -> Decimal {
    (margin * Decimal::from(quantity)).round_dp(2)
}

/// Walks the upline from a payer and computes per-level commission awards.
///
/// The walk only reads; persistence of the plan belongs to the settlement
/// transaction.
#[derive(Clone)]
pub struct ChainWalker {
    referrals: Arc<dyn ReferralStore>,
    prices: Arc<dyn PricingStore>,
}

impl ChainWalker {
    pub fn new(referrals: Arc<dyn ReferralStore>, prices: Arc<dyn PricingStore>) -> Self {
        Self { referrals, prices }
    }

    /// Compute the commission plan for a paid request.
    ///
    /// Terminates after at most [`MAX_CHAIN_DEPTH`] levels, on a dangling
    /// referrer code, or on a terminal (root) node. Levels without a price
    /// row or without positive margin are skipped without stopping the
    /// walk.
    #[instrument(skip(self), fields(payer_user_id = %payer_user_id, service_id = %service_id))]
    pub async fn plan(
        &self,
        payer_user_id: Uuid,
        service_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CommissionAward>, AppError> {
        if quantity <= 0 {
            return Err(AppError::BadRequest(anyhow!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let payer = match self.referrals.user_by_id(payer_user_id).await? {
            Some(user) => user,
            None => {
                warn!(payer_user_id = %payer_user_id, "payer not found, no commissions");
                return Ok(Vec::new());
            }
        };

        let mut awards = Vec::new();
        let mut current_code = payer.referred_by.clone();
        let mut level: u32 = 1;

        while let Some(code) = current_code {
            if level > MAX_CHAIN_DEPTH {
                debug!(level = level, "chain depth bound reached");
                break;
            }

            let referrer = match self.referrals.user_by_code(&code).await? {
                Some(user) => user,
                None => {
                    // Dangling pointer: the chain ends silently.
                    debug!(referral_code = %code, "referrer code not found, chain ends");
                    break;
                }
            };

            if referrer.is_terminal() {
                debug!(user_id = %referrer.id, "terminal node reached, chain ends");
                break;
            }

            match self.prices.price_for(referrer.id, service_id).await? {
                Some(price) => {
                    if let Some(margin) = price.margin() {
                        if margin > Decimal::ZERO {
                            let amount = award_amount(margin, quantity);
                            debug!(
                                user_id = %referrer.id,
                                level = level,
                                amount = %amount,
                                "commission planned"
                            );
                            awards.push(CommissionAward {
                                earner_user_id: referrer.id,
                                level,
                                amount,
                                description: format!(
                                    "Resale commission: margin {} x {} unit(s)",
                                    margin.round_dp(2),
                                    quantity
                                ),
                            });
                        }
                    }
                }
                None => {
                    // No price configured at this level: skip, keep walking.
                    debug!(user_id = %referrer.id, level = level, "no price row, level skipped");
                }
            }

            current_code = referrer.referred_by.clone();
            level += 1;
        }

        Ok(awards)
    }
}
