//! Resale price handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::cascade::CascadeOutcome;
use crate::startup::AppState;

/// Request to change the acting user's resale price for a service.
#[derive(Debug, Deserialize)]
pub struct UpdateResalePriceRequest {
    pub resale_price: Decimal,
}

/// Response after the price update and its cascade.
#[derive(Debug, Serialize)]
pub struct UpdateResalePriceResponse {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub resale_price: Decimal,
    pub downstream: CascadeOutcome,
}

/// Update the acting user's resale price and propagate it as the new cost
/// of their downstream subtree.
///
/// The user's own update always succeeds once validated; cascade failures
/// are logged and never surface here.
pub async fn update_resale_price(
    State(state): State<AppState>,
    Path((user_id, service_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateResalePriceRequest>,
) -> Result<Json<UpdateResalePriceResponse>, AppError> {
    if payload.resale_price <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "resale price must be positive"
        )));
    }
    let resale_price = payload.resale_price.round_dp(2);

    tracing::info!(
        user_id = %user_id,
        service_id = %service_id,
        resale_price = %resale_price,
        "Updating resale price"
    );

    let updated = state
        .prices
        .update_resale_price(user_id, service_id, resale_price)
        .await?;
    if !updated {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "no price configured for user {} and service {}",
            user_id,
            service_id
        )));
    }

    let downstream = match state
        .cascade
        .propagate(user_id, service_id, resale_price)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // The acting user's own update stands regardless.
            tracing::error!(error = %e, "price cascade failed after own update");
            CascadeOutcome::default()
        }
    };

    Ok(Json(UpdateResalePriceResponse {
        user_id,
        service_id,
        resale_price,
        downstream,
    }))
}
