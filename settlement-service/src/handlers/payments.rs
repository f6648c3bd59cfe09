//! Gateway webhook handlers.
//!
//! The confirmed-payment event is delivered at-least-once; settlement is
//! idempotent, so duplicates are acknowledged as successes with zero
//! updates.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::services::gateway::{GatewayPayment, PixQrCode};
use crate::services::settlement::PaymentEvent;
use crate::startup::AppState;

/// Payment event as posted by the Pix gateway.
#[derive(Debug, Deserialize)]
pub struct GatewayWebhookEvent {
    /// Gateway payment id, primary correlation key.
    pub payment_id: String,
    /// Payment status; only "confirmed" triggers settlement.
    pub status: String,
    /// Comma-separated request ids, fallback correlation.
    #[serde(default)]
    pub external_reference: Option<String>,
    /// Payer reference, display only.
    #[serde(default)]
    pub payer: Option<String>,
    /// Declared value, display only.
    #[serde(default)]
    pub value: Option<Decimal>,
}

/// Response after processing a payment event.
#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub updated_count: u64,
    pub commissions_created: u64,
}

/// Handle a payment event from the gateway.
///
/// Non-confirmed statuses are acknowledged and ignored. Returns 404 only
/// when a confirmed event matches no service request by either correlation
/// strategy.
pub async fn gateway_webhook(
    State(state): State<AppState>,
    Json(event): Json<GatewayWebhookEvent>,
) -> Result<(StatusCode, Json<SettlementResponse>), AppError> {
    tracing::info!(
        payment_id = %event.payment_id,
        status = %event.status,
        payer = ?event.payer,
        value = ?event.value,
        "Received gateway payment event"
    );

    if event.status != "confirmed" {
        tracing::debug!(status = %event.status, "Ignoring non-confirmed payment event");
        return Ok((
            StatusCode::OK,
            Json(SettlementResponse {
                updated_count: 0,
                commissions_created: 0,
            }),
        ));
    }

    let outcome = state
        .settlement
        .settle(&PaymentEvent {
            gateway_payment_id: event.payment_id,
            external_reference: event.external_reference,
            payer: event.payer,
            value: event.value,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(SettlementResponse {
            updated_count: outcome.updated_count,
            commissions_created: outcome.commissions_created,
        }),
    ))
}

/// Fetch the gateway's view of a payment, for display.
pub async fn payment_lookup(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<GatewayPayment>, AppError> {
    if !state.gateway.is_configured() {
        return Err(AppError::ServiceUnavailable);
    }

    let payment = state
        .gateway
        .get_payment(&payment_id)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    Ok(Json(payment))
}

/// Fetch the Pix QR code for a pending payment.
pub async fn payment_qr(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PixQrCode>, AppError> {
    if !state.gateway.is_configured() {
        return Err(AppError::ServiceUnavailable);
    }

    let qr = state
        .gateway
        .get_pix_qr(&payment_id)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    Ok(Json(qr))
}
