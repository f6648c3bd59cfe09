//! Pix payment gateway client.
//!
//! Read-only collaborator: fetches payment details and Pix QR codes for
//! display. Settlement never polls for confirmation; the webhook's declared
//! status is the only trusted signal.

use crate::config::GatewayConfig;
use anyhow::{anyhow, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Client for the Pix payment gateway API.
#[derive(Clone)]
pub struct PixGatewayClient {
    client: Client,
    config: GatewayConfig,
}

/// A payment as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
    /// Gateway payment id.
    pub id: String,
    /// Payment status (e.g. "pending", "confirmed").
    pub status: String,
    /// Declared value.
    pub value: Decimal,
    /// Payer reference for display.
    pub payer: Option<String>,
    /// Comma-separated request ids attached at creation time.
    pub external_reference: Option<String>,
}

/// Pix QR code payload for a pending payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixQrCode {
    pub payment_id: String,
    /// Copy-and-paste Pix code.
    pub qr_code: String,
    /// Rendered QR image, base64-encoded.
    pub qr_code_base64: Option<String>,
}

/// Gateway API error response.
#[derive(Debug, Deserialize)]
struct GatewayApiError {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

impl PixGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if the gateway is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.api_base_url.is_empty() && !self.config.api_key.expose_secret().is_empty()
    }

    /// Fetch a payment by gateway id.
    pub async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment> {
        let body = self.get(&format!("payments/{}", payment_id)).await?;
        let payment: GatewayPayment = serde_json::from_str(&body)?;
        Ok(payment)
    }

    /// Fetch the Pix QR code for a payment.
    pub async fn get_pix_qr(&self, payment_id: &str) -> Result<PixQrCode> {
        let body = self.get(&format!("payments/{}/pix", payment_id)).await?;
        let qr: PixQrCode = serde_json::from_str(&body)?;
        Ok(qr)
    }

    async fn get(&self, path: &str) -> Result<String> {
        if !self.is_configured() {
            return Err(anyhow!("Pix gateway credentials not configured"));
        }

        let url = format!("{}/{}", self.config.api_base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, path = %path, "Pix gateway response");

        if status.is_success() {
            Ok(body)
        } else {
            let error: GatewayApiError =
                serde_json::from_str(&body).unwrap_or_else(|_| GatewayApiError {
                    error: "UNKNOWN".to_string(),
                    message: Some(body.clone()),
                });
            tracing::error!(
                code = %error.error,
                message = ?error.message,
                "Pix gateway request failed"
            );
            Err(anyhow!(
                "Pix gateway error: {} - {}",
                error.error,
                error.message.unwrap_or_default()
            ))
        }
    }
}
