//! Application startup and lifecycle management.

use crate::config::SettlementConfig;
use crate::handlers;
use crate::services::{
    get_metrics, ChainWalker, Database, NotificationSink, PixGatewayClient, PriceCascade,
    PricingStore, ReferralGraph, ReferralStore, SettlementEngine, SettlementStore,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: SettlementConfig,
    pub db: Database,
    pub gateway: PixGatewayClient,
    pub graph: ReferralGraph,
    pub referrals: Arc<dyn ReferralStore>,
    pub prices: Arc<dyn PricingStore>,
    pub settlement: Arc<SettlementEngine>,
    pub cascade: Arc<PriceCascade>,
}

/// Health check endpoint for liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "settlement-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "settlement-service",
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: SettlementConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let gateway = PixGatewayClient::new(config.gateway.clone());
        if gateway.is_configured() {
            tracing::info!("Pix gateway client initialized");
        } else {
            tracing::warn!("Pix gateway credentials not configured - QR lookups will be limited");
        }

        let store = Arc::new(db.clone());
        let referrals: Arc<dyn ReferralStore> = store.clone();
        let prices: Arc<dyn PricingStore> = store.clone();
        let settlement_store: Arc<dyn SettlementStore> = store.clone();
        let notifications: Arc<dyn NotificationSink> = store.clone();

        let graph = ReferralGraph::new(referrals.clone());
        let walker = ChainWalker::new(referrals.clone(), prices.clone());
        let settlement = Arc::new(SettlementEngine::new(settlement_store, walker));
        let cascade = Arc::new(PriceCascade::new(
            graph.clone(),
            referrals.clone(),
            prices.clone(),
            notifications,
        ));

        let state = AppState {
            config: config.clone(),
            db,
            gateway,
            graph,
            referrals,
            prices,
            settlement,
            cascade,
        };

        // Port 0 binds a random port for testing.
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid server address: {}", e))
            })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Settlement service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_endpoint))
            .route("/webhooks/gateway", post(handlers::gateway_webhook))
            .route("/payments/:payment_id", get(handlers::payment_lookup))
            .route("/payments/:payment_id/qr", get(handlers::payment_qr))
            .route(
                "/users/:user_id/services/:service_id/price",
                put(handlers::update_resale_price),
            )
            .route("/referrals/:code/downline", get(handlers::downline))
            .route("/referrals/:code/tree", get(handlers::tree))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        axum::serve(self.listener, router).await
    }
}
