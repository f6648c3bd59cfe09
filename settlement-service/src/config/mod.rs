use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct SettlementConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub api_base_url: String,
    pub api_key: Secret<String>,
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("SETTLEMENT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SETTLEMENT_SERVICE_PORT")
            .unwrap_or_else(|_| "3006".to_string())
            .parse()?;

        let db_url = env::var("SETTLEMENT_DATABASE_URL")
            .map_err(|_| anyhow!("SETTLEMENT_DATABASE_URL must be set"))?;
        let max_connections = env::var("SETTLEMENT_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "16".to_string())
            .parse()?;
        let min_connections = env::var("SETTLEMENT_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let gateway_base_url = env::var("GATEWAY_API_BASE_URL").unwrap_or_default();
        let gateway_api_key = env::var("GATEWAY_API_KEY").unwrap_or_default();

        let log_level = env::var("SETTLEMENT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let otlp_endpoint = env::var("SETTLEMENT_OTLP_ENDPOINT").ok();

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            gateway: GatewayConfig {
                api_base_url: gateway_base_url,
                api_key: Secret::new(gateway_api_key),
            },
            service_name: "settlement-service".to_string(),
            log_level,
            otlp_endpoint,
        })
    }
}
