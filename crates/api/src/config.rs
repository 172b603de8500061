//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::GatewayConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL URL; absent → in-memory store
/// - `GATEWAY_URL` — hosted payment page endpoint
/// - `GATEWAY_MERCHANT_CODE` — merchant code at the processor
/// - `GATEWAY_SECRET` — shared HMAC secret
/// - `GATEWAY_RETURN_URL` — where the customer lands after paying
/// - `GATEWAY_TIMEOUT_MS` — redirect-call deadline (default: `5000`)
/// - `GATEWAY_EXPIRE_MINUTES` — payment URL lifetime (default: `15`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub gateway_url: String,
    pub gateway_merchant_code: String,
    pub gateway_secret: String,
    pub gateway_return_url: String,
    pub gateway_timeout_ms: u64,
    pub gateway_expire_minutes: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            gateway_url: std::env::var("GATEWAY_URL")
                .unwrap_or_else(|_| "https://sandbox.gateway.test/paymentv2/vpcpay.html".to_string()),
            gateway_merchant_code: std::env::var("GATEWAY_MERCHANT_CODE")
                .unwrap_or_else(|_| "DEMO".to_string()),
            gateway_secret: std::env::var("GATEWAY_SECRET")
                .unwrap_or_else(|_| "insecure-dev-secret".to_string()),
            gateway_return_url: std::env::var("GATEWAY_RETURN_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5173/payment-return/".to_string()),
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            gateway_expire_minutes: std::env::var("GATEWAY_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the gateway adapter settings.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            endpoint: self.gateway_url.clone(),
            merchant_code: self.gateway_merchant_code.clone(),
            secret: self.gateway_secret.clone(),
            return_url: self.gateway_return_url.clone(),
            expire_minutes: self.gateway_expire_minutes,
        }
    }

    /// Returns the deadline for gateway redirect calls.
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            gateway_url: "https://sandbox.gateway.test/paymentv2/vpcpay.html".to_string(),
            gateway_merchant_code: "DEMO".to_string(),
            gateway_secret: "insecure-dev-secret".to_string(),
            gateway_return_url: "http://127.0.0.1:5173/payment-return/".to_string(),
            gateway_timeout_ms: 5000,
            gateway_expire_minutes: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.gateway_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_gateway_config_mapping() {
        let config = Config::default();
        let gateway = config.gateway_config();
        assert_eq!(gateway.merchant_code, "DEMO");
        assert_eq!(gateway.expire_minutes, 15);
    }
}
