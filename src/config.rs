//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use crate::payments::types::GatewayKind;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub gateways: GatewaysConfig,
    pub worker: WorkerConfig,
    pub persistence: PersistenceConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Gateway endpoints and credentials
#[derive(Debug, Clone)]
pub struct GatewaysConfig {
    pub enabled: Vec<GatewayKind>,
    pub xendit: XenditConfig,
    pub nicepay: NicepayConfig,
}

#[derive(Debug, Clone)]
pub struct XenditConfig {
    pub api_url: String,
    pub api_key: String,
    pub api_version: String,
    pub timeout_ms: u64,
}

impl Default for XenditConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.xendit.co/v3/payment_requests".to_string(),
            api_key: String::new(),
            api_version: "2024-11-11".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NicepayConfig {
    pub url: String,
    pub callback_url: String,
    pub return_url: String,
    pub timeout_ms: u64,
}

impl Default for NicepayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            callback_url: String::new(),
            return_url: String::new(),
            timeout_ms: 30_000,
        }
    }
}

/// Async job queue settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_capacity: usize,
}

/// Persistence defaults and limits
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub timeout_secs: u64,
    pub default_merchant_code: String,
    pub default_payment_method: String,
    pub audit_actor: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            default_merchant_code: "PPOB".to_string(),
            default_payment_method: "OTHER".to_string(),
            audit_actor: "system".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            gateways: GatewaysConfig::from_env()?,
            worker: WorkerConfig::from_env()?,
            persistence: PersistenceConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.gateways.validate()?;
        self.worker.validate()?;
        self.persistence.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .or_else(|_| env::var("APP_PORT"))
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl GatewaysConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let enabled_raw =
            env::var("ENABLED_GATEWAYS").unwrap_or_else(|_| "xendit,nicepay".to_string());
        let mut enabled = Vec::new();
        for part in enabled_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            let kind = GatewayKind::from_str(value)
                .map_err(|_| ConfigError::InvalidValue(format!("ENABLED_GATEWAYS: {}", value)))?;
            if !enabled.contains(&kind) {
                enabled.push(kind);
            }
        }

        let xendit_defaults = XenditConfig::default();
        let xendit = XenditConfig {
            api_url: env::var("XENDIT_API_URL").unwrap_or(xendit_defaults.api_url),
            api_key: env::var("XENDIT_API_KEY").unwrap_or_default(),
            api_version: env::var("XENDIT_API_VERSION").unwrap_or(xendit_defaults.api_version),
            timeout_ms: env::var("XENDIT_TIMEOUT")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("XENDIT_TIMEOUT".to_string()))?,
        };

        let nicepay = NicepayConfig {
            url: env::var("NICEPAY_URL").unwrap_or_default(),
            callback_url: env::var("CALLBACK_URL_NICEPAY").unwrap_or_default(),
            return_url: env::var("RETURN_URL_NICEPAY").unwrap_or_default(),
            timeout_ms: env::var("NICEPAY_TIMEOUT")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NICEPAY_TIMEOUT".to_string()))?,
        };

        Ok(GatewaysConfig {
            enabled,
            xendit,
            nicepay,
        })
    }

    pub fn is_enabled(&self, kind: GatewayKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "ENABLED_GATEWAYS must name at least one gateway".to_string(),
            ));
        }

        if self.is_enabled(GatewayKind::Xendit) {
            if self.xendit.api_key.is_empty() {
                return Err(ConfigError::MissingVariable("XENDIT_API_KEY".to_string()));
            }
            validate_url("XENDIT_API_URL", &self.xendit.api_url)?;
            if self.xendit.timeout_ms == 0 {
                return Err(ConfigError::InvalidValue("XENDIT_TIMEOUT".to_string()));
            }
        }

        if self.is_enabled(GatewayKind::Nicepay) {
            validate_url("NICEPAY_URL", &self.nicepay.url)?;
            if self.nicepay.timeout_ms == 0 {
                return Err(ConfigError::InvalidValue("NICEPAY_TIMEOUT".to_string()));
            }
        }

        Ok(())
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(WorkerConfig {
            queue_capacity: env::var("JOB_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JOB_QUEUE_CAPACITY".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // tokio's bounded channel panics on zero capacity
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "JOB_QUEUE_CAPACITY must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl PersistenceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = PersistenceConfig::default();
        Ok(PersistenceConfig {
            timeout_secs: env::var("PERSISTENCE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PERSISTENCE_TIMEOUT_SECS".to_string()))?,
            default_merchant_code: env::var("DEFAULT_MERCHANT_CODE")
                .unwrap_or(defaults.default_merchant_code),
            default_payment_method: env::var("DEFAULT_PAYMENT_METHOD")
                .unwrap_or(defaults.default_payment_method),
            audit_actor: env::var("AUDIT_ACTOR").unwrap_or(defaults.audit_actor),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PERSISTENCE_TIMEOUT_SECS".to_string(),
            ));
        }

        if self.default_merchant_code.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_MERCHANT_CODE cannot be empty".to_string(),
            ));
        }

        if self.default_payment_method.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_PAYMENT_METHOD cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_url(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingVariable(name.to_string()));
    }

    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be a valid URL",
            name
        )));
    }

    Ok(())
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateways(enabled: Vec<GatewayKind>) -> GatewaysConfig {
        GatewaysConfig {
            enabled,
            xendit: XenditConfig {
                api_key: "xnd_development_key".to_string(),
                ..Default::default()
            },
            nicepay: NicepayConfig {
                url: "https://dev.nicepay.co.id/link".to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        };

        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gateway_validation_requires_xendit_key_only_when_enabled() {
        let mut config = gateways(vec![GatewayKind::Xendit, GatewayKind::Nicepay]);
        assert!(config.validate().is_ok());

        config.xendit.api_key.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingVariable(name)) if name == "XENDIT_API_KEY"
        ));

        config.enabled = vec![GatewayKind::Nicepay];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gateway_validation_rejects_empty_set_and_bad_urls() {
        assert!(gateways(vec![]).validate().is_err());

        let mut config = gateways(vec![GatewayKind::Nicepay]);
        config.nicepay.url = "ftp://nicepay".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        assert!(WorkerConfig { queue_capacity: 0 }.validate().is_err());
        assert!(WorkerConfig { queue_capacity: 100 }.validate().is_ok());
    }

    #[test]
    fn test_persistence_defaults() {
        let config = PersistenceConfig::default();
        assert_eq!(config.default_merchant_code, "PPOB");
        assert_eq!(config.default_payment_method, "OTHER");
        assert_eq!(config.audit_actor, "system");
        assert!(config.validate().is_ok());
    }
}
