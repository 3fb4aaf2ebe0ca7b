//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Which service this process runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Authenticating reverse proxy in front of the three backend services
    Gateway,
    /// Signup/signin, mints tokens
    Users,
    /// Customer records, trusts the gateway
    Customers,
    /// Sale records, trusts the gateway
    Sales,
    /// All three domains in one process behind cookie auth
    Server,
}

impl ServiceMode {
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceMode::Gateway => 3000,
            ServiceMode::Users => 3001,
            ServiceMode::Customers => 3002,
            ServiceMode::Sales => 3003,
            ServiceMode::Server => 5000,
        }
    }
}

impl FromStr for ServiceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gateway" => Ok(ServiceMode::Gateway),
            "users" | "user-service" => Ok(ServiceMode::Users),
            "customers" | "customer-service" => Ok(ServiceMode::Customers),
            "sales" | "sales-service" => Ok(ServiceMode::Sales),
            "server" => Ok(ServiceMode::Server),
            other => Err(ConfigError::InvalidValue(format!(
                "Unknown SERVICE_MODE '{}' (expected gateway, users, customers, sales or server)",
                other
            ))),
        }
    }
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMode::Gateway => write!(f, "gateway"),
            ServiceMode::Users => write!(f, "users"),
            ServiceMode::Customers => write!(f, "customers"),
            ServiceMode::Sales => write!(f, "sales"),
            ServiceMode::Server => write!(f, "server"),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: ServiceMode::Server.default_port(),
        }
    }
}

/// Token signing and session cookie configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared HMAC secret; never empty once loaded
    pub jwt_secret: String,
    /// `None` mints tokens without an `exp` claim
    pub token_ttl: Option<Duration>,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
}

// Keep the secret out of logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Backend service locations used by the gateway
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub user_service: Url,
    pub customer_service: Url,
    pub sales_service: Url,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_service: Url::parse("http://user-service:3001").expect("static url"),
            customer_service: Url::parse("http://customer-service:3002").expect("static url"),
            sales_service: Url::parse("http://sales-service:3003").expect("static url"),
            timeout: Duration::from_secs(10),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Empty allows any origin
    pub allowed_origins: Vec<String>,
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: ServiceMode,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    pub cors: CorsConfig,
}

const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const DEFAULT_BCRYPT_COST: u32 = 10;

impl Settings {
    /// Load settings from the process environment (and `.env` if present)
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    ///
    /// A missing or blank `JWT_SECRET` is fatal: every mode either mints or
    /// verifies tokens with it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = match var("SERVICE_MODE") {
            Some(raw) => raw.parse()?,
            None => ServiceMode::Server,
        };

        let server = ServerConfig {
            host: parse_or(var("HOST"), "HOST", ServerConfig::default().host)?,
            port: parse_or(var("PORT"), "PORT", mode.default_port())?,
        };

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;

        let ttl_secs: u64 = parse_or(var("TOKEN_TTL_SECONDS"), "TOKEN_TTL_SECONDS", DEFAULT_TOKEN_TTL_SECS)?;
        let token_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let production = var("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));
        let cookie_secure = match var("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw, "COOKIE_SECURE")?,
            None => production,
        };

        let bcrypt_cost: u32 = parse_or(var("BCRYPT_COST"), "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                bcrypt_cost
            )));
        }

        let auth = AuthConfig {
            jwt_secret,
            token_ttl,
            cookie_name: var("AUTH_COOKIE_NAME").unwrap_or_else(|| "token".to_string()),
            cookie_secure,
            bcrypt_cost,
        };

        let defaults = UpstreamConfig::default();
        let upstream = UpstreamConfig {
            user_service: parse_url(var("USER_SERVICE_URL"), "USER_SERVICE_URL", defaults.user_service)?,
            customer_service: parse_url(
                var("CUSTOMER_SERVICE_URL"),
                "CUSTOMER_SERVICE_URL",
                defaults.customer_service,
            )?,
            sales_service: parse_url(var("SALES_SERVICE_URL"), "SALES_SERVICE_URL", defaults.sales_service)?,
            timeout: Duration::from_secs(parse_or(
                var("UPSTREAM_TIMEOUT_SECONDS"),
                "UPSTREAM_TIMEOUT_SECONDS",
                defaults.timeout.as_secs(),
            )?),
        };

        let cors = CorsConfig {
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(Self {
            mode,
            server,
            auth,
            upstream,
            cors,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has an invalid value '{}'", key, value))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str, key: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!("{} must be a boolean, got '{}'", key, other))),
    }
}

fn parse_url(raw: Option<String>, key: &str, default: Url) -> Result<Url, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let url = Url::parse(&raw)
        .map_err(|e| ConfigError::InvalidValue(format!("{} is not a valid URL: {}", key, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::InvalidValue(format!(
            "{} must use http or https, got '{}'",
            key, scheme
        ))),
    }
}

/// Settings for in-process tests: fixed secret, cheap bcrypt
#[cfg(test)]
pub(crate) fn test_settings(mode: ServiceMode, extra: &[(&str, &str)]) -> Settings {
    let mode = mode.to_string();
    Settings::from_lookup(|key| match key {
        "SERVICE_MODE" => Some(mode.clone()),
        "JWT_SECRET" => Some("test-secret".to_string()),
        "BCRYPT_COST" => Some("4".to_string()),
        _ => extra
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string()),
    })
    .expect("test settings")
}
