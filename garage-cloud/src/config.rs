//! Cloud server configuration

use shared::billing::DEFAULT_NEAR_LIMIT_THRESHOLD;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stripe's own default replay window
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Cloud server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// SES sender email address
    pub ses_from_email: String,
    /// SES region override (env: SES_REGION)
    pub ses_region: Option<String>,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Accepted clock skew for webhook signatures, seconds
    pub webhook_tolerance_secs: i64,
    /// JWT secret for tenant authentication
    pub jwt_secret: String,
    /// Web console base URL (checkout and portal return here)
    pub console_base_url: String,
    /// Usage percentage at which a resource counts as near its limit
    pub near_limit_threshold: u8,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            ses_from_email: std::env::var("SES_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@garagecrm.app".into()),
            ses_region: std::env::var("SES_REGION").ok().filter(|s| !s.is_empty()),
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            webhook_tolerance_secs: std::env::var("WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s: &i64| *s > 0)
                .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            console_base_url: std::env::var("CONSOLE_BASE_URL")
                .unwrap_or_else(|_| "https://console.garagecrm.app".into()),
            near_limit_threshold: parse_threshold(std::env::var("NEAR_LIMIT_THRESHOLD").ok())?,
        })
    }
}

/// 1..=100, defaulting when unset
fn parse_threshold(raw: Option<String>) -> Result<u8, BoxError> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_NEAR_LIMIT_THRESHOLD),
        Some(s) => match s.parse::<u8>() {
            Ok(v) if (1..=100).contains(&v) => Ok(v),
            _ => Err(format!("NEAR_LIMIT_THRESHOLD must be 1-100, got {s:?}").into()),
        },
    }
}
