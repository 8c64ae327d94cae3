//! Application state for garage-cloud

use std::sync::Arc;

use aws_sdk_sesv2::Client as SesClient;
use sqlx::PgPool;

use crate::billing::{CheckoutBridge, EntitlementResolver, PaymentSessions, UsageCounter};
use crate::config::Config;
use crate::db::PgStore;
use crate::email::{Notifier, SesNotifier};
use crate::store::{BillingStore, OrderStore, UsageStore};
use crate::stripe::StripeSessions;
use crate::webhook::Dispatcher;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// External collaborators behind their seams
#[derive(Clone)]
pub struct Backends {
    pub billing: Arc<dyn BillingStore>,
    pub usage: Arc<dyn UsageStore>,
    pub orders: Arc<dyn OrderStore>,
    pub sessions: Arc<dyn PaymentSessions>,
    pub notifier: Arc<dyn Notifier>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Plans, subscriptions, tenants
    pub billing: Arc<dyn BillingStore>,
    pub resolver: EntitlementResolver,
    pub checkout: CheckoutBridge,
    /// Stripe event handlers
    pub webhooks: Arc<Dispatcher>,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    pub webhook_tolerance_secs: i64,
    /// JWT secret for tenant authentication
    pub jwt_secret: String,
}

impl AppState {
    /// Connect to PostgreSQL, run migrations and wire the production backends
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let ses = if let Some(ref ses_region) = config.ses_region {
            let ses_config = aws_config
                .to_builder()
                .region(aws_config::Region::new(ses_region.clone()))
                .build();
            SesClient::new(&ses_config)
        } else {
            SesClient::new(&aws_config)
        };

        let store = Arc::new(PgStore::new(pool));
        let backends = Backends {
            billing: store.clone(),
            usage: store.clone(),
            orders: store,
            sessions: Arc::new(StripeSessions::new(config.stripe_secret_key.clone())),
            notifier: Arc::new(SesNotifier::new(ses, config.ses_from_email.clone())),
        };
        Ok(Self::with_backends(backends, config))
    }

    pub fn with_backends(backends: Backends, config: &Config) -> Self {
        let Backends {
            billing,
            usage,
            orders,
            sessions,
            notifier,
        } = backends;

        let resolver = EntitlementResolver::new(
            billing.clone(),
            UsageCounter::new(usage),
            config.near_limit_threshold,
        );
        let checkout = CheckoutBridge::new(billing.clone(), sessions, config.console_base_url.clone());
        let webhooks = Arc::new(Dispatcher::standard(billing.clone(), orders, notifier));

        Self {
            billing,
            resolver,
            checkout,
            webhooks,
            stripe_webhook_secret: config.stripe_webhook_secret.clone(),
            webhook_tolerance_secs: config.webhook_tolerance_secs,
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}
