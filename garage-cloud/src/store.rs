//! Persistence seams
//!
//! Handlers and the entitlement resolver talk to these traits only.
//! `db::PgStore` implements all of them against PostgreSQL; tests swap in
//! in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::billing::{BillingPeriod, Plan, ResourceKind, Subscription, SubscriptionStatus};
use thiserror::Error;

/// Storage failure
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient: connection lost, pool exhausted, timeout. Retry later.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A row that cannot be mapped onto the domain model
    #[error("invalid record: {0}")]
    Invalid(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Invalid(e.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Tenant account as billing sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub stripe_customer_id: Option<String>,
}

/// Subscription recorded from a checkout or its first lifecycle event
#[derive(Debug, Clone)]
pub struct NewSubscription<'a> {
    pub tenant_id: &'a str,
    pub plan_id: &'a str,
    pub stripe_subscription_id: &'a str,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
}

/// Provider-side changes to an existing subscription
#[derive(Debug, Clone)]
pub struct SubscriptionChange {
    pub status: SubscriptionStatus,
    pub plan_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// Plans, subscriptions and the tenant's billing identity
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn list_active_plans(&self) -> StoreResult<Vec<Plan>>;

    async fn find_plan(&self, plan_id: &str) -> StoreResult<Option<Plan>>;

    async fn find_plan_by_price(&self, stripe_price_id: &str) -> StoreResult<Option<Plan>>;

    /// The tenant's subscription joined with its plan
    async fn subscription_with_plan(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Option<(Subscription, Plan)>>;

    async fn find_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>>;

    async fn find_tenant_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<Tenant>>;

    async fn set_stripe_customer(&self, tenant_id: &str, customer_id: &str) -> StoreResult<()>;

    /// Insert or replace the tenant's subscription. Re-writing the same
    /// Stripe subscription id keeps its stored status, period and trial;
    /// `None` fields never clear them.
    async fn upsert_subscription(&self, sub: &NewSubscription<'_>) -> StoreResult<()>;

    /// Apply a provider update; returns the owning tenant id, `None` if unknown
    async fn apply_subscription_change(
        &self,
        stripe_subscription_id: &str,
        change: &SubscriptionChange,
    ) -> StoreResult<Option<String>>;

    /// Mark expired; returns the owning tenant id, `None` if unknown
    async fn expire_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> StoreResult<Option<String>>;

    async fn record_audit(
        &self,
        tenant_id: &str,
        action: &str,
        detail: serde_json::Value,
    ) -> StoreResult<()>;
}

/// Counts of tenant-owned records
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// `period` bounds period-scoped resources; `None` counts all-time
    async fn count(
        &self,
        tenant_id: &str,
        kind: ResourceKind,
        period: Option<BillingPeriod>,
    ) -> StoreResult<u64>;
}

/// Payment state of a service order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Paid,
    Failed,
    Canceled,
    RequiresAction,
}

impl PaymentStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::RequiresAction => "requires_action",
        }
    }
}

/// What a payment notification needs to know about the order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderContact {
    pub order_id: String,
    pub tenant_id: String,
    pub order_number: String,
    pub customer_email: Option<String>,
    pub total_cents: i64,
    pub currency: String,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Record the payment outcome; `None` if the order does not exist
    async fn set_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
        payment_intent_id: &str,
    ) -> StoreResult<Option<OrderContact>>;
}
