//! Database access layer

pub mod audit;
pub mod orders;
pub mod plans;
pub mod subscriptions;
pub mod tenants;
pub mod usage;

use async_trait::async_trait;
use shared::billing::{BillingPeriod, Plan, ResourceKind, Subscription};
use shared::util::now_millis;
use sqlx::PgPool;

use crate::store::{
    BillingStore, NewSubscription, OrderContact, OrderStore, PaymentStatus, StoreResult,
    SubscriptionChange, Tenant, UsageStore,
};

/// PostgreSQL-backed implementation of every store seam
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingStore for PgStore {
    async fn list_active_plans(&self) -> StoreResult<Vec<Plan>> {
        plans::list_active(&self.pool).await
    }

    async fn find_plan(&self, plan_id: &str) -> StoreResult<Option<Plan>> {
        plans::find_by_id(&self.pool, plan_id).await
    }

    async fn find_plan_by_price(&self, stripe_price_id: &str) -> StoreResult<Option<Plan>> {
        plans::find_by_stripe_price(&self.pool, stripe_price_id).await
    }

    async fn subscription_with_plan(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Option<(Subscription, Plan)>> {
        subscriptions::find_with_plan(&self.pool, tenant_id).await
    }

    async fn find_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>> {
        Ok(tenants::find_by_id(&self.pool, tenant_id).await?)
    }

    async fn find_tenant_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<Tenant>> {
        Ok(tenants::find_by_stripe_customer(&self.pool, customer_id).await?)
    }

    async fn set_stripe_customer(&self, tenant_id: &str, customer_id: &str) -> StoreResult<()> {
        Ok(tenants::set_stripe_customer(&self.pool, tenant_id, customer_id).await?)
    }

    async fn upsert_subscription(&self, sub: &NewSubscription<'_>) -> StoreResult<()> {
        subscriptions::upsert(&self.pool, sub, now_millis()).await
    }

    async fn apply_subscription_change(
        &self,
        stripe_subscription_id: &str,
        change: &SubscriptionChange,
    ) -> StoreResult<Option<String>> {
        subscriptions::apply_change(&self.pool, stripe_subscription_id, change, now_millis()).await
    }

    async fn expire_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> StoreResult<Option<String>> {
        subscriptions::expire(&self.pool, stripe_subscription_id, now_millis()).await
    }

    async fn record_audit(
        &self,
        tenant_id: &str,
        action: &str,
        detail: serde_json::Value,
    ) -> StoreResult<()> {
        Ok(audit::log(&self.pool, tenant_id, action, Some(&detail), now_millis()).await?)
    }
}

#[async_trait]
impl UsageStore for PgStore {
    async fn count(
        &self,
        tenant_id: &str,
        kind: ResourceKind,
        period: Option<BillingPeriod>,
    ) -> StoreResult<u64> {
        Ok(usage::count(&self.pool, tenant_id, kind, period).await?)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn set_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
        payment_intent_id: &str,
    ) -> StoreResult<Option<OrderContact>> {
        Ok(orders::set_payment_status(
            &self.pool,
            order_id,
            status,
            payment_intent_id,
            now_millis(),
        )
        .await?)
    }
}
