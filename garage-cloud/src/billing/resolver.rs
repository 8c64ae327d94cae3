//! Entitlement resolution
//!
//! Reads the tenant's subscription and plan, counts usage, and folds both
//! into an [`Entitlement`]. Tenant identity always comes from the
//! authenticated request, never from caller-supplied input.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::billing::{BillingPeriod, Entitlement, ResourceKind, ResourceLimits};

use super::usage::UsageCounter;
use crate::store::{BillingStore, StoreResult};

#[derive(Clone)]
pub struct EntitlementResolver {
    billing: Arc<dyn BillingStore>,
    usage: UsageCounter,
    near_limit_threshold: u8,
}

impl EntitlementResolver {
    pub fn new(
        billing: Arc<dyn BillingStore>,
        usage: UsageCounter,
        near_limit_threshold: u8,
    ) -> Self {
        Self {
            billing,
            usage,
            near_limit_threshold,
        }
    }

    pub async fn resolve(&self, tenant_id: &str) -> StoreResult<Entitlement> {
        self.resolve_at(tenant_id, Utc::now()).await
    }

    /// Resolve as of `now`
    ///
    /// A failed subscription read is returned as an error; callers must not
    /// substitute a default plan for it. Failed usage counts are absorbed
    /// by [`UsageCounter::snapshot`].
    pub async fn resolve_at(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Entitlement> {
        let (subscription, plan) = match self.billing.subscription_with_plan(tenant_id).await? {
            Some(found) => found,
            None => {
                tracing::debug!(tenant_id = %tenant_id, "No subscription, resolving free tier");
                let counts = self.free_tier_counts(tenant_id, now).await;
                return Ok(Entitlement::free_tier(
                    tenant_id,
                    counts,
                    self.near_limit_threshold,
                    now,
                ));
            }
        };

        let period = subscription.billing_period(now);
        let usage = self.usage.snapshot(tenant_id, &plan.limits, period).await;
        Ok(Entitlement::for_subscription(
            &subscription,
            &plan,
            usage,
            self.near_limit_threshold,
            now,
        ))
    }

    /// Free tier allows nothing, so failed counts only cost display accuracy
    async fn free_tier_counts(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> BTreeMap<ResourceKind, u64> {
        let usage = self
            .usage
            .snapshot(
                tenant_id,
                &ResourceLimits::none_allowed(),
                BillingPeriod::calendar_month(now),
            )
            .await;
        usage
            .into_iter()
            .filter(|(_, u)| !u.estimated)
            .map(|(kind, u)| (kind, u.current))
            .collect()
    }
}
