//! Usage counting with fail-closed fallback

use std::collections::BTreeMap;
use std::sync::Arc;

use shared::billing::{BillingPeriod, ResourceKind, ResourceLimits, ResourceUsage};

use crate::store::{StoreResult, UsageStore};

#[derive(Clone)]
pub struct UsageCounter {
    store: Arc<dyn UsageStore>,
}

impl UsageCounter {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Count one resource. Period-scoped kinds are bounded to `period`;
    /// cumulative kinds ignore it.
    pub async fn count_resource(
        &self,
        tenant_id: &str,
        kind: ResourceKind,
        period: BillingPeriod,
    ) -> StoreResult<u64> {
        let scope = kind.is_period_scoped().then_some(period);
        self.store.count(tenant_id, kind, scope).await
    }

    /// Usage of every resource against `limits`
    ///
    /// A failed count is reported as at-limit and flagged `estimated`, so
    /// a broken counter never lets a tenant past their maximum.
    pub async fn snapshot(
        &self,
        tenant_id: &str,
        limits: &ResourceLimits,
        period: BillingPeriod,
    ) -> BTreeMap<ResourceKind, ResourceUsage> {
        let mut usage = BTreeMap::new();
        for kind in ResourceKind::ALL {
            let limit = limits.get(kind);
            let entry = match self.count_resource(tenant_id, kind, period).await {
                Ok(current) => ResourceUsage::new(current, limit),
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        resource = %kind,
                        error = %e,
                        "Usage count failed, assuming limit reached"
                    );
                    ResourceUsage::assume_at_limit(limit)
                }
            };
            usage.insert(kind, entry);
        }
        usage
    }
}
