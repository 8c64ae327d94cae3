//! Derived entitlements: per-resource usage and per-feature booleans
//!
//! An [`Entitlement`] is recomputed from the subscription, its plan and the
//! current usage counts on every read. Nothing here is cached.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::{FeatureFlag, Plan, ResourceKind, ResourceLimits};
use super::subscription::{Subscription, SubscriptionStatus};

/// Default percentage at which a resource counts as near its limit
pub const DEFAULT_NEAR_LIMIT_THRESHOLD: u8 = 80;

const SECONDS_PER_DAY: i64 = 86_400;

/// `limit == None ? 0 : min(100, round(current / limit * 100))`
///
/// A zero limit reports 100: nothing more may be created.
pub fn usage_percentage(current: u64, limit: Option<u64>) -> u8 {
    match limit {
        None => 0,
        Some(0) => 100,
        Some(limit) => {
            let capped = current.min(limit) as u128;
            let limit = limit as u128;
            // round half up
            ((capped * 200 + limit) / (limit * 2)) as u8
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Usage of one resource against its plan maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub current: u64,
    /// `None` means unlimited
    pub limit: Option<u64>,
    pub percentage: u8,
    /// Set when the count could not be read and `current` is a fail-closed stand-in
    #[serde(skip_serializing_if = "is_false", default)]
    pub estimated: bool,
}

impl ResourceUsage {
    pub fn new(current: u64, limit: Option<u64>) -> Self {
        Self {
            current,
            limit,
            percentage: usage_percentage(current, limit),
            estimated: false,
        }
    }

    /// Stand-in for a failed count: the resource is treated as full
    pub fn assume_at_limit(limit: Option<u64>) -> Self {
        let current = limit.unwrap_or(0);
        Self {
            current,
            limit,
            percentage: usage_percentage(current, limit),
            estimated: true,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit.is_none()
    }

    /// Unlimited resources are never near their limit
    pub fn is_near_limit(&self, threshold: u8) -> bool {
        !self.is_unlimited() && self.percentage >= threshold
    }

    /// Whether one more item fits under the limit
    ///
    /// An estimated count on a limited resource never has capacity.
    pub fn has_capacity(&self) -> bool {
        match self.limit {
            None => true,
            Some(_) if self.estimated => false,
            Some(limit) => self.current < limit,
        }
    }
}

/// What the entitlement was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementSource {
    Subscription,
    /// No subscription found for the tenant
    FreeTier,
}

/// Everything a tenant may do right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub tenant_id: String,
    pub source: EntitlementSource,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub plan_name: Option<String>,
    /// Effective status at `computed_at` (see [`Subscription::effective_status`])
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<SubscriptionStatus>,
    pub resources: BTreeMap<ResourceKind, ResourceUsage>,
    pub features: BTreeMap<FeatureFlag, bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trial_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub near_limit_threshold: u8,
    pub computed_at: DateTime<Utc>,
}

impl Entitlement {
    /// Entitlement granted by `subscription` on `plan`
    ///
    /// `usage` must hold an entry for every [`ResourceKind`]; missing entries
    /// are filled in as "at limit".
    pub fn for_subscription(
        subscription: &Subscription,
        plan: &Plan,
        usage: BTreeMap<ResourceKind, ResourceUsage>,
        near_limit_threshold: u8,
        now: DateTime<Utc>,
    ) -> Self {
        let status = subscription.effective_status(now);
        let blocked = status == SubscriptionStatus::Expired;
        let features = FeatureFlag::ALL
            .into_iter()
            .map(|flag| (flag, !blocked && plan.has_feature(flag)))
            .collect();

        Self {
            tenant_id: subscription.tenant_id.clone(),
            source: EntitlementSource::Subscription,
            plan_id: Some(plan.id.clone()),
            plan_name: Some(plan.name.clone()),
            status: Some(status),
            resources: complete_usage(usage, &plan.limits),
            features,
            trial_end: subscription.trial_end,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
            near_limit_threshold,
            computed_at: now,
        }
    }

    /// Maximally restrictive entitlement for a tenant without a subscription
    pub fn free_tier(
        tenant_id: impl Into<String>,
        counts: BTreeMap<ResourceKind, u64>,
        near_limit_threshold: u8,
        now: DateTime<Utc>,
    ) -> Self {
        let limits = ResourceLimits::none_allowed();
        let usage = ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let current = counts.get(&kind).copied().unwrap_or(0);
                (kind, ResourceUsage::new(current, limits.get(kind)))
            })
            .collect();

        Self {
            tenant_id: tenant_id.into(),
            source: EntitlementSource::FreeTier,
            plan_id: None,
            plan_name: None,
            status: None,
            resources: usage,
            features: FeatureFlag::ALL.into_iter().map(|f| (f, false)).collect(),
            trial_end: None,
            current_period_end: None,
            cancel_at_period_end: false,
            near_limit_threshold,
            computed_at: now,
        }
    }

    /// Expired subscriptions may read existing data but start nothing new
    pub fn is_blocked(&self) -> bool {
        self.status == Some(SubscriptionStatus::Expired)
    }

    pub fn has_feature(&self, flag: FeatureFlag) -> bool {
        self.features.get(&flag).copied().unwrap_or(false)
    }

    pub fn usage(&self, kind: ResourceKind) -> Option<&ResourceUsage> {
        self.resources.get(&kind)
    }

    pub fn is_near_limit(&self, kind: ResourceKind) -> bool {
        self.usage(kind)
            .is_some_and(|u| u.is_near_limit(self.near_limit_threshold))
    }

    /// Whether a new `kind` item may be created
    pub fn can_create(&self, kind: ResourceKind) -> bool {
        !self.is_blocked() && self.usage(kind).is_some_and(ResourceUsage::has_capacity)
    }

    pub fn is_trial_active(&self) -> bool {
        self.is_trial_active_at(Utc::now())
    }

    pub fn is_trial_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == Some(SubscriptionStatus::Trial) && self.trial_end.is_some_and(|end| end > now)
    }

    /// Whole days left in the trial, rounded up; 0 when not trialing
    pub fn trial_days_remaining(&self) -> u32 {
        self.trial_days_remaining_at(Utc::now())
    }

    pub fn trial_days_remaining_at(&self, now: DateTime<Utc>) -> u32 {
        if !self.is_trial_active_at(now) {
            return 0;
        }
        let Some(end) = self.trial_end else {
            return 0;
        };
        let secs = (end - now).num_seconds().max(0);
        ((secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY) as u32
    }
}

fn complete_usage(
    mut usage: BTreeMap<ResourceKind, ResourceUsage>,
    limits: &ResourceLimits,
) -> BTreeMap<ResourceKind, ResourceUsage> {
    for kind in ResourceKind::ALL {
        usage
            .entry(kind)
            .or_insert_with(|| ResourceUsage::assume_at_limit(limits.get(kind)));
    }
    usage
}
