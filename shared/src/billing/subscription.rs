//! Tenant subscriptions and billing periods

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Subscription lifecycle status
///
/// Transitions are driven by payment-provider webhooks only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(Self::Trial),
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Map a Stripe subscription status onto ours
    ///
    /// `past_due` stays active while the provider retries the invoice
    pub fn from_stripe(s: &str) -> Option<Self> {
        match s {
            "trialing" => Some(Self::Trial),
            "active" | "past_due" => Some(Self::Active),
            "canceled" => Some(Self::Cancelled),
            "unpaid" | "incomplete_expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A tenant's subscription record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub tenant_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stripe_subscription_id: Option<String>,
}

impl Subscription {
    /// Status as it applies to gating at `now`
    ///
    /// A cancelled subscription keeps its plan until the paid period ends;
    /// a trial whose end date has passed is treated as expired even if the
    /// lifecycle event has not arrived yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.status {
            SubscriptionStatus::Cancelled => match self.current_period_end {
                Some(end) if end > now => SubscriptionStatus::Cancelled,
                _ => SubscriptionStatus::Expired,
            },
            SubscriptionStatus::Trial => match self.trial_end {
                Some(end) if end <= now => SubscriptionStatus::Expired,
                _ => SubscriptionStatus::Trial,
            },
            status => status,
        }
    }

    /// Billing period that period-scoped usage is counted in
    pub fn billing_period(&self, now: DateTime<Utc>) -> BillingPeriod {
        match (self.current_period_start, self.current_period_end) {
            (Some(start), Some(end)) if start < end => BillingPeriod { start, end },
            _ => BillingPeriod::calendar_month(now),
        }
    }
}

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BillingPeriod {
    /// The UTC calendar month containing `now`
    pub fn calendar_month(now: DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let end = start.checked_add_months(Months::new(1)).unwrap_or(now);
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}
