//! Subscription plans: billing cycle, resource maxima, feature flags

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Billing cycle of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// Known feature flags a plan can grant
///
/// Closed set: unknown strings are rejected when plans are read,
/// never carried through as opaque flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    AdvancedReports,
    Inventory,
    FinancialTracking,
    ImageLibrary,
    EmailNotifications,
    OnlinePayments,
    MultiUser,
    ApiAccess,
    PrioritySupport,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 9] = [
        Self::AdvancedReports,
        Self::Inventory,
        Self::FinancialTracking,
        Self::ImageLibrary,
        Self::EmailNotifications,
        Self::OnlinePayments,
        Self::MultiUser,
        Self::ApiAccess,
        Self::PrioritySupport,
    ];

    /// Wire / database name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdvancedReports => "advanced_reports",
            Self::Inventory => "inventory",
            Self::FinancialTracking => "financial_tracking",
            Self::ImageLibrary => "image_library",
            Self::EmailNotifications => "email_notifications",
            Self::OnlinePayments => "online_payments",
            Self::MultiUser => "multi_user",
            Self::ApiAccess => "api_access",
            Self::PrioritySupport => "priority_support",
        }
    }

    /// Name shown in upgrade prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AdvancedReports => "Advanced reports",
            Self::Inventory => "Inventory",
            Self::FinancialTracking => "Financial tracking",
            Self::ImageLibrary => "Image library",
            Self::EmailNotifications => "Email notifications",
            Self::OnlinePayments => "Online payments",
            Self::MultiUser => "Multiple users",
            Self::ApiAccess => "API access",
            Self::PrioritySupport => "Priority support",
        }
    }
}

impl fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature string that is not part of [`FeatureFlag`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feature flag: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for FeatureFlag {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

/// Parse a raw feature list (e.g. a Postgres `text[]` column), rejecting unknown flags
pub fn parse_feature_set<I, S>(raw: I) -> Result<BTreeSet<FeatureFlag>, UnknownFeature>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|s| s.as_ref().parse()).collect()
}

/// Tracked resources with plan maxima
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Active clients, counted all-time
    Clients,
    /// Appointments created in the current billing period
    Appointments,
    /// Reports generated in the current billing period
    Reports,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Clients, Self::Appointments, Self::Reports];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Appointments => "appointments",
            Self::Reports => "reports",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Clients => "Clients",
            Self::Appointments => "Monthly appointments",
            Self::Reports => "Monthly reports",
        }
    }

    /// Activity-like resources reset every billing period; seat-like ones persist
    pub fn is_period_scoped(&self) -> bool {
        matches!(self, Self::Appointments | Self::Reports)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown resource: {s}"))
    }
}

/// A plan column held a non-positive maximum
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid maximum for {resource}: {value}")]
pub struct InvalidLimit {
    pub resource: ResourceKind,
    pub value: i64,
}

/// Per-resource maxima; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    pub max_clients: Option<u64>,
    pub max_appointments_per_month: Option<u64>,
    pub max_reports_per_month: Option<u64>,
}

impl ResourceLimits {
    /// Build from nullable plan columns. Stored maxima must be positive.
    pub fn from_columns(
        clients: Option<i64>,
        appointments: Option<i64>,
        reports: Option<i64>,
    ) -> Result<Self, InvalidLimit> {
        fn positive(resource: ResourceKind, value: Option<i64>) -> Result<Option<u64>, InvalidLimit> {
            match value {
                None => Ok(None),
                Some(v) if v > 0 => Ok(Some(v as u64)),
                Some(v) => Err(InvalidLimit { resource, value: v }),
            }
        }

        Ok(Self {
            max_clients: positive(ResourceKind::Clients, clients)?,
            max_appointments_per_month: positive(ResourceKind::Appointments, appointments)?,
            max_reports_per_month: positive(ResourceKind::Reports, reports)?,
        })
    }

    /// Free tier: nothing may be created
    pub fn none_allowed() -> Self {
        Self {
            max_clients: Some(0),
            max_appointments_per_month: Some(0),
            max_reports_per_month: Some(0),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<u64> {
        match kind {
            ResourceKind::Clients => self.max_clients,
            ResourceKind::Appointments => self.max_appointments_per_month,
            ResourceKind::Reports => self.max_reports_per_month,
        }
    }
}

/// A subscription plan as offered to tenants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub billing_cycle: BillingCycle,
    /// Price in minor currency units
    pub price_cents: i64,
    pub currency: String,
    pub limits: ResourceLimits,
    pub features: BTreeSet<FeatureFlag>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stripe_price_id: Option<String>,
}

impl Plan {
    pub fn has_feature(&self, flag: FeatureFlag) -> bool {
        self.features.contains(&flag)
    }
}
