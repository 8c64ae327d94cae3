//! Subscription billing model and plan gating
//!
//! - [`plan`]: plans, feature flags, resource maxima
//! - [`subscription`]: tenant subscription lifecycle and billing periods
//! - [`entitlement`]: derived usage/feature view recomputed on every read
//! - [`gate`]: pure render decision for gated features and resources

pub mod entitlement;
pub mod gate;
pub mod plan;
pub mod subscription;

pub use entitlement::{
    DEFAULT_NEAR_LIMIT_THRESHOLD, Entitlement, EntitlementSource, ResourceUsage, usage_percentage,
};
pub use gate::{Capability, GateState, GateView, Resolution, allows, gate, require};
pub use plan::{
    BillingCycle, FeatureFlag, InvalidLimit, Plan, ResourceKind, ResourceLimits, UnknownFeature,
    parse_feature_set,
};
pub use subscription::{BillingPeriod, Subscription, SubscriptionStatus};
