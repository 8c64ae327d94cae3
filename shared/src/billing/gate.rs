//! Plan gating decisions
//!
//! [`gate`] is a pure function of a resolution state and a required
//! capability. It never fetches, caches or mutates anything.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entitlement::Entitlement;
use super::plan::{FeatureFlag, ResourceKind};
use crate::error::{AppError, AppResult, ErrorCode};

/// Something a gated action requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Capability {
    /// A plan feature flag
    Feature(FeatureFlag),
    /// Room to create one more item of a resource
    Resource(ResourceKind),
}

impl Capability {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Feature(flag) => flag.display_name(),
            Self::Resource(kind) => kind.display_name(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature(flag) => write!(f, "feature:{flag}"),
            Self::Resource(kind) => write!(f, "resource:{kind}"),
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    /// `feature:<flag>` or `resource:<kind>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("feature", flag)) => flag
                .parse()
                .map(Self::Feature)
                .map_err(|e: super::plan::UnknownFeature| e.to_string()),
            Some(("resource", kind)) => kind.parse().map(Self::Resource),
            _ => Err(format!("invalid capability: {s}")),
        }
    }
}

/// Entitlement resolution as seen by a gate
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Still reading, or the last read failed transiently and is being retried
    Loading,
    Ready(Entitlement),
}

impl Resolution {
    /// Any resolver error maps to `Loading`; errors never grant or deny
    pub fn from_result<E>(result: Result<Entitlement, E>) -> Self {
        match result {
            Ok(entitlement) => Self::Ready(entitlement),
            Err(_) => Self::Loading,
        }
    }
}

/// What a gate renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView<T> {
    /// Neutral placeholder; neither granted nor denied
    Loading,
    Granted {
        content: T,
        /// Resource gates: usage has crossed the warning threshold
        near_limit: bool,
    },
    /// Caller-supplied fallback for a denied capability
    Fallback(T),
    /// Standard upgrade prompt for a denied capability without fallback
    UpgradePrompt { feature: String },
}

/// Tag of a [`GateView`], for transports that carry no content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Loading,
    Granted,
    Fallback,
    Upgrade,
}

impl<T> GateView<T> {
    pub fn state(&self) -> GateState {
        match self {
            Self::Loading => GateState::Loading,
            Self::Granted { .. } => GateState::Granted,
            Self::Fallback(_) => GateState::Fallback,
            Self::UpgradePrompt { .. } => GateState::Upgrade,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Whether `entitlement` holds `required`
pub fn allows(entitlement: &Entitlement, required: Capability) -> bool {
    match required {
        Capability::Feature(flag) => entitlement.has_feature(flag),
        Capability::Resource(kind) => entitlement.can_create(kind),
    }
}

/// Decide what to render for `required`
pub fn gate<T>(
    resolution: &Resolution,
    required: Capability,
    children: T,
    fallback: Option<T>,
) -> GateView<T> {
    let entitlement = match resolution {
        Resolution::Loading => return GateView::Loading,
        Resolution::Ready(entitlement) => entitlement,
    };

    if allows(entitlement, required) {
        let near_limit = match required {
            Capability::Resource(kind) => entitlement.is_near_limit(kind),
            Capability::Feature(_) => false,
        };
        return GateView::Granted {
            content: children,
            near_limit,
        };
    }

    match fallback {
        Some(fallback) => GateView::Fallback(fallback),
        None => GateView::UpgradePrompt {
            feature: required.display_name().to_string(),
        },
    }
}

/// Server-side counterpart of [`gate`] for handlers that perform the action
pub fn require(entitlement: &Entitlement, required: Capability) -> AppResult<()> {
    if allows(entitlement, required) {
        return Ok(());
    }
    if entitlement.is_blocked() {
        return Err(AppError::new(ErrorCode::SubscriptionBlocked));
    }
    match required {
        Capability::Feature(flag) => Err(AppError::feature_not_available(flag.as_str())),
        Capability::Resource(kind) => {
            let limit = entitlement
                .usage(kind)
                .and_then(|u| u.limit)
                .unwrap_or_default();
            Err(AppError::limit_reached(kind.as_str(), limit))
        }
    }
}
