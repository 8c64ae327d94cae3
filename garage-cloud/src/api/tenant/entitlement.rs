//! GET /api/tenant/entitlement

use axum::{Extension, Json, extract::State};
use serde::Serialize;
use shared::billing::Entitlement;

use crate::auth::TenantIdentity;
use crate::error::ServiceResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementResponse {
    #[serde(flatten)]
    pub entitlement: Entitlement,
    pub trial_active: bool,
    pub trial_days_remaining: u32,
}

impl From<Entitlement> for EntitlementResponse {
    fn from(entitlement: Entitlement) -> Self {
        let now = entitlement.computed_at;
        Self {
            trial_active: entitlement.is_trial_active_at(now),
            trial_days_remaining: entitlement.trial_days_remaining_at(now),
            entitlement,
        }
    }
}

/// A failed subscription read surfaces as 503, never as a default plan
pub async fn get_entitlement(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
) -> ServiceResult<Json<EntitlementResponse>> {
    let entitlement = state.resolver.resolve(&identity.tenant_id).await?;
    Ok(Json(entitlement.into()))
}
