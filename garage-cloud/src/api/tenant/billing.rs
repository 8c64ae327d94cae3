//! Billing endpoints: Stripe checkout and billing portal

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use shared::billing::BillingCycle;

use crate::auth::TenantIdentity;
use crate::error::ServiceResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}

/// POST /api/tenant/billing/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ServiceResult<Json<RedirectResponse>> {
    let url = state
        .checkout
        .start_checkout(&identity.tenant_id, &req.plan_id, req.billing_cycle)
        .await?;
    Ok(Json(RedirectResponse { url }))
}

/// POST /api/tenant/billing/portal
pub async fn billing_portal(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
) -> ServiceResult<Json<RedirectResponse>> {
    let url = state.checkout.open_portal(&identity.tenant_id).await?;
    Ok(Json(RedirectResponse { url }))
}
