//! GET /api/tenant/capabilities/{capability}
//!
//! Server-side rendition of the plan gate: the console asks whether to show
//! gated content, an upgrade prompt, or a neutral placeholder.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use shared::billing::{Capability, GateState, GateView, Resolution, gate};
use shared::error::{AppError, ErrorCode};

use crate::auth::TenantIdentity;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityResponse {
    pub capability: String,
    pub state: GateState,
    pub near_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_feature: Option<String>,
}

impl CapabilityResponse {
    fn new(capability: Capability, view: &GateView<()>) -> Self {
        let (near_limit, upgrade_feature) = match view {
            GateView::Granted { near_limit, .. } => (*near_limit, None),
            GateView::UpgradePrompt { feature } => (false, Some(feature.clone())),
            GateView::Loading | GateView::Fallback(_) => (false, None),
        };
        Self {
            capability: capability.to_string(),
            state: view.state(),
            near_limit,
            upgrade_feature,
        }
    }
}

pub async fn check_capability(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    Path(raw): Path<String>,
) -> Result<Json<CapabilityResponse>, AppError> {
    let capability: Capability = raw
        .parse()
        .map_err(|e: String| AppError::with_message(ErrorCode::InvalidRequest, e))?;

    let result = state.resolver.resolve(&identity.tenant_id).await;
    if let Err(ref e) = result {
        tracing::warn!(
            tenant_id = %identity.tenant_id,
            error = %e,
            "Entitlement read failed, gate stays loading"
        );
    }
    let resolution = Resolution::from_result(result);

    let view = gate(&resolution, capability, (), None);
    Ok(Json(CapabilityResponse::new(capability, &view)))
}
