//! Public plan catalog

use axum::{Json, extract::State};
use shared::billing::Plan;

use crate::error::ServiceResult;
use crate::state::AppState;

/// GET /api/plans
pub async fn list_plans(State(state): State<AppState>) -> ServiceResult<Json<Vec<Plan>>> {
    let plans = state.billing.list_active_plans().await?;
    Ok(Json(plans))
}
