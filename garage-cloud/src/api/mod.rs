//! API routes for garage-cloud

pub mod health;
pub mod plans;
pub mod stripe_webhook;
pub mod tenant;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::auth::tenant_auth_middleware;
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Console API (JWT authenticated)
    let tenant = Router::new()
        .route("/api/tenant/entitlement", get(tenant::get_entitlement))
        .route(
            "/api/tenant/capabilities/{capability}",
            get(tenant::check_capability),
        )
        .route("/api/tenant/billing/checkout", post(tenant::create_checkout))
        .route("/api/tenant/billing/portal", post(tenant::billing_portal))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_auth_middleware,
        ));

    // Stripe webhook (signature-verified, raw body)
    let webhook = Router::new().route(
        "/stripe/webhook",
        post(stripe_webhook::handle_webhook).fallback(stripe_webhook::method_not_allowed),
    );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/plans", get(plans::list_plans))
        .merge(webhook)
        .merge(tenant)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
