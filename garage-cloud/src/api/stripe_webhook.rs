//! Stripe webhook endpoint
//!
//! POST /stripe/webhook: raw body, signature verified before parsing

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use shared::error::ErrorCode;

use crate::state::AppState;
use crate::stripe;
use crate::webhook::{Dispatch, StripeEvent};

fn reply(status: StatusCode, error: &str) -> Response {
    (status, Json(serde_json::json!({ "error": error }))).into_response()
}

fn received() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response()
}

/// Any non-POST request to the webhook path
pub async fn method_not_allowed() -> Response {
    reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Handle incoming Stripe webhook events
///
/// Must receive raw body (not JSON) for HMAC signature verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(sig_header) = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Missing Stripe-Signature header");
        return reply(
            ErrorCode::WebhookSignatureInvalid.http_status(),
            "Missing stripe-signature header",
        );
    };

    if let Err(e) = stripe::verify_webhook_signature(
        &body,
        sig_header,
        &state.stripe_webhook_secret,
        state.webhook_tolerance_secs,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return reply(
            ErrorCode::WebhookSignatureInvalid.http_status(),
            ErrorCode::WebhookSignatureInvalid.message(),
        );
    }

    let event = match StripeEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return reply(
                ErrorCode::WebhookPayloadInvalid.http_status(),
                ErrorCode::WebhookPayloadInvalid.message(),
            );
        }
    };

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "Received Stripe webhook"
    );

    match state.webhooks.dispatch(&event).await {
        Ok(Dispatch::Handled(_)) | Ok(Dispatch::Ignored) => received(),
        Err(e) => {
            tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "Webhook handler failed"
            );
            let code = ErrorCode::WebhookHandlerFailed;
            reply(code.http_status(), &format!("{}: {e}", code.message()))
        }
    }
}
