mod common;

use axum::body::Body;
use chrono::{Duration, Utc};
use http::{Request, StatusCode};
use serde_json::json;
use shared::billing::SubscriptionStatus;
use tower::ServiceExt;

use garage_cloud::email::Notification;
use garage_cloud::stripe::sign_webhook_payload;
use common::{Harness, WEBHOOK_SECRET, bearer, json_body, starter_monthly, subscription};

fn event(event_type: &str, object: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_test",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": object }
    }))
    .unwrap()
}

fn signed(payload: Vec<u8>) -> Request<Body> {
    let header = sign_webhook_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
    Request::post("/stripe/webhook")
        .header("stripe-signature", header)
        .body(Body::from(payload))
        .unwrap()
}

fn payment_intent(order_id: &str) -> serde_json::Value {
    json!({
        "id": "pi_1",
        "amount": 12_500,
        "amount_received": 12_500,
        "currency": "usd",
        "metadata": { "order_id": order_id }
    })
}

#[tokio::test]
async fn test_get_is_method_not_allowed() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(Request::get("/stripe/webhook").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await, json!({ "error": "Method not allowed" }));
}

#[tokio::test]
async fn test_missing_signature_header_is_rejected() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(
            Request::post("/stripe/webhook")
                .body(Body::from(event("payment_intent.succeeded", json!({}))))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Missing stripe-signature header" })
    );
}

#[tokio::test]
async fn test_bad_signature_is_rejected_without_side_effects() {
    let h = Harness::new();
    h.store.add_order("o-1", "t-1", Some("driver@example.com"));

    let payload = event("payment_intent.succeeded", payment_intent("o-1"));
    let header = sign_webhook_payload(&payload, "whsec_other", Utc::now().timestamp()).unwrap();
    let response = h
        .router()
        .oneshot(
            Request::post("/stripe/webhook")
                .header("stripe-signature", header)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Webhook signature verification failed" })
    );
    assert!(h.journal().is_empty());
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(signed(b"not json".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": "Invalid webhook payload" }));
}

#[tokio::test]
async fn test_unknown_event_is_acknowledged() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(signed(event("invoice.finalized", json!({ "id": "in_1" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "received": true }));
    assert!(h.journal().is_empty());
}

#[tokio::test]
async fn test_payment_succeeded_updates_once_then_notifies_once() {
    let h = Harness::new();
    h.store.add_order("o-1", "t-1", Some("driver@example.com"));

    let response = h
        .router()
        .oneshot(signed(event("payment_intent.succeeded", payment_intent("o-1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        h.journal(),
        vec!["payment_status:o-1:paid".to_string(), "notify:payment_confirmed".to_string()]
    );
    assert_eq!(
        h.notifier.sent(),
        vec![Notification::PaymentConfirmed {
            to: "driver@example.com".to_string(),
            order_number: "SO-o-1".to_string(),
            amount_cents: 12_500,
            currency: "usd".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_payment_canceled_sends_no_notification() {
    let h = Harness::new();
    h.store.add_order("o-1", "t-1", Some("driver@example.com"));

    let response = h
        .router()
        .oneshot(signed(event("payment_intent.canceled", payment_intent("o-1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.journal(), vec!["payment_status:o-1:canceled".to_string()]);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_payment_without_order_id_is_acknowledged() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(signed(event(
            "payment_intent.payment_failed",
            json!({ "id": "pi_2", "metadata": {} }),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.journal().is_empty());
}

#[tokio::test]
async fn test_payment_failed_marks_order_and_sends_reason() {
    let h = Harness::new();
    h.store.add_order("o-1", "t-1", Some("driver@example.com"));

    let mut intent = payment_intent("o-1");
    intent["last_payment_error"] = json!({ "message": "Your card was declined." });
    let response = h
        .router()
        .oneshot(signed(event("payment_intent.payment_failed", intent)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        h.journal(),
        vec!["payment_status:o-1:failed".to_string(), "notify:payment_failed".to_string()]
    );
    assert_eq!(
        h.notifier.sent(),
        vec![Notification::PaymentFailed {
            to: "driver@example.com".to_string(),
            order_number: "SO-o-1".to_string(),
            reason: Some("Your card was declined.".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_store_failure_returns_500_for_redelivery() {
    let h = Harness::new();
    h.store.add_order("o-1", "t-1", Some("driver@example.com"));
    h.store.fail_orders();

    let response = h
        .router()
        .oneshot(signed(event("payment_intent.succeeded", payment_intent("o-1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.starts_with("Webhook handler failed: ")));
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_handler() {
    let mut h = Harness::new();
    h.notifier.fail = true;
    h.store.add_order("o-1", "t-1", Some("driver@example.com"));

    let response = h
        .router()
        .oneshot(signed(event(
            "payment_intent.requires_action",
            payment_intent("o-1"),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        h.journal(),
        vec![
            "payment_status:o-1:requires_action".to_string(),
            "notify:payment_action_required".to_string()
        ]
    );
}

#[tokio::test]
async fn test_checkout_completed_activates_subscription() {
    let h = Harness::new();
    h.store.add_plan(starter_monthly());
    h.store.add_tenant("t-1", "owner@garage.test", None);

    let session = json!({
        "id": "cs_1",
        "mode": "subscription",
        "client_reference_id": "t-1",
        "customer": "cus_new",
        "subscription": "sub_new",
        "metadata": { "plan_id": "starter_monthly", "tenant_id": "t-1" }
    });
    let response = h
        .router()
        .oneshot(signed(event("checkout.session.completed", session)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sub = h.store.subscription("t-1").unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.plan_id, "starter_monthly");
    assert_eq!(sub.stripe_subscription_id.as_deref(), Some("sub_new"));
    assert_eq!(
        h.store.tenant("t-1").unwrap().stripe_customer_id.as_deref(),
        Some("cus_new")
    );
    assert_eq!(
        h.notifier.sent(),
        vec![Notification::SubscriptionActivated {
            to: "owner@garage.test".to_string(),
            plan_name: "starter".to_string(),
        }]
    );
    assert!(h
        .store
        .audits()
        .contains(&("t-1".to_string(), "subscription_activated".to_string())));
}

#[tokio::test]
async fn test_subscription_updated_maps_stripe_status() {
    let h = Harness::new();
    h.store.add_plan(starter_monthly());
    h.store.add_subscription(subscription(
        "t-1",
        "starter_monthly",
        SubscriptionStatus::Active,
        Some(Utc::now() + Duration::days(10)),
    ));

    let period_end = (Utc::now() + Duration::days(20)).timestamp();
    let sub = json!({
        "id": "sub_t-1",
        "status": "canceled",
        "cancel_at_period_end": true,
        "current_period_end": period_end,
        "items": { "data": [{ "price": { "id": "price_starter_monthly" } }] }
    });
    let response = h
        .router()
        .oneshot(signed(event("customer.subscription.updated", sub)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = h.store.subscription("t-1").unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Cancelled);
    assert!(stored.cancel_at_period_end);
    assert_eq!(stored.current_period_end.map(|t| t.timestamp()), Some(period_end));
}

#[tokio::test]
async fn test_subscription_deleted_expires_and_notifies() {
    let h = Harness::new();
    h.store.add_plan(starter_monthly());
    h.store.add_tenant("t-1", "owner@garage.test", Some("cus_1"));
    h.store.add_subscription(subscription(
        "t-1",
        "starter_monthly",
        SubscriptionStatus::Active,
        Some(Utc::now() + Duration::days(10)),
    ));

    let response = h
        .router()
        .oneshot(signed(event(
            "customer.subscription.deleted",
            json!({ "id": "sub_t-1", "status": "canceled" }),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        h.store.subscription("t-1").unwrap().status,
        SubscriptionStatus::Expired
    );
    assert_eq!(
        h.notifier.sent(),
        vec![Notification::SubscriptionCanceled {
            to: "owner@garage.test".to_string()
        }]
    );
}

#[tokio::test]
async fn test_created_then_checkout_completed_keeps_trial_and_period() {
    let h = Harness::new();
    h.store.add_plan(starter_monthly());
    h.store.add_tenant("t-1", "owner@garage.test", None);

    let now = Utc::now();
    let period_start = now.timestamp();
    let period_end = (now + Duration::days(30)).timestamp();
    let trial_end = (now + Duration::days(20)).timestamp();
    let created = json!({
        "id": "sub_new",
        "status": "trialing",
        "customer": "cus_new",
        "trial_end": trial_end,
        "cancel_at_period_end": false,
        "metadata": { "tenant_id": "t-1", "plan_id": "starter_monthly" },
        "items": { "data": [{
            "price": { "id": "price_starter_monthly" },
            "current_period_start": period_start,
            "current_period_end": period_end
        }] }
    });
    let response = h
        .router()
        .oneshot(signed(event("customer.subscription.created", created)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session = json!({
        "id": "cs_1",
        "mode": "subscription",
        "client_reference_id": "t-1",
        "customer": "cus_new",
        "subscription": "sub_new",
        "metadata": { "plan_id": "starter_monthly", "tenant_id": "t-1" }
    });
    let response = h
        .router()
        .oneshot(signed(event("checkout.session.completed", session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = h.store.subscription("t-1").unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Trial);
    assert_eq!(stored.current_period_start.map(|t| t.timestamp()), Some(period_start));
    assert_eq!(stored.current_period_end.map(|t| t.timestamp()), Some(period_end));
    assert_eq!(stored.trial_end.map(|t| t.timestamp()), Some(trial_end));

    let response = h
        .router()
        .oneshot(
            Request::get("/api/tenant/entitlement")
                .header("authorization", bearer("t-1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "trial");
    assert_eq!(body["trialActive"], true);
    assert_eq!(body["trialDaysRemaining"], 20);
    assert!(!body["currentPeriodEnd"].is_null());
}

#[tokio::test]
async fn test_created_for_unknown_tenant_is_acknowledged() {
    let h = Harness::new();
    h.store.add_plan(starter_monthly());

    let created = json!({
        "id": "sub_orphan",
        "status": "active",
        "metadata": { "tenant_id": "t-missing", "plan_id": "starter_monthly" },
        "items": { "data": [{ "price": { "id": "price_starter_monthly" } }] }
    });
    let response = h
        .router()
        .oneshot(signed(event("customer.subscription.created", created)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.store.subscription("t-missing").is_none());
    assert!(h.journal().is_empty());
}

#[tokio::test]
async fn test_subscription_updated_clears_ended_trial() {
    let h = Harness::new();
    h.store.add_plan(starter_monthly());
    let mut trialing = subscription(
        "t-1",
        "starter_monthly",
        SubscriptionStatus::Trial,
        Some(Utc::now() + Duration::days(10)),
    );
    trialing.trial_end = Some(Utc::now() + Duration::days(3));
    h.store.add_subscription(trialing);

    let sub = json!({
        "id": "sub_t-1",
        "status": "active",
        "trial_end": null,
        "items": { "data": [{ "price": { "id": "price_starter_monthly" } }] }
    });
    let response = h
        .router()
        .oneshot(signed(event("customer.subscription.updated", sub)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = h.store.subscription("t-1").unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Active);
    assert_eq!(stored.trial_end, None);
}
