//! Stripe integration via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::billing::{CheckoutRequest, PaymentSessions};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Create a Stripe Checkout Session (subscription mode)
///
/// Tenants without a Stripe customer get one created by Checkout; the
/// `client_reference_id` ties it back to the tenant when the
/// `checkout.session.completed` webhook arrives.
pub async fn create_checkout_session(
    client: &reqwest::Client,
    secret_key: &str,
    req: &CheckoutRequest<'_>,
) -> Result<String, BoxError> {
    let mut form: Vec<(&str, &str)> = vec![
        ("mode", "subscription"),
        ("line_items[0][price]", req.price_id),
        ("line_items[0][quantity]", "1"),
        ("success_url", req.success_url),
        ("cancel_url", req.cancel_url),
        ("allow_promotion_codes", "true"),
        ("client_reference_id", req.tenant.id.as_str()),
        ("metadata[tenant_id]", req.tenant.id.as_str()),
        ("metadata[plan_id]", req.plan.id.as_str()),
        ("subscription_data[metadata][tenant_id]", req.tenant.id.as_str()),
        ("subscription_data[metadata][plan_id]", req.plan.id.as_str()),
    ];
    match req.tenant.stripe_customer_id.as_deref() {
        Some(customer_id) => form.push(("customer", customer_id)),
        None => form.push(("customer_email", req.tenant.email.as_str())),
    }

    let resp: serde_json::Value = client
        .post(format!("{API_BASE}/checkout/sessions"))
        .basic_auth(secret_key, None::<&str>)
        .form(&form)
        .send()
        .await?
        .json()
        .await?;

    resp["url"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe create_checkout failed: {}", error_message(&resp)).into())
}

/// Create a Stripe Billing Portal session
pub async fn create_billing_portal_session(
    client: &reqwest::Client,
    secret_key: &str,
    customer_id: &str,
    return_url: &str,
) -> Result<String, BoxError> {
    let resp: serde_json::Value = client
        .post(format!("{API_BASE}/billing_portal/sessions"))
        .basic_auth(secret_key, None::<&str>)
        .form(&[("customer", customer_id), ("return_url", return_url)])
        .send()
        .await?
        .json()
        .await?;

    resp["url"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("Stripe billing portal failed: {}", error_message(&resp)).into())
}

fn error_message(resp: &serde_json::Value) -> &str {
    resp["error"]["message"].as_str().unwrap_or("no url in response")
}

/// Verify Stripe webhook signature (HMAC-SHA256)
///
/// The header carries `t=<unix seconds>` and one or more `v1=<hex>` entries;
/// any matching `v1` is accepted. Events signed more than `tolerance_secs`
/// away from `now` are rejected.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Constant-time comparison via hmac::verify_slice
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err("Webhook signature mismatch");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now - ts).abs() > tolerance_secs {
        return Err("Webhook timestamp outside tolerance");
    }

    Ok(())
}

/// Compute a `Stripe-Signature` header value for `payload`
pub fn sign_webhook_payload(
    payload: &[u8],
    secret: &str,
    timestamp: i64,
) -> Result<String, &'static str> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let sig = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={sig}"))
}

/// [`PaymentSessions`] backed by the Stripe REST API
#[derive(Clone)]
pub struct StripeSessions {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeSessions {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait]
impl PaymentSessions for StripeSessions {
    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<String, BoxError> {
        create_checkout_session(&self.client, &self.secret_key, req).await
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BoxError> {
        create_billing_portal_session(&self.client, &self.secret_key, customer_id, return_url)
            .await
    }
}
