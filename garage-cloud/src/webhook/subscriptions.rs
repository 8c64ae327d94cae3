//! Subscription lifecycle events
//!
//! - `checkout.session.completed` → subscription active
//! - `customer.subscription.created` / `updated` → status, period and plan sync
//! - `customer.subscription.deleted` → subscription expired

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::billing::SubscriptionStatus;
use shared::util::from_unix_secs;

use super::{EventHandler, HandlerError, StripeEvent, notify};
use crate::email::{Notification, Notifier};
use crate::store::{BillingStore, NewSubscription, SubscriptionChange, Tenant};

fn timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    value.as_i64().and_then(from_unix_secs)
}

/// Billing period of a subscription object
///
/// Newer API versions report it per item rather than on the subscription.
fn period(sub: &serde_json::Value) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let item = &sub["items"]["data"][0];
    let start = timestamp(&sub["current_period_start"])
        .or_else(|| timestamp(&item["current_period_start"]));
    let end =
        timestamp(&sub["current_period_end"]).or_else(|| timestamp(&item["current_period_end"]));
    (start, end)
}

async fn audit(
    billing: &dyn BillingStore,
    tenant_id: &str,
    action: &str,
    detail: serde_json::Value,
) {
    if let Err(e) = billing.record_audit(tenant_id, action, detail).await {
        tracing::warn!(
            tenant_id = %tenant_id,
            action = action,
            error = %e,
            "Failed to write audit log"
        );
    }
}

pub struct CheckoutCompletedHandler {
    billing: Arc<dyn BillingStore>,
    notifier: Arc<dyn Notifier>,
}

impl CheckoutCompletedHandler {
    pub fn new(billing: Arc<dyn BillingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { billing, notifier }
    }

    /// Tenant by `client_reference_id`, falling back to the Stripe customer
    async fn find_tenant(
        &self,
        session: &serde_json::Value,
    ) -> Result<Option<Tenant>, HandlerError> {
        if let Some(tenant_id) = session["client_reference_id"].as_str() {
            if let Some(tenant) = self.billing.find_tenant(tenant_id).await? {
                return Ok(Some(tenant));
            }
        }
        match session["customer"].as_str() {
            Some(customer_id) => Ok(self
                .billing
                .find_tenant_by_stripe_customer(customer_id)
                .await?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl EventHandler for CheckoutCompletedHandler {
    async fn handle(&self, event: &StripeEvent) -> Result<(), HandlerError> {
        let session = event.object();

        if session["mode"].as_str() != Some("subscription") {
            tracing::debug!(event_id = %event.id, "Non-subscription checkout, ignoring");
            return Ok(());
        }

        let Some(subscription_id) = session["subscription"].as_str() else {
            tracing::warn!(
                event_id = %event.id,
                "checkout.session.completed missing subscription"
            );
            return Ok(());
        };

        let Some(tenant) = self.find_tenant(session).await? else {
            tracing::warn!(
                event_id = %event.id,
                customer_id = session["customer"].as_str().unwrap_or_default(),
                "No tenant for completed checkout"
            );
            return Ok(());
        };

        let Some(plan_id) = session["metadata"]["plan_id"].as_str() else {
            tracing::warn!(
                event_id = %event.id,
                tenant_id = %tenant.id,
                "Checkout missing metadata.plan_id"
            );
            return Ok(());
        };
        let Some(plan) = self.billing.find_plan(plan_id).await? else {
            tracing::warn!(
                event_id = %event.id,
                plan_id = plan_id,
                "Checkout for unknown plan"
            );
            return Ok(());
        };

        if let Some(customer_id) = session["customer"].as_str() {
            if tenant.stripe_customer_id.as_deref() != Some(customer_id) {
                self.billing
                    .set_stripe_customer(&tenant.id, customer_id)
                    .await?;
            }
        }

        self.billing
            .upsert_subscription(&NewSubscription {
                tenant_id: &tenant.id,
                plan_id: &plan.id,
                stripe_subscription_id: subscription_id,
                // Status, period and trial already synced for this
                // subscription id are kept by the store
                status: SubscriptionStatus::Active,
                current_period_start: None,
                current_period_end: None,
                trial_end: None,
            })
            .await?;

        tracing::info!(
            tenant_id = %tenant.id,
            subscription_id = subscription_id,
            plan_id = %plan.id,
            "Subscription activated via Stripe checkout"
        );

        let detail = serde_json::json!({
            "subscription_id": subscription_id,
            "plan_id": plan.id,
        });
        audit(self.billing.as_ref(), &tenant.id, "subscription_activated", detail).await;

        notify(
            self.notifier.as_ref(),
            Notification::SubscriptionActivated {
                to: tenant.email,
                plan_name: plan.name,
            },
        )
        .await;
        Ok(())
    }
}

pub struct SubscriptionUpdatedHandler {
    billing: Arc<dyn BillingStore>,
}

impl SubscriptionUpdatedHandler {
    pub fn new(billing: Arc<dyn BillingStore>) -> Self {
        Self { billing }
    }

    /// Record a subscription not seen yet, owned by `metadata.tenant_id`
    async fn insert_from_metadata(
        &self,
        sub: &serde_json::Value,
        sub_id: &str,
        change: &SubscriptionChange,
    ) -> Result<Option<String>, HandlerError> {
        let Some(tenant_id) = sub["metadata"]["tenant_id"].as_str() else {
            return Ok(None);
        };
        if self.billing.find_tenant(tenant_id).await?.is_none() {
            return Ok(None);
        }
        let plan_id = match (&change.plan_id, sub["metadata"]["plan_id"].as_str()) {
            (Some(plan_id), _) => plan_id.clone(),
            (None, Some(plan_id)) => match self.billing.find_plan(plan_id).await? {
                Some(plan) => plan.id,
                None => return Ok(None),
            },
            (None, None) => return Ok(None),
        };

        self.billing
            .upsert_subscription(&NewSubscription {
                tenant_id,
                plan_id: &plan_id,
                stripe_subscription_id: sub_id,
                status: change.status,
                current_period_start: change.current_period_start,
                current_period_end: change.current_period_end,
                trial_end: change.trial_end,
            })
            .await?;
        Ok(Some(tenant_id.to_string()))
    }
}

#[async_trait]
impl EventHandler for SubscriptionUpdatedHandler {
    async fn handle(&self, event: &StripeEvent) -> Result<(), HandlerError> {
        let sub = event.object();

        let Some(sub_id) = sub["id"].as_str() else {
            tracing::warn!(event_id = %event.id, "Subscription event missing id");
            return Ok(());
        };

        let stripe_status = sub["status"].as_str().unwrap_or_default();
        let Some(status) = SubscriptionStatus::from_stripe(stripe_status) else {
            tracing::info!(
                subscription_id = sub_id,
                stripe_status = stripe_status,
                "Unmapped Stripe subscription status, ignoring"
            );
            return Ok(());
        };

        // Plan switches made in the billing portal only change the item price
        let price_id = sub["items"]["data"][0]["price"]["id"].as_str();
        let plan = match price_id {
            Some(price_id) => self.billing.find_plan_by_price(price_id).await?,
            None => None,
        };
        let plan_id = plan.map(|p| p.id);
        if plan_id.is_none() {
            tracing::debug!(
                subscription_id = sub_id,
                price_id = price_id.unwrap_or_default(),
                "No plan for subscription price, keeping current plan"
            );
        }

        let (current_period_start, current_period_end) = period(sub);
        let change = SubscriptionChange {
            status,
            plan_id,
            current_period_start,
            current_period_end,
            trial_end: timestamp(&sub["trial_end"]),
            cancel_at_period_end: sub["cancel_at_period_end"].as_bool().unwrap_or(false),
        };

        let tenant_id = match self.billing.apply_subscription_change(sub_id, &change).await? {
            Some(tenant_id) => Some(tenant_id),
            // `created` usually arrives before the checkout completes
            None => self.insert_from_metadata(sub, sub_id, &change).await?,
        };

        match tenant_id {
            Some(tenant_id) => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    subscription_id = sub_id,
                    status = status.as_db(),
                    "Subscription updated"
                );
                let detail = serde_json::json!({
                    "subscription_id": sub_id,
                    "status": status.as_db(),
                    "cancel_at_period_end": change.cancel_at_period_end,
                });
                audit(self.billing.as_ref(), &tenant_id, "subscription_updated", detail).await;
            }
            None => {
                tracing::warn!(
                    subscription_id = sub_id,
                    "Update for unknown subscription, ignoring"
                );
            }
        }
        Ok(())
    }
}

pub struct SubscriptionDeletedHandler {
    billing: Arc<dyn BillingStore>,
    notifier: Arc<dyn Notifier>,
}

impl SubscriptionDeletedHandler {
    pub fn new(billing: Arc<dyn BillingStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { billing, notifier }
    }
}

#[async_trait]
impl EventHandler for SubscriptionDeletedHandler {
    async fn handle(&self, event: &StripeEvent) -> Result<(), HandlerError> {
        let Some(sub_id) = event.object()["id"].as_str() else {
            tracing::warn!(event_id = %event.id, "Subscription event missing id");
            return Ok(());
        };

        let Some(tenant_id) = self.billing.expire_subscription(sub_id).await? else {
            tracing::warn!(
                subscription_id = sub_id,
                "Deletion of unknown subscription, ignoring"
            );
            return Ok(());
        };
        tracing::info!(
            tenant_id = %tenant_id,
            subscription_id = sub_id,
            "Subscription expired"
        );

        let detail = serde_json::json!({ "subscription_id": sub_id });
        audit(self.billing.as_ref(), &tenant_id, "subscription_canceled", detail).await;

        match self.billing.find_tenant(&tenant_id).await {
            Ok(Some(tenant)) => {
                notify(
                    self.notifier.as_ref(),
                    Notification::SubscriptionCanceled { to: tenant.email },
                )
                .await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Tenant lookup failed, cancellation email skipped"
                );
            }
        }
        Ok(())
    }
}
