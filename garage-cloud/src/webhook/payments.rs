//! payment_intent.* → service order payment status

use std::sync::Arc;

use async_trait::async_trait;

use super::{EventHandler, HandlerError, StripeEvent, notify};
use crate::email::{Notification, Notifier};
use crate::store::{OrderContact, OrderStore, PaymentStatus};

/// Records one payment outcome on the order named in the intent's
/// `metadata.order_id`, then notifies the customer
pub struct PaymentIntentHandler {
    status: PaymentStatus,
    orders: Arc<dyn OrderStore>,
    notifier: Arc<dyn Notifier>,
}

impl PaymentIntentHandler {
    pub fn new(
        status: PaymentStatus,
        orders: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            status,
            orders,
            notifier,
        }
    }

    fn notification(
        &self,
        intent: &serde_json::Value,
        order: &OrderContact,
    ) -> Option<Notification> {
        let to = order.customer_email.clone()?;
        let order_number = order.order_number.clone();
        match self.status {
            PaymentStatus::Paid => Some(Notification::PaymentConfirmed {
                to,
                order_number,
                amount_cents: intent["amount_received"]
                    .as_i64()
                    .or_else(|| intent["amount"].as_i64())
                    .unwrap_or(order.total_cents),
                currency: intent["currency"]
                    .as_str()
                    .unwrap_or(&order.currency)
                    .to_string(),
            }),
            PaymentStatus::Failed => Some(Notification::PaymentFailed {
                to,
                order_number,
                reason: intent["last_payment_error"]["message"]
                    .as_str()
                    .map(String::from),
            }),
            PaymentStatus::RequiresAction => {
                Some(Notification::PaymentActionRequired { to, order_number })
            }
            PaymentStatus::Canceled => None,
        }
    }
}

#[async_trait]
impl EventHandler for PaymentIntentHandler {
    async fn handle(&self, event: &StripeEvent) -> Result<(), HandlerError> {
        let intent = event.object();
        let intent_id = intent["id"].as_str().unwrap_or_default();

        let Some(order_id) = intent["metadata"]["order_id"]
            .as_str()
            .filter(|s| !s.is_empty())
        else {
            tracing::warn!(
                event_id = %event.id,
                payment_intent = intent_id,
                "Payment intent without metadata.order_id, ignoring"
            );
            return Ok(());
        };

        let Some(order) = self
            .orders
            .set_payment_status(order_id, self.status, intent_id)
            .await?
        else {
            tracing::warn!(
                event_id = %event.id,
                order_id = order_id,
                "Payment intent for unknown order, ignoring"
            );
            return Ok(());
        };

        tracing::info!(
            order_id = order_id,
            tenant_id = %order.tenant_id,
            payment_status = self.status.as_db(),
            "Order payment status updated"
        );

        match self.notification(intent, &order) {
            Some(notification) => notify(self.notifier.as_ref(), notification).await,
            None if order.customer_email.is_none() => {
                tracing::debug!(
                    order_id = order_id,
                    "Order has no customer email, skipping notification"
                );
            }
            None => {}
        }
        Ok(())
    }
}
