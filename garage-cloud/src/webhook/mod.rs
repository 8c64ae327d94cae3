//! Stripe webhook event routing
//!
//! Events are parsed into [`StripeEvent`], classified into a closed
//! [`EventKind`] set and handed to the handler registered for that kind.
//! Event types outside the set are acknowledged without side effects.

mod payments;
mod subscriptions;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::email::{Notification, Notifier};
use crate::store::{BillingStore, OrderStore, PaymentStatus, StoreError};

pub use payments::PaymentIntentHandler;
pub use subscriptions::{
    CheckoutCompletedHandler, SubscriptionDeletedHandler, SubscriptionUpdatedHandler,
};

/// Event types this service acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    PaymentIntentCanceled,
    PaymentIntentRequiresAction,
    CheckoutSessionCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        Self::PaymentIntentSucceeded,
        Self::PaymentIntentFailed,
        Self::PaymentIntentCanceled,
        Self::PaymentIntentRequiresAction,
        Self::CheckoutSessionCompleted,
        Self::SubscriptionCreated,
        Self::SubscriptionUpdated,
        Self::SubscriptionDeleted,
    ];

    pub fn as_event_type(&self) -> &'static str {
        match self {
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::PaymentIntentFailed => "payment_intent.payment_failed",
            Self::PaymentIntentCanceled => "payment_intent.canceled",
            Self::PaymentIntentRequiresAction => "payment_intent.requires_action",
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::SubscriptionCreated => "customer.subscription.created",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
        }
    }

    pub fn from_event_type(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_event_type() == s)
    }
}

/// A Stripe event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    #[serde(default)]
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_event_type(&self.event_type)
    }

    /// `data.object`
    pub fn object(&self) -> &serde_json::Value {
        &self.data.object
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &StripeEvent) -> Result<(), HandlerError>;
}

/// Outcome of a successful dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled(EventKind),
    /// Unknown or unregistered event type, acknowledged as-is
    Ignored,
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Handlers for every [`EventKind`]
    pub fn standard(
        billing: Arc<dyn BillingStore>,
        orders: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let sync: Arc<dyn EventHandler> =
            Arc::new(SubscriptionUpdatedHandler::new(billing.clone()));
        let payment = |status| {
            Arc::new(PaymentIntentHandler::new(
                status,
                orders.clone(),
                notifier.clone(),
            )) as Arc<dyn EventHandler>
        };

        Self::new()
            .register(EventKind::PaymentIntentSucceeded, payment(PaymentStatus::Paid))
            .register(EventKind::PaymentIntentFailed, payment(PaymentStatus::Failed))
            .register(EventKind::PaymentIntentCanceled, payment(PaymentStatus::Canceled))
            .register(
                EventKind::PaymentIntentRequiresAction,
                payment(PaymentStatus::RequiresAction),
            )
            .register(
                EventKind::CheckoutSessionCompleted,
                Arc::new(CheckoutCompletedHandler::new(
                    billing.clone(),
                    notifier.clone(),
                )),
            )
            .register(EventKind::SubscriptionCreated, sync.clone())
            .register(EventKind::SubscriptionUpdated, sync)
            .register(
                EventKind::SubscriptionDeleted,
                Arc::new(SubscriptionDeletedHandler::new(billing, notifier.clone())),
            )
    }

    pub async fn dispatch(&self, event: &StripeEvent) -> Result<Dispatch, HandlerError> {
        let Some((kind, handler)) = event
            .kind()
            .and_then(|kind| self.handlers.get(&kind).map(|h| (kind, h)))
        else {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Unhandled webhook event type"
            );
            return Ok(Dispatch::Ignored);
        };

        handler.handle(event).await?;
        Ok(Dispatch::Handled(kind))
    }
}

/// Send a notification; failures are logged and swallowed
pub(crate) async fn notify(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.send(&notification).await {
        tracing::warn!(
            kind = notification.kind(),
            error = %e,
            "Failed to send notification"
        );
    }
}
