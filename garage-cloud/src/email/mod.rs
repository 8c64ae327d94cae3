//! Transactional email
//!
//! Webhook handlers describe what happened as a [`Notification`]; the
//! [`Notifier`] turns it into a message. Delivery failures are reported to
//! the caller, which logs them without failing the webhook.

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PaymentConfirmed {
        to: String,
        order_number: String,
        amount_cents: i64,
        currency: String,
    },
    PaymentFailed {
        to: String,
        order_number: String,
        reason: Option<String>,
    },
    PaymentActionRequired {
        to: String,
        order_number: String,
    },
    SubscriptionActivated {
        to: String,
        plan_name: String,
    },
    SubscriptionCanceled {
        to: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Self::PaymentConfirmed { to, .. }
            | Self::PaymentFailed { to, .. }
            | Self::PaymentActionRequired { to, .. }
            | Self::SubscriptionActivated { to, .. }
            | Self::SubscriptionCanceled { to } => to,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::PaymentActionRequired { .. } => "payment_action_required",
            Self::SubscriptionActivated { .. } => "subscription_activated",
            Self::SubscriptionCanceled { .. } => "subscription_canceled",
        }
    }

    /// Subject and plain-text body
    pub fn render(&self) -> (String, String) {
        match self {
            Self::PaymentConfirmed {
                order_number,
                amount_cents,
                currency,
                ..
            } => (
                format!("Payment received for order {order_number}"),
                format!(
                    "We received your payment of {} for service order {order_number}.\n\
                     Thank you for your business!",
                    format_amount(*amount_cents, currency)
                ),
            ),
            Self::PaymentFailed {
                order_number,
                reason,
                ..
            } => {
                let reason = reason
                    .as_deref()
                    .map(|r| format!("\nReason: {r}"))
                    .unwrap_or_default();
                (
                    format!("Payment failed for order {order_number}"),
                    format!(
                        "Your payment for service order {order_number} could not be processed.{reason}\n\
                         Please try again or use a different payment method."
                    ),
                )
            }
            Self::PaymentActionRequired { order_number, .. } => (
                format!("Action needed to complete payment for order {order_number}"),
                format!(
                    "Your bank needs you to confirm the payment for service order {order_number}.\n\
                     Please return to the payment page to finish authentication."
                ),
            ),
            Self::SubscriptionActivated { plan_name, .. } => (
                "Subscription activated".to_string(),
                format!(
                    "Your \"{plan_name}\" subscription has been activated.\n\
                     Thank you for choosing us!"
                ),
            ),
            Self::SubscriptionCanceled { .. } => (
                "Subscription canceled".to_string(),
                "Your subscription has been canceled.\n\
                 Your data is kept; subscribe again at any time to restore plan features."
                    .to_string(),
            ),
        }
    }
}

fn format_amount(cents: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        cents / 100,
        (cents % 100).abs(),
        currency.to_uppercase()
    )
}

/// Delivers notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), BoxError>;
}

/// [`Notifier`] backed by AWS SES
#[derive(Clone)]
pub struct SesNotifier {
    ses: SesClient,
    from: String,
}

impl SesNotifier {
    pub fn new(ses: SesClient, from: impl Into<String>) -> Self {
        Self {
            ses,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), BoxError> {
        let (subject, body_text) = notification.render();
        send_email(&self.ses, &self.from, notification.recipient(), &subject, body_text).await?;
        tracing::info!(
            to = notification.recipient(),
            kind = notification.kind(),
            "Notification sent"
        );
        Ok(())
    }
}

pub async fn send_email(
    ses: &SesClient,
    from: &str,
    to: &str,
    subject: &str,
    body_text: String,
) -> Result<(), BoxError> {
    let subject = Content::builder().data(subject).build()?;

    let body = Body::builder()
        .text(Content::builder().data(body_text).build()?)
        .build();

    let message = Message::builder().subject(subject).body(body).build();

    ses.send_email()
        .from_email_address(from)
        .destination(Destination::builder().to_addresses(to).build())
        .content(EmailContent::builder().simple(message).build())
        .send()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_mentions_amount_and_order() {
        let n = Notification::PaymentConfirmed {
            to: "owner@example.com".into(),
            order_number: "SO-1042".into(),
            amount_cents: 12_950,
            currency: "usd".into(),
        };
        let (subject, body) = n.render();
        assert!(subject.contains("SO-1042"));
        assert!(body.contains("129.50 USD"));
        assert_eq!(n.recipient(), "owner@example.com");
    }

    #[test]
    fn test_failure_reason_is_optional() {
        let with_reason = Notification::PaymentFailed {
            to: "a@b.c".into(),
            order_number: "SO-1".into(),
            reason: Some("card_declined".into()),
        };
        assert!(with_reason.render().1.contains("Reason: card_declined"));

        let without = Notification::PaymentFailed {
            to: "a@b.c".into(),
            order_number: "SO-1".into(),
            reason: None,
        };
        assert!(!without.render().1.contains("Reason"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(5, "eur"), "0.05 EUR");
        assert_eq!(format_amount(100_000, "usd"), "1000.00 USD");
    }
}
