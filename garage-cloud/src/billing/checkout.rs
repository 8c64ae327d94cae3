//! Checkout bridge
//!
//! Validates a plan selection and asks the payment provider for a hosted
//! checkout or billing portal session. No local subscription state changes
//! here: subscriptions move only when the provider's webhooks arrive.

use std::sync::Arc;

use async_trait::async_trait;
use shared::billing::{BillingCycle, Plan};
use shared::error::{AppError, ErrorCode};

use crate::error::ServiceResult;
use crate::store::{BillingStore, Tenant};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Hosted checkout session parameters
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub tenant: &'a Tenant,
    pub plan: &'a Plan,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// Payment provider session API
#[async_trait]
pub trait PaymentSessions: Send + Sync {
    /// Returns the hosted checkout URL
    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<String, BoxError>;

    /// Returns the billing portal URL
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BoxError>;
}

#[derive(Clone)]
pub struct CheckoutBridge {
    billing: Arc<dyn BillingStore>,
    sessions: Arc<dyn PaymentSessions>,
    console_base_url: String,
}

impl CheckoutBridge {
    pub fn new(
        billing: Arc<dyn BillingStore>,
        sessions: Arc<dyn PaymentSessions>,
        console_base_url: impl Into<String>,
    ) -> Self {
        Self {
            billing,
            sessions,
            console_base_url: console_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Start a hosted checkout for `plan_id`; returns the URL to redirect to
    pub async fn start_checkout(
        &self,
        tenant_id: &str,
        plan_id: &str,
        billing_cycle: BillingCycle,
    ) -> ServiceResult<String> {
        let plan = self
            .billing
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::PlanNotFound))?;

        if !plan.active {
            return Err(AppError::new(ErrorCode::PlanInactive)
                .with_detail("plan_id", plan.id.clone())
                .into());
        }
        if plan.billing_cycle != billing_cycle {
            return Err(AppError::new(ErrorCode::BillingCycleMismatch)
                .with_detail("plan_id", plan.id.clone())
                .with_detail("billing_cycle", plan.billing_cycle.as_db())
                .into());
        }

        let price_id = plan.stripe_price_id.as_deref().ok_or_else(|| {
            tracing::error!(plan_id = %plan.id, "Plan has no Stripe price configured");
            AppError::new(ErrorCode::PaymentSetupFailed)
        })?;

        let tenant = self
            .billing
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotFound))?;

        let success_url = format!("{}/billing/success", self.console_base_url);
        let cancel_url = format!("{}/billing/cancel", self.console_base_url);
        let request = CheckoutRequest {
            tenant: &tenant,
            plan: &plan,
            price_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
        };

        let url = self
            .sessions
            .create_checkout_session(&request)
            .await
            .map_err(|e| {
                tracing::error!(
                    tenant_id = %tenant_id,
                    plan_id = %plan.id,
                    error = %e,
                    "Failed to create Stripe checkout"
                );
                AppError::new(ErrorCode::PaymentSetupFailed)
            })?;

        let detail = serde_json::json!({
            "plan_id": plan.id,
            "billing_cycle": billing_cycle.as_db(),
        });
        if let Err(e) = self
            .billing
            .record_audit(tenant_id, "checkout_created", detail)
            .await
        {
            tracing::warn!(error = %e, "Failed to record checkout audit entry");
        }

        Ok(url)
    }

    /// Open the provider's billing portal for the tenant's existing customer
    pub async fn open_portal(&self, tenant_id: &str) -> ServiceResult<String> {
        let tenant = self
            .billing
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::TenantNotFound))?;

        let customer_id = tenant
            .stripe_customer_id
            .as_deref()
            .ok_or_else(|| AppError::new(ErrorCode::BillingPortalUnavailable))?;

        let return_url = format!("{}/billing", self.console_base_url);
        let url = self
            .sessions
            .create_portal_session(customer_id, &return_url)
            .await
            .map_err(|e| {
                tracing::error!(tenant_id = %tenant_id, error = %e, "Billing portal error");
                AppError::new(ErrorCode::PaymentSetupFailed)
            })?;
        Ok(url)
    }
}
