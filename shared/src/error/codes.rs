//! Unified error codes for the garage CRM
//!
//! This module defines all error codes shared by the cloud service and the
//! web console. Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 3xxx: Tenant / subscription errors
//! - 5xxx: Payment webhook errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller has no resolvable tenant
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 3xxx: Tenant / Subscription ====================
    /// Tenant not found
    TenantNotFound = 3002,
    /// Subscription expired or cancelled past its period
    SubscriptionBlocked = 3006,
    /// Plan maximum reached for a resource
    ResourceLimitReached = 3008,
    /// Feature not available in current subscription plan
    FeatureNotAvailable = 3010,
    /// Payment session could not be created (Stripe)
    PaymentSetupFailed = 3017,
    /// Plan not found
    PlanNotFound = 3020,
    /// Plan is no longer offered
    PlanInactive = 3021,
    /// Requested billing cycle does not match the plan
    BillingCycleMismatch = 3022,
    /// Tenant has no billing customer yet
    BillingPortalUnavailable = 3023,

    // ==================== 5xxx: Payment webhooks ====================
    /// Webhook signature missing or invalid
    WebhookSignatureInvalid = 5101,
    /// Webhook payload is not a valid event
    WebhookPayloadInvalid = 5102,
    /// A webhook handler failed while processing a known event
    WebhookHandlerFailed = 5103,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Backing store temporarily unavailable, retry later
    ServiceUnavailable = 9103,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Tenant / Subscription
            ErrorCode::TenantNotFound => "Tenant not found",
            ErrorCode::SubscriptionBlocked => "Subscription is no longer active",
            ErrorCode::ResourceLimitReached => "Plan limit reached",
            ErrorCode::FeatureNotAvailable => "Feature not available in current plan",
            ErrorCode::PaymentSetupFailed => "Could not start payment session, please try again",
            ErrorCode::PlanNotFound => "Plan not found",
            ErrorCode::PlanInactive => "Plan is no longer available",
            ErrorCode::BillingCycleMismatch => "Billing cycle does not match plan",
            ErrorCode::BillingPortalUnavailable => "No billing account for tenant",

            // Payment webhooks
            ErrorCode::WebhookSignatureInvalid => "Webhook signature verification failed",
            ErrorCode::WebhookPayloadInvalid => "Invalid webhook payload",
            ErrorCode::WebhookHandlerFailed => "Webhook handler failed",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable, please retry",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Tenant / Subscription
            3002 => Ok(ErrorCode::TenantNotFound),
            3006 => Ok(ErrorCode::SubscriptionBlocked),
            3008 => Ok(ErrorCode::ResourceLimitReached),
            3010 => Ok(ErrorCode::FeatureNotAvailable),
            3017 => Ok(ErrorCode::PaymentSetupFailed),
            3020 => Ok(ErrorCode::PlanNotFound),
            3021 => Ok(ErrorCode::PlanInactive),
            3022 => Ok(ErrorCode::BillingCycleMismatch),
            3023 => Ok(ErrorCode::BillingPortalUnavailable),

            // Payment webhooks
            5101 => Ok(ErrorCode::WebhookSignatureInvalid),
            5102 => Ok(ErrorCode::WebhookPayloadInvalid),
            5103 => Ok(ErrorCode::WebhookHandlerFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9103 => Ok(ErrorCode::ServiceUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
