//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::TenantNotFound | Self::PlanNotFound => StatusCode::NOT_FOUND,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::SubscriptionBlocked => StatusCode::FORBIDDEN,

            // 402 Payment Required (upgrade needed)
            Self::FeatureNotAvailable | Self::ResourceLimitReached => StatusCode::PAYMENT_REQUIRED,

            // 502 Bad Gateway (payment provider round trip failed)
            Self::PaymentSetupFailed => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError | Self::WebhookHandlerFailed => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request
            Self::InvalidRequest
            | Self::PlanInactive
            | Self::BillingCycleMismatch
            | Self::BillingPortalUnavailable
            | Self::WebhookSignatureInvalid
            | Self::WebhookPayloadInvalid => StatusCode::BAD_REQUEST,
        }
    }
}
