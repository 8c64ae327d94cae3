//! Unified service-layer error type for garage-cloud
//!
//! `ServiceError` bridges store errors (`StoreError`) and the API-layer error
//! (`AppError`). It enables `?` propagation without manual
//! `.map_err(|e| { tracing::error!(...); AppError::new(...) })` boilerplate.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::store::StoreError;

/// Service-layer error
///
/// - `Store`: persistence failures (auto-logged; transient ones map to
///   ServiceUnavailable so clients retry instead of assuming a plan)
/// - `App`: business-rule errors (transparent pass-through to client)
#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
    App(AppError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Store(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Store(StoreError::Unavailable(msg)) => {
                tracing::warn!(error = %msg, "Store unavailable");
                AppError::new(ErrorCode::ServiceUnavailable)
            }
            ServiceError::Store(StoreError::Invalid(msg)) => {
                tracing::error!(error = %msg, "Invalid stored record");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
