//! Shared types for the garage CRM
//!
//! Error codes and the subscription billing model used by the cloud
//! service and by console clients alike.

pub mod billing;
pub mod error;
pub mod util;

// Re-exports
pub use billing::{Capability, Entitlement, FeatureFlag, ResourceKind};
pub use error::{AppError, AppResult, ErrorCode};
pub use http;
