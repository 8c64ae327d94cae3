//! Subscription billing: entitlement resolution, usage counting, checkout

pub mod checkout;
pub mod resolver;
pub mod usage;

pub use checkout::{CheckoutBridge, CheckoutRequest, PaymentSessions};
pub use resolver::EntitlementResolver;
pub use usage::UsageCounter;
