//! Console API endpoints for the authenticated tenant

mod billing;
mod capabilities;
mod entitlement;

pub use billing::{billing_portal, create_checkout};
pub use capabilities::check_capability;
pub use entitlement::get_entitlement;
