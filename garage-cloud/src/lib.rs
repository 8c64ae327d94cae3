//! garage-cloud: plan entitlements and Stripe billing for the garage CRM
//!
//! - Resolves what a tenant may do from its subscription, plan and usage
//! - Serves plan gates to the web console (JWT authenticated)
//! - Bridges to Stripe hosted checkout and the billing portal
//! - Applies Stripe webhook events to orders and subscriptions

pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod state;
pub mod store;
pub mod stripe;
pub mod webhook;

pub use api::create_router;
pub use config::Config;
pub use state::{AppState, Backends};
