//! In-memory backends for router tests

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use shared::billing::{
    BillingCycle, BillingPeriod, FeatureFlag, Plan, ResourceKind, ResourceLimits, Subscription,
    SubscriptionStatus,
};

use garage_cloud::billing::{CheckoutRequest, PaymentSessions};
use garage_cloud::config::Config;
use garage_cloud::email::{Notification, Notifier};
use garage_cloud::store::{
    BillingStore, NewSubscription, OrderContact, OrderStore, PaymentStatus, StoreError,
    StoreResult, SubscriptionChange, Tenant, UsageStore,
};
use garage_cloud::{AppState, Backends, create_router};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const JWT_SECRET: &str = "jwt-test-secret";
pub const CONSOLE: &str = "https://console.test";

/// Ordered record of side effects across all fakes
pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct Inner {
    plans: Vec<Plan>,
    tenants: Vec<Tenant>,
    subscriptions: Vec<Subscription>,
    usage: HashMap<ResourceKind, u64>,
    orders: HashMap<String, OrderContact>,
    audits: Vec<(String, String)>,
    fail_reads: bool,
    fail_counts: bool,
    fail_orders: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    pub journal: Journal,
}

impl MemoryStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: Arc::default(),
            journal,
        }
    }

    pub fn add_plan(&self, plan: Plan) {
        self.inner.lock().unwrap().plans.push(plan);
    }

    pub fn add_tenant(&self, id: &str, email: &str, stripe_customer_id: Option<&str>) {
        self.inner.lock().unwrap().tenants.push(Tenant {
            id: id.to_string(),
            email: email.to_string(),
            name: None,
            stripe_customer_id: stripe_customer_id.map(str::to_string),
        });
    }

    pub fn add_subscription(&self, sub: Subscription) {
        self.inner.lock().unwrap().subscriptions.push(sub);
    }

    pub fn subscription(&self, tenant_id: &str) -> Option<Subscription> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|s| s.tenant_id == tenant_id)
            .cloned()
    }

    pub fn tenant(&self, tenant_id: &str) -> Option<Tenant> {
        self.inner
            .lock()
            .unwrap()
            .tenants
            .iter()
            .find(|t| t.id == tenant_id)
            .cloned()
    }

    pub fn set_usage(&self, kind: ResourceKind, count: u64) {
        self.inner.lock().unwrap().usage.insert(kind, count);
    }

    pub fn add_order(&self, order_id: &str, tenant_id: &str, customer_email: Option<&str>) {
        self.inner.lock().unwrap().orders.insert(
            order_id.to_string(),
            OrderContact {
                order_id: order_id.to_string(),
                tenant_id: tenant_id.to_string(),
                order_number: format!("SO-{order_id}"),
                customer_email: customer_email.map(str::to_string),
                total_cents: 12_500,
                currency: "usd".to_string(),
            },
        );
    }

    pub fn audits(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().audits.clone()
    }

    pub fn fail_reads(&self) {
        self.inner.lock().unwrap().fail_reads = true;
    }

    pub fn fail_counts(&self) {
        self.inner.lock().unwrap().fail_counts = true;
    }

    pub fn fail_orders(&self) {
        self.inner.lock().unwrap().fail_orders = true;
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn check_reads(&self) -> StoreResult<()> {
        if self.inner.lock().unwrap().fail_reads {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn list_active_plans(&self) -> StoreResult<Vec<Plan>> {
        self.check_reads()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.plans.iter().filter(|p| p.active).cloned().collect())
    }

    async fn find_plan(&self, plan_id: &str) -> StoreResult<Option<Plan>> {
        self.check_reads()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.plans.iter().find(|p| p.id == plan_id).cloned())
    }

    async fn find_plan_by_price(&self, stripe_price_id: &str) -> StoreResult<Option<Plan>> {
        self.check_reads()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .plans
            .iter()
            .find(|p| p.stripe_price_id.as_deref() == Some(stripe_price_id))
            .cloned())
    }

    async fn subscription_with_plan(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Option<(Subscription, Plan)>> {
        self.check_reads()?;
        let inner = self.inner.lock().unwrap();
        let Some(sub) = inner.subscriptions.iter().find(|s| s.tenant_id == tenant_id) else {
            return Ok(None);
        };
        let plan = inner
            .plans
            .iter()
            .find(|p| p.id == sub.plan_id)
            .cloned()
            .ok_or_else(|| StoreError::Invalid(format!("missing plan {}", sub.plan_id)))?;
        Ok(Some((sub.clone(), plan)))
    }

    async fn find_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>> {
        self.check_reads()?;
        Ok(self.tenant(tenant_id))
    }

    async fn find_tenant_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<Tenant>> {
        self.check_reads()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tenants
            .iter()
            .find(|t| t.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn set_stripe_customer(&self, tenant_id: &str, customer_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = inner.tenants.iter_mut().find(|t| t.id == tenant_id) {
            t.stripe_customer_id = Some(customer_id.to_string());
        }
        Ok(())
    }

    async fn upsert_subscription(&self, sub: &NewSubscription<'_>) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let same = inner
            .subscriptions
            .iter()
            .position(|s| {
                s.tenant_id == sub.tenant_id
                    && s.stripe_subscription_id.as_deref() == Some(sub.stripe_subscription_id)
            })
            .map(|i| inner.subscriptions.remove(i));
        inner.subscriptions.retain(|s| s.tenant_id != sub.tenant_id);
        let record = match same {
            Some(existing) => Subscription {
                plan_id: sub.plan_id.to_string(),
                current_period_start: sub.current_period_start.or(existing.current_period_start),
                current_period_end: sub.current_period_end.or(existing.current_period_end),
                trial_end: sub.trial_end.or(existing.trial_end),
                ..existing
            },
            None => Subscription {
                id: format!("sub-row-{}", sub.tenant_id),
                tenant_id: sub.tenant_id.to_string(),
                plan_id: sub.plan_id.to_string(),
                status: sub.status,
                current_period_start: sub.current_period_start,
                current_period_end: sub.current_period_end,
                trial_end: sub.trial_end,
                cancel_at_period_end: false,
                stripe_subscription_id: Some(sub.stripe_subscription_id.to_string()),
            },
        };
        inner.subscriptions.push(record);
        drop(inner);
        self.record(format!("upsert_subscription:{}", sub.tenant_id));
        Ok(())
    }

    async fn apply_subscription_change(
        &self,
        stripe_subscription_id: &str,
        change: &SubscriptionChange,
    ) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(sub) = inner
            .subscriptions
            .iter_mut()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
        else {
            return Ok(None);
        };
        sub.status = change.status;
        if let Some(plan_id) = &change.plan_id {
            sub.plan_id = plan_id.clone();
        }
        sub.current_period_start = change.current_period_start.or(sub.current_period_start);
        sub.current_period_end = change.current_period_end.or(sub.current_period_end);
        sub.trial_end = change.trial_end;
        sub.cancel_at_period_end = change.cancel_at_period_end;
        Ok(Some(sub.tenant_id.clone()))
    }

    async fn expire_subscription(
        &self,
        stripe_subscription_id: &str,
    ) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(sub) = inner
            .subscriptions
            .iter_mut()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
        else {
            return Ok(None);
        };
        sub.status = SubscriptionStatus::Expired;
        Ok(Some(sub.tenant_id.clone()))
    }

    async fn record_audit(
        &self,
        tenant_id: &str,
        action: &str,
        _detail: serde_json::Value,
    ) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .audits
            .push((tenant_id.to_string(), action.to_string()));
        Ok(())
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn count(
        &self,
        _tenant_id: &str,
        kind: ResourceKind,
        _period: Option<BillingPeriod>,
    ) -> StoreResult<u64> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_counts {
            return Err(StoreError::Unavailable("count timed out".into()));
        }
        Ok(inner.usage.get(&kind).copied().unwrap_or(0))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn set_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
        _payment_intent_id: &str,
    ) -> StoreResult<Option<OrderContact>> {
        let contact = {
            let inner = self.inner.lock().unwrap();
            if inner.fail_orders {
                return Err(StoreError::Unavailable("pool exhausted".into()));
            }
            inner.orders.get(order_id).cloned()
        };
        if contact.is_some() {
            self.record(format!("payment_status:{order_id}:{}", status.as_db()));
        }
        Ok(contact)
    }
}

/// Records session requests and hands back fixed URLs
#[derive(Clone, Default)]
pub struct FakeSessions {
    pub checkouts: Arc<Mutex<Vec<(String, String)>>>,
    pub portals: Arc<Mutex<Vec<String>>>,
    pub fail: Arc<Mutex<bool>>,
}

impl FakeSessions {
    pub fn checkout_calls(&self) -> usize {
        self.checkouts.lock().unwrap().len()
    }

    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl PaymentSessions for FakeSessions {
    async fn create_checkout_session(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<String, BoxError> {
        self.checkouts
            .lock()
            .unwrap()
            .push((req.tenant.id.clone(), req.price_id.to_string()));
        if *self.fail.lock().unwrap() {
            return Err("stripe returned 500".into());
        }
        Ok(format!("https://checkout.stripe.test/{}", req.plan.id))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BoxError> {
        self.portals.lock().unwrap().push(return_url.to_string());
        if *self.fail.lock().unwrap() {
            return Err("stripe returned 500".into());
        }
        Ok(format!("https://billing.stripe.test/{customer_id}"))
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    pub journal: Journal,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), BoxError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("notify:{}", notification.kind()));
        if self.fail {
            return Err("ses throttled".into());
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        http_port: 0,
        environment: "development".to_string(),
        ses_from_email: "noreply@test".to_string(),
        ses_region: None,
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        webhook_tolerance_secs: 300,
        jwt_secret: JWT_SECRET.to_string(),
        console_base_url: CONSOLE.to_string(),
        near_limit_threshold: 80,
    }
}

/// Everything a router test needs to poke at
pub struct Harness {
    pub store: MemoryStore,
    pub sessions: FakeSessions,
    pub notifier: RecordingNotifier,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            store: MemoryStore::new(journal.clone()),
            sessions: FakeSessions::default(),
            notifier: RecordingNotifier {
                journal: journal.clone(),
                ..Default::default()
            },
            journal,
        }
    }

    pub fn state(&self) -> AppState {
        let store = Arc::new(self.store.clone());
        AppState::with_backends(
            Backends {
                billing: store.clone(),
                usage: store.clone(),
                orders: store,
                sessions: Arc::new(self.sessions.clone()),
                notifier: Arc::new(self.notifier.clone()),
            },
            &test_config(),
        )
    }

    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

pub fn plan(id: &str, cycle: BillingCycle, limits: ResourceLimits, features: &[FeatureFlag]) -> Plan {
    Plan {
        id: id.to_string(),
        name: id.split('_').next().unwrap_or(id).to_string(),
        billing_cycle: cycle,
        price_cents: 2900,
        currency: "usd".to_string(),
        limits,
        features: features.iter().copied().collect::<BTreeSet<_>>(),
        active: true,
        stripe_price_id: Some(format!("price_{id}")),
    }
}

pub fn starter_monthly() -> Plan {
    plan(
        "starter_monthly",
        BillingCycle::Monthly,
        ResourceLimits {
            max_clients: Some(10),
            max_appointments_per_month: Some(100),
            max_reports_per_month: None,
        },
        &[FeatureFlag::EmailNotifications],
    )
}

pub fn subscription(
    tenant_id: &str,
    plan_id: &str,
    status: SubscriptionStatus,
    period_end: Option<DateTime<Utc>>,
) -> Subscription {
    Subscription {
        id: format!("row-{tenant_id}"),
        tenant_id: tenant_id.to_string(),
        plan_id: plan_id.to_string(),
        status,
        current_period_start: period_end.map(|end| end - chrono::Duration::days(30)),
        current_period_end: period_end,
        trial_end: None,
        cancel_at_period_end: false,
        stripe_subscription_id: Some(format!("sub_{tenant_id}")),
    }
}

pub fn bearer(tenant_id: &str) -> String {
    let token = garage_cloud::auth::create_token(tenant_id, "owner@garage.test", JWT_SECRET)
        .expect("token");
    format!("Bearer {token}")
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

