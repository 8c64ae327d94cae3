use chrono::{DateTime, Utc};
use shared::billing::{Plan, Subscription, SubscriptionStatus};
use sqlx::PgPool;

use super::plans::{PLAN_COLUMNS, PlanRow};
use crate::store::{NewSubscription, StoreError, SubscriptionChange};

#[derive(sqlx::FromRow)]
struct SubscriptionPlanRow {
    sub_id: String,
    tenant_id: String,
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    trial_end: Option<i64>,
    cancel_at_period_end: bool,
    stripe_subscription_id: Option<String>,
    #[sqlx(flatten)]
    plan: PlanRow,
}

fn millis_to_utc(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

fn utc_to_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|t| t.timestamp_millis())
}

/// The tenant's subscription joined with its plan row
pub async fn find_with_plan(
    pool: &PgPool,
    tenant_id: &str,
) -> Result<Option<(Subscription, Plan)>, StoreError> {
    let row: Option<SubscriptionPlanRow> = sqlx::query_as(&format!(
        "SELECT s.id AS sub_id, s.tenant_id, s.status, s.current_period_start,
                s.current_period_end, s.trial_end, s.cancel_at_period_end,
                s.stripe_subscription_id, {PLAN_COLUMNS}
         FROM subscriptions s
         JOIN plans p ON p.id = s.plan_id
         WHERE s.tenant_id = $1
         ORDER BY s.updated_at DESC
         LIMIT 1"
    ))
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status = SubscriptionStatus::from_db(&row.status).ok_or_else(|| {
        StoreError::Invalid(format!(
            "subscription {}: unknown status {}",
            row.sub_id, row.status
        ))
    })?;
    let plan = Plan::try_from(row.plan)?;
    let subscription = Subscription {
        id: row.sub_id,
        tenant_id: row.tenant_id,
        plan_id: plan.id.clone(),
        status,
        current_period_start: millis_to_utc(row.current_period_start),
        current_period_end: millis_to_utc(row.current_period_end),
        trial_end: millis_to_utc(row.trial_end),
        cancel_at_period_end: row.cancel_at_period_end,
        stripe_subscription_id: row.stripe_subscription_id,
    };
    Ok(Some((subscription, plan)))
}

/// One subscription per tenant: a new Stripe subscription replaces the
/// previous record. Writing the same subscription id again keeps the status,
/// period and trial already synced from the provider.
pub async fn upsert(pool: &PgPool, sub: &NewSubscription<'_>, now: i64) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO subscriptions (id, tenant_id, plan_id, status, current_period_start,
            current_period_end, trial_end, cancel_at_period_end, stripe_subscription_id,
            created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9, $9)
         ON CONFLICT (tenant_id) DO UPDATE SET
            plan_id = EXCLUDED.plan_id,
            status = CASE WHEN subscriptions.stripe_subscription_id = EXCLUDED.stripe_subscription_id
                THEN subscriptions.status ELSE EXCLUDED.status END,
            current_period_start = CASE WHEN subscriptions.stripe_subscription_id = EXCLUDED.stripe_subscription_id
                THEN COALESCE(EXCLUDED.current_period_start, subscriptions.current_period_start)
                ELSE EXCLUDED.current_period_start END,
            current_period_end = CASE WHEN subscriptions.stripe_subscription_id = EXCLUDED.stripe_subscription_id
                THEN COALESCE(EXCLUDED.current_period_end, subscriptions.current_period_end)
                ELSE EXCLUDED.current_period_end END,
            trial_end = CASE WHEN subscriptions.stripe_subscription_id = EXCLUDED.stripe_subscription_id
                THEN COALESCE(EXCLUDED.trial_end, subscriptions.trial_end)
                ELSE EXCLUDED.trial_end END,
            cancel_at_period_end = CASE WHEN subscriptions.stripe_subscription_id = EXCLUDED.stripe_subscription_id
                THEN subscriptions.cancel_at_period_end ELSE FALSE END,
            stripe_subscription_id = EXCLUDED.stripe_subscription_id,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(sub.tenant_id)
    .bind(sub.plan_id)
    .bind(sub.status.as_db())
    .bind(utc_to_millis(sub.current_period_start))
    .bind(utc_to_millis(sub.current_period_end))
    .bind(utc_to_millis(sub.trial_end))
    .bind(sub.stripe_subscription_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn apply_change(
    pool: &PgPool,
    stripe_subscription_id: &str,
    change: &SubscriptionChange,
    now: i64,
) -> Result<Option<String>, StoreError> {
    let row: Option<(String,)> = sqlx::query_as(
        "UPDATE subscriptions SET
            status = $1,
            plan_id = COALESCE($2, plan_id),
            current_period_start = COALESCE($3, current_period_start),
            current_period_end = COALESCE($4, current_period_end),
            trial_end = $5,
            cancel_at_period_end = $6,
            updated_at = $7
         WHERE stripe_subscription_id = $8
         RETURNING tenant_id",
    )
    .bind(change.status.as_db())
    .bind(change.plan_id.as_deref())
    .bind(utc_to_millis(change.current_period_start))
    .bind(utc_to_millis(change.current_period_end))
    .bind(utc_to_millis(change.trial_end))
    .bind(change.cancel_at_period_end)
    .bind(now)
    .bind(stripe_subscription_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

pub async fn expire(
    pool: &PgPool,
    stripe_subscription_id: &str,
    now: i64,
) -> Result<Option<String>, StoreError> {
    let row: Option<(String,)> = sqlx::query_as(
        "UPDATE subscriptions SET status = 'expired', cancel_at_period_end = FALSE, updated_at = $1
         WHERE stripe_subscription_id = $2
         RETURNING tenant_id",
    )
    .bind(now)
    .bind(stripe_subscription_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}
