use shared::billing::{BillingCycle, Plan, ResourceLimits, parse_feature_set};
use sqlx::PgPool;

use crate::store::StoreError;

pub(crate) const PLAN_COLUMNS: &str = "p.id, p.name, p.billing_cycle, p.price_cents, p.currency, \
     p.max_clients, p.max_appointments_per_month, p.max_reports_per_month, \
     p.features, p.active, p.stripe_price_id";

#[derive(sqlx::FromRow)]
pub(crate) struct PlanRow {
    pub id: String,
    pub name: String,
    pub billing_cycle: String,
    pub price_cents: i64,
    pub currency: String,
    pub max_clients: Option<i64>,
    pub max_appointments_per_month: Option<i64>,
    pub max_reports_per_month: Option<i64>,
    pub features: Vec<String>,
    pub active: bool,
    pub stripe_price_id: Option<String>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = StoreError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let billing_cycle = BillingCycle::from_db(&row.billing_cycle).ok_or_else(|| {
            StoreError::Invalid(format!(
                "plan {}: unknown billing cycle {}",
                row.id, row.billing_cycle
            ))
        })?;
        let limits = ResourceLimits::from_columns(
            row.max_clients,
            row.max_appointments_per_month,
            row.max_reports_per_month,
        )
        .map_err(|e| StoreError::Invalid(format!("plan {}: {e}", row.id)))?;
        let features = parse_feature_set(&row.features)
            .map_err(|e| StoreError::Invalid(format!("plan {}: {e}", row.id)))?;

        Ok(Plan {
            id: row.id,
            name: row.name,
            billing_cycle,
            price_cents: row.price_cents,
            currency: row.currency,
            limits,
            features,
            active: row.active,
            stripe_price_id: row.stripe_price_id,
        })
    }
}

pub async fn list_active(pool: &PgPool) -> Result<Vec<Plan>, StoreError> {
    let rows: Vec<PlanRow> = sqlx::query_as(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans p WHERE p.active ORDER BY p.sort_order, p.id"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Plan::try_from).collect()
}

pub async fn find_by_id(pool: &PgPool, plan_id: &str) -> Result<Option<Plan>, StoreError> {
    let row: Option<PlanRow> =
        sqlx::query_as(&format!("SELECT {PLAN_COLUMNS} FROM plans p WHERE p.id = $1"))
            .bind(plan_id)
            .fetch_optional(pool)
            .await?;
    row.map(Plan::try_from).transpose()
}

pub async fn find_by_stripe_price(
    pool: &PgPool,
    stripe_price_id: &str,
) -> Result<Option<Plan>, StoreError> {
    let row: Option<PlanRow> = sqlx::query_as(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans p WHERE p.stripe_price_id = $1 LIMIT 1"
    ))
    .bind(stripe_price_id)
    .fetch_optional(pool)
    .await?;
    row.map(Plan::try_from).transpose()
}
