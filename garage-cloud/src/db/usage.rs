//! Resource counts for plan maxima

use shared::billing::{BillingPeriod, ResourceKind};
use sqlx::PgPool;

fn count_query(kind: ResourceKind, scoped: bool) -> &'static str {
    match kind {
        ResourceKind::Clients => "SELECT COUNT(*) FROM clients WHERE tenant_id = $1 AND active",
        ResourceKind::Appointments if scoped => {
            "SELECT COUNT(*) FROM appointments WHERE tenant_id = $1
             AND created_at >= $2 AND created_at < $3"
        }
        ResourceKind::Appointments => "SELECT COUNT(*) FROM appointments WHERE tenant_id = $1",
        ResourceKind::Reports if scoped => {
            "SELECT COUNT(*) FROM reports WHERE tenant_id = $1
             AND created_at >= $2 AND created_at < $3"
        }
        ResourceKind::Reports => "SELECT COUNT(*) FROM reports WHERE tenant_id = $1",
    }
}

/// Count a tenant's records of `kind`, bounded to `period` when given.
/// Clients are always counted all-time.
pub async fn count(
    pool: &PgPool,
    tenant_id: &str,
    kind: ResourceKind,
    period: Option<BillingPeriod>,
) -> Result<u64, sqlx::Error> {
    let period = period.filter(|_| kind.is_period_scoped());
    let (n,): (i64,) = match period {
        Some(p) => {
            sqlx::query_as(count_query(kind, true))
                .bind(tenant_id)
                .bind(p.start.timestamp_millis())
                .bind(p.end.timestamp_millis())
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_as(count_query(kind, false))
                .bind(tenant_id)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(n.max(0) as u64)
}
