use sqlx::PgPool;

use crate::store::Tenant;

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: String,
    email: String,
    name: Option<String>,
    stripe_customer_id: Option<String>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            email: row.email,
            name: row.name,
            stripe_customer_id: row.stripe_customer_id,
        }
    }
}

pub async fn find_by_id(pool: &PgPool, tenant_id: &str) -> Result<Option<Tenant>, sqlx::Error> {
    let row: Option<TenantRow> =
        sqlx::query_as("SELECT id, email, name, stripe_customer_id FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Tenant::from))
}

pub async fn find_by_stripe_customer(
    pool: &PgPool,
    customer_id: &str,
) -> Result<Option<Tenant>, sqlx::Error> {
    let row: Option<TenantRow> = sqlx::query_as(
        "SELECT id, email, name, stripe_customer_id FROM tenants WHERE stripe_customer_id = $1",
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Tenant::from))
}

pub async fn set_stripe_customer(
    pool: &PgPool,
    tenant_id: &str,
    stripe_customer_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET stripe_customer_id = $1 WHERE id = $2")
        .bind(stripe_customer_id)
        .bind(tenant_id)
        .execute(pool)
        .await?;
    Ok(())
}
