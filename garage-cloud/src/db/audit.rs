//! Audit log operations

use sqlx::PgPool;

/// Write an audit log entry
pub async fn log(
    pool: &PgPool,
    tenant_id: &str,
    action: &str,
    detail: Option<&serde_json::Value>,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (tenant_id, action, detail, created_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(tenant_id)
    .bind(action)
    .bind(detail)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}
