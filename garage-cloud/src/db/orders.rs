use sqlx::PgPool;

use crate::store::{OrderContact, PaymentStatus};

#[derive(sqlx::FromRow)]
struct OrderContactRow {
    id: String,
    tenant_id: String,
    order_number: String,
    customer_email: Option<String>,
    total_cents: i64,
    currency: String,
}

/// Set the order's payment status; `paid_at` is stamped only on success
pub async fn set_payment_status(
    pool: &PgPool,
    order_id: &str,
    status: PaymentStatus,
    payment_intent_id: &str,
    now: i64,
) -> Result<Option<OrderContact>, sqlx::Error> {
    let row: Option<OrderContactRow> = sqlx::query_as(
        "UPDATE service_orders SET
            payment_status = $1,
            payment_intent_id = $2,
            paid_at = CASE WHEN $1 = 'paid' THEN $3 ELSE paid_at END,
            updated_at = $3
         WHERE id = $4
         RETURNING id, tenant_id, order_number, customer_email, total_cents, currency",
    )
    .bind(status.as_db())
    .bind(payment_intent_id)
    .bind(now)
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| OrderContact {
        order_id: r.id,
        tenant_id: r.tenant_id,
        order_number: r.order_number,
        customer_email: r.customer_email,
        total_cents: r.total_cents,
        currency: r.currency,
    }))
}
