//! Job order creation
//!
//! A job order is the binding outcome of an accepted negotiation. Creation
//! runs inside the accept transaction and is idempotent: the `thread_id`
//! unique constraint guarantees at most one order per thread even under a
//! double-submitted accept.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct JobOrderInput {
    pub thread_id: Uuid,
    pub quote_id: Uuid,
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub agreed_price: Decimal,
    pub delivery_terms: Option<String>,
    pub payment_terms: Option<String>,
}

/// Create the job order for an accepted thread, or return the existing one.
/// The boolean reports whether this call created it.
pub async fn create_for_thread(
    conn: &mut PgConnection,
    input: &JobOrderInput,
) -> Result<(Uuid, bool), sqlx::Error> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO job_orders (thread_id, quote_id, buyer_id, vendor_id, agreed_price, delivery_terms, payment_terms)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (thread_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(input.thread_id)
    .bind(input.quote_id)
    .bind(input.buyer_id)
    .bind(input.vendor_id)
    .bind(input.agreed_price)
    .bind(&input.delivery_terms)
    .bind(&input.payment_terms)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        tracing::info!(
            thread_id = %input.thread_id,
            job_order_id = %id,
            agreed_price = %input.agreed_price,
            "Job order created"
        );
        return Ok((id, true));
    }

    let existing: Uuid = sqlx::query_scalar("SELECT id FROM job_orders WHERE thread_id = $1")
        .bind(input.thread_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok((existing, false))
}
