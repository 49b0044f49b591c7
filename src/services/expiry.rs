//! Offer expiry sweep
//!
//! Moves threads whose pending offer blew its response deadline into
//! `expired`. This is the only path into that state; user actions never set
//! it. The sweep runs on a background interval and is also invoked before
//! serving a thread detail view, so a stale thread is never shown as live.
//!
//! Each thread is handled in its own transaction under a row lock, which
//! makes the sweep idempotent and safe to run from several processes at
//! once: whoever locks the row first expires it, everyone else re-reads a
//! terminal status and moves on.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::negotiations::{OfferState, ThreadStatus};
use crate::services::notifications::{self, NotificationSink};

#[derive(Debug, sqlx::FromRow)]
struct SweepThreadRow {
    id: Uuid,
    buyer_id: Uuid,
    vendor_id: Uuid,
    status: String,
}

#[derive(Debug, sqlx::FromRow)]
struct SweepOfferRow {
    id: Uuid,
    proposed_by: Uuid,
    status: String,
    response_by_date: DateTime<Utc>,
}

/// Expire every overdue active thread. Returns how many were closed.
/// Failures on one thread are logged and do not stop the rest.
pub async fn sweep(
    db: &PgPool,
    sink: &dyn NotificationSink,
    now: DateTime<Utc>,
) -> anyhow::Result<u64> {
    let candidates: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT t.id
        FROM negotiation_threads t
        JOIN counter_offers o ON o.thread_id = t.id
        WHERE t.status = 'active'
          AND o.status = 'pending'
          AND o.response_by_date < $1
        "#,
    )
    .bind(now)
    .fetch_all(db)
    .await?;

    let mut expired = 0u64;
    for thread_id in candidates {
        match sweep_thread(db, sink, thread_id, now).await {
            Ok(true) => expired += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(thread_id = %thread_id, error = %err, "Expiry sweep failed for thread");
            }
        }
    }

    if expired > 0 {
        tracing::info!(expired, "Expiry sweep closed threads");
    }
    Ok(expired)
}

/// Expire a single thread if its pending offer is overdue. Returns whether
/// the thread was closed by this call. Running it again on an already
/// expired thread is a no-op.
pub async fn sweep_thread(
    db: &PgPool,
    sink: &dyn NotificationSink,
    thread_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let mut tx = db.begin().await?;

    let thread: Option<SweepThreadRow> = sqlx::query_as(
        r#"
        SELECT id, buyer_id, vendor_id, status
        FROM negotiation_threads
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(thread_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(thread) = thread else {
        return Ok(false);
    };
    let status: ThreadStatus = thread.status.parse().map_err(anyhow::Error::msg)?;
    if status != ThreadStatus::Active {
        return Ok(false);
    }

    let offer: Option<SweepOfferRow> = sqlx::query_as(
        r#"
        SELECT id, proposed_by, status, response_by_date
        FROM counter_offers
        WHERE thread_id = $1 AND status = 'pending'
        FOR UPDATE
        "#,
    )
    .bind(thread_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(offer) = offer else {
        return Ok(false);
    };
    let state = OfferState {
        id: offer.id,
        proposed_by: offer.proposed_by,
        status: offer.status.parse().map_err(anyhow::Error::msg)?,
        response_by_date: offer.response_by_date,
    };
    if !state.is_overdue(now) {
        return Ok(false);
    }

    sqlx::query("UPDATE counter_offers SET status = 'expired', updated_at = $2 WHERE id = $1")
        .bind(offer.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "UPDATE negotiation_threads SET status = 'expired', closed_at = $2, updated_at = $2 WHERE id = $1",
    )
    .bind(thread_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        thread_id = %thread_id,
        offer_id = %offer.id,
        "Negotiation expired after missed response deadline"
    );

    for party in [thread.buyer_id, thread.vendor_id] {
        notifications::notify_offer_expired(sink, party, thread_id, offer.id).await;
    }

    Ok(true)
}

/// Background task driving [`sweep`] on a fixed interval.
pub async fn run_sweeper(
    db: PgPool,
    sink: std::sync::Arc<dyn NotificationSink>,
    interval_seconds: u64,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep(&db, sink.as_ref(), Utc::now()).await {
            tracing::error!(error = %err, "Expiry sweep run failed");
        }
    }
}
