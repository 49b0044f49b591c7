//! Negotiation routes
//!
//! Thread lifecycle: open on a quote, exchange bounded counter-offer
//! rounds, resolve by accept/reject/cancel, or let the expiry sweep close
//! the thread. Every state-changing handler locks the thread row, re-reads
//! state, and applies the pure transition guards before writing, so two
//! racing requests serialize and the loser gets a conflict instead of a
//! corrupted thread.
//!
//! Handlers run the expiry sweep for the thread first; acting on a thread
//! whose deadline already passed behaves exactly as if the sweep had run.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::negotiations::{
    response_window_days, AcceptOfferRequest, CancelThreadRequest, CounterOffer,
    CounterOfferRequest, CreateThreadRequest, NegotiationThread, OfferStatus, QaItem,
    RejectOfferRequest, ThreadStats, ThreadStatus,
};
use crate::domain::quotes::QuoteStatus;
use crate::error::ApiError;
use crate::services::audit::{self, TimelineEvent};
use crate::services::job_orders::{self, JobOrderInput};
use crate::services::{expiry, notifications};

/// Database row for negotiation thread
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ThreadRow {
    id: Uuid,
    quote_id: Uuid,
    buyer_id: Uuid,
    vendor_id: Uuid,
    status: String,
    original_price: Decimal,
    current_price: Decimal,
    round_count: i32,
    max_rounds: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl ThreadRow {
    fn into_thread(self) -> Result<NegotiationThread, ApiError> {
        let status: ThreadStatus = self
            .status
            .parse()
            .map_err(|e: String| ApiError::internal(e))?;
        Ok(NegotiationThread {
            id: self.id,
            quote_id: self.quote_id,
            buyer_id: self.buyer_id,
            vendor_id: self.vendor_id,
            status,
            original_price: self.original_price,
            current_price: self.current_price,
            round_count: self.round_count,
            max_rounds: self.max_rounds,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        })
    }
}

/// Database row for counter-offer
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OfferRow {
    id: Uuid,
    thread_id: Uuid,
    proposed_by: Uuid,
    proposed_price: Decimal,
    scope_changes: Option<String>,
    delivery_date: Option<DateTime<Utc>>,
    payment_terms: Option<String>,
    notes: Option<String>,
    status: String,
    superseded: bool,
    rejected_reason: Option<String>,
    response_by_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OfferRow {
    fn into_offer(self) -> Result<CounterOffer, ApiError> {
        let status: OfferStatus = self
            .status
            .parse()
            .map_err(|e: String| ApiError::internal(e))?;
        Ok(CounterOffer {
            id: self.id,
            thread_id: self.thread_id,
            proposed_by: self.proposed_by,
            proposed_price: self.proposed_price,
            scope_changes: self.scope_changes,
            delivery_date: self.delivery_date,
            payment_terms: self.payment_terms,
            notes: self.notes,
            status,
            superseded: self.superseded,
            rejected_reason: self.rejected_reason,
            response_by_date: self.response_by_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for Q&A item
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct QaRow {
    id: Uuid,
    thread_id: Uuid,
    asked_by: Uuid,
    question: String,
    answer: Option<String>,
    answered_by: Option<Uuid>,
    answered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<QaRow> for QaItem {
    fn from(row: QaRow) -> Self {
        Self {
            id: row.id,
            thread_id: row.thread_id,
            asked_by: row.asked_by,
            question: row.question,
            answer: row.answer,
            answered_by: row.answered_by,
            answered_at: row.answered_at,
            created_at: row.created_at,
        }
    }
}

const THREAD_COLUMNS: &str = "id, quote_id, buyer_id, vendor_id, status, original_price, \
     current_price, round_count, max_rounds, created_at, updated_at, closed_at";

const OFFER_COLUMNS: &str = "id, thread_id, proposed_by, proposed_price, scope_changes, \
     delivery_date, payment_terms, notes, status, superseded, rejected_reason, \
     response_by_date, created_at, updated_at";

async fn lock_thread(
    tx: &mut sqlx::PgConnection,
    thread_id: Uuid,
) -> Result<NegotiationThread, ApiError> {
    let row: Option<ThreadRow> = sqlx::query_as(&format!(
        "SELECT {THREAD_COLUMNS} FROM negotiation_threads WHERE id = $1 FOR UPDATE"
    ))
    .bind(thread_id)
    .fetch_optional(&mut *tx)
    .await?;
    row.ok_or_else(|| ApiError::not_found("Negotiation not found"))?
        .into_thread()
}

async fn lock_pending_offer(
    tx: &mut sqlx::PgConnection,
    thread_id: Uuid,
) -> Result<Option<CounterOffer>, ApiError> {
    let row: Option<OfferRow> = sqlx::query_as(&format!(
        "SELECT {OFFER_COLUMNS} FROM counter_offers \
         WHERE thread_id = $1 AND status = 'pending' FOR UPDATE"
    ))
    .bind(thread_id)
    .fetch_optional(&mut *tx)
    .await?;
    row.map(OfferRow::into_offer).transpose()
}

async fn lock_offer(
    tx: &mut sqlx::PgConnection,
    thread_id: Uuid,
    offer_id: Uuid,
) -> Result<CounterOffer, ApiError> {
    let row: Option<OfferRow> = sqlx::query_as(&format!(
        "SELECT {OFFER_COLUMNS} FROM counter_offers \
         WHERE id = $1 AND thread_id = $2 FOR UPDATE"
    ))
    .bind(offer_id)
    .bind(thread_id)
    .fetch_optional(&mut *tx)
    .await?;
    row.ok_or_else(|| ApiError::not_found("Offer not found"))?
        .into_offer()
}

async fn load_offers(db: &sqlx::PgPool, thread_id: Uuid) -> Result<Vec<CounterOffer>, ApiError> {
    let rows: Vec<OfferRow> = sqlx::query_as(&format!(
        "SELECT {OFFER_COLUMNS} FROM counter_offers WHERE thread_id = $1 ORDER BY created_at"
    ))
    .bind(thread_id)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(OfferRow::into_offer).collect()
}

async fn load_qa(db: &sqlx::PgPool, thread_id: Uuid) -> Result<Vec<QaItem>, ApiError> {
    let rows: Vec<QaRow> = sqlx::query_as(
        "SELECT id, thread_id, asked_by, question, answer, answered_by, answered_at, created_at \
         FROM negotiation_qa WHERE thread_id = $1 ORDER BY created_at",
    )
    .bind(thread_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(QaItem::from).collect())
}

/// POST /api/negotiations
///
/// Open a negotiation thread on a submitted quote. Only the RFQ's buyer may
/// open one, and a quote carries at most one live thread at a time.
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateThreadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    #[derive(sqlx::FromRow)]
    struct QuoteContext {
        price: Decimal,
        status: String,
        buyer_id: Uuid,
        vendor_user_id: Uuid,
    }
    let quote: Option<QuoteContext> = sqlx::query_as(
        r#"
        SELECT q.price, q.status, r.buyer_id, v.user_id AS vendor_user_id
        FROM quotes q
        JOIN rfqs r ON r.id = q.rfq_id
        JOIN vendors v ON v.id = q.vendor_id
        WHERE q.id = $1
        "#,
    )
    .bind(req.quote_id)
    .fetch_optional(&state.db)
    .await?;
    let quote = quote.ok_or_else(|| ApiError::not_found("Quote not found"))?;

    let quote_status: QuoteStatus = quote
        .status
        .parse()
        .map_err(|e: String| ApiError::internal(e))?;
    if quote_status != QuoteStatus::Submitted {
        return Err(ApiError::conflict(format!(
            "Quote is {} and cannot be negotiated",
            quote_status
        )));
    }
    if req.requested_by != quote.buyer_id {
        return Err(ApiError::forbidden("Only the buyer may open a negotiation"));
    }

    let row: Option<ThreadRow> = sqlx::query_as(&format!(
        "INSERT INTO negotiation_threads \
             (quote_id, buyer_id, vendor_id, original_price, current_price, max_rounds) \
         VALUES ($1, $2, $3, $4, $4, $5) \
         ON CONFLICT (quote_id) WHERE status = 'active' DO NOTHING \
         RETURNING {THREAD_COLUMNS}"
    ))
    .bind(req.quote_id)
    .bind(quote.buyer_id)
    .bind(quote.vendor_user_id)
    .bind(quote.price)
    .bind(state.settings.max_negotiation_rounds)
    .fetch_optional(&state.db)
    .await?;
    let Some(row) = row else {
        return Err(ApiError::conflict(
            "A negotiation is already active for this quote",
        ));
    };
    let thread = row.into_thread()?;

    tracing::info!(
        thread_id = %thread.id,
        quote_id = %req.quote_id,
        buyer_id = %thread.buyer_id,
        vendor_id = %thread.vendor_id,
        "Negotiation opened"
    );

    Ok(DataResponse::new(thread))
}

#[derive(Debug, Serialize)]
pub struct ThreadDetailResponse {
    pub thread: NegotiationThread,
    pub offers: Vec<CounterOffer>,
    pub qa: Vec<QaItem>,
    pub stats: ThreadStats,
}

/// GET /api/negotiations/:thread_id
///
/// Thread detail with offer history, Q&A, and summary stats. The expiry
/// sweep runs first so an overdue thread is reported as expired, never as
/// still live.
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    expiry::sweep_thread(&state.db, state.sink.as_ref(), thread_id, Utc::now()).await?;

    let row: Option<ThreadRow> = sqlx::query_as(&format!(
        "SELECT {THREAD_COLUMNS} FROM negotiation_threads WHERE id = $1"
    ))
    .bind(thread_id)
    .fetch_optional(&state.db)
    .await?;
    let thread = row
        .ok_or_else(|| ApiError::not_found("Negotiation not found"))?
        .into_thread()?;

    let mut offers = load_offers(&state.db, thread_id).await?;
    let qa = load_qa(&state.db, thread_id).await?;
    let stats = audit::thread_stats(&thread, &offers, &qa);
    // Offers newest-first for display; Q&A stays oldest-first.
    offers.reverse();

    Ok(DataResponse::new(ThreadDetailResponse {
        thread,
        offers,
        qa,
        stats,
    }))
}

/// POST /api/negotiations/:thread_id/counter-offers
///
/// Submit a counter-offer. Consumes one round; the other party's standing
/// pending offer (if any) is superseded, never silently dropped.
pub async fn submit_counter_offer(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<CounterOfferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    expiry::sweep_thread(&state.db, state.sink.as_ref(), thread_id, now).await?;

    let window_days =
        response_window_days(req.response_by_days, state.settings.offer_response_window_days)
            .map_err(ApiError::from)?;

    let mut tx = state.db.begin().await?;
    let thread = lock_thread(&mut *tx, thread_id).await?;
    let pending = lock_pending_offer(&mut *tx, thread_id).await?;

    thread
        .state()
        .check_submit(
            req.proposed_by,
            req.proposed_price,
            pending.as_ref().map(|o| o.state()).as_ref(),
        )
        .map_err(ApiError::from)?;

    if let Some(standing) = &pending {
        sqlx::query(
            "UPDATE counter_offers SET status = 'cancelled', superseded = TRUE, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(standing.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let row: OfferRow = sqlx::query_as(&format!(
        "INSERT INTO counter_offers \
             (thread_id, proposed_by, proposed_price, scope_changes, delivery_date, \
              payment_terms, notes, response_by_date, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
         RETURNING {OFFER_COLUMNS}"
    ))
    .bind(thread_id)
    .bind(req.proposed_by)
    .bind(req.proposed_price)
    .bind(&req.scope_changes)
    .bind(req.delivery_date)
    .bind(&req.payment_terms)
    .bind(&req.notes)
    .bind(now + Duration::days(window_days))
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let new_round = thread.round_count + 1;
    sqlx::query(
        "UPDATE negotiation_threads \
         SET round_count = $2, current_price = $3, updated_at = $4 WHERE id = $1",
    )
    .bind(thread_id)
    .bind(new_round)
    .bind(req.proposed_price)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    let offer = row.into_offer()?;

    tracing::info!(
        thread_id = %thread_id,
        offer_id = %offer.id,
        proposed_by = %req.proposed_by,
        round = new_round,
        superseded_prior = pending.is_some(),
        "Counter-offer submitted"
    );

    notifications::notify_counter_offer(
        state.sink.as_ref(),
        thread.counterparty(req.proposed_by),
        thread_id,
        offer.id,
        offer.proposed_price,
        new_round,
    )
    .await;

    Ok(DataResponse::new(offer))
}

#[derive(Debug, Serialize)]
pub struct AcceptOfferResponse {
    pub thread: NegotiationThread,
    pub offer: CounterOffer,
    pub job_order_id: Uuid,
}

/// POST /api/negotiations/:thread_id/offers/:offer_id/accept
///
/// Accept the pending offer: closes the thread at the agreed price, marks
/// the quote accepted, and creates the job order in the same transaction.
pub async fn accept_offer(
    State(state): State<Arc<AppState>>,
    Path((thread_id, offer_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AcceptOfferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    expiry::sweep_thread(&state.db, state.sink.as_ref(), thread_id, now).await?;

    let mut tx = state.db.begin().await?;
    let mut thread = lock_thread(&mut *tx, thread_id).await?;
    let mut offer = lock_offer(&mut *tx, thread_id, offer_id).await?;

    thread
        .state()
        .check_accept(&offer.state(), req.acting_user)
        .map_err(ApiError::from)?;

    sqlx::query("UPDATE counter_offers SET status = 'accepted', updated_at = $2 WHERE id = $1")
        .bind(offer_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "UPDATE negotiation_threads \
         SET status = 'accepted', current_price = $2, closed_at = $3, updated_at = $3 \
         WHERE id = $1",
    )
    .bind(thread_id)
    .bind(offer.proposed_price)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    sqlx::query("UPDATE quotes SET status = 'accepted', updated_at = $2 WHERE id = $1")
        .bind(thread.quote_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let (job_order_id, created) = job_orders::create_for_thread(
        &mut *tx,
        &JobOrderInput {
            thread_id,
            quote_id: thread.quote_id,
            buyer_id: thread.buyer_id,
            vendor_id: thread.vendor_id,
            agreed_price: offer.proposed_price,
            delivery_terms: offer.scope_changes.clone(),
            payment_terms: offer.payment_terms.clone(),
        },
    )
    .await?;

    tx.commit().await?;

    thread.status = ThreadStatus::Accepted;
    thread.current_price = offer.proposed_price;
    thread.closed_at = Some(now);
    thread.updated_at = now;
    offer.status = OfferStatus::Accepted;
    offer.updated_at = now;

    tracing::info!(
        thread_id = %thread_id,
        offer_id = %offer_id,
        job_order_id = %job_order_id,
        agreed_price = %offer.proposed_price,
        job_order_created = created,
        "Offer accepted"
    );

    notifications::notify_offer_accepted(
        state.sink.as_ref(),
        offer.proposed_by,
        thread_id,
        offer_id,
        offer.proposed_price,
    )
    .await;
    if created {
        for party in [thread.buyer_id, thread.vendor_id] {
            notifications::notify_job_order_created(
                state.sink.as_ref(),
                party,
                thread_id,
                job_order_id,
                offer.proposed_price,
            )
            .await;
        }
    }

    Ok(DataResponse::new(AcceptOfferResponse {
        thread,
        offer,
        job_order_id,
    }))
}

/// POST /api/negotiations/:thread_id/offers/:offer_id/reject
///
/// Reject the pending offer. The thread stays active; the author may
/// counter again if rounds remain, otherwise the parties cancel or let it
/// expire.
pub async fn reject_offer(
    State(state): State<Arc<AppState>>,
    Path((thread_id, offer_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<RejectOfferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    expiry::sweep_thread(&state.db, state.sink.as_ref(), thread_id, now).await?;

    let mut tx = state.db.begin().await?;
    let thread = lock_thread(&mut *tx, thread_id).await?;
    let mut offer = lock_offer(&mut *tx, thread_id, offer_id).await?;

    thread
        .state()
        .check_reject(&offer.state(), req.acting_user)
        .map_err(ApiError::from)?;

    sqlx::query(
        "UPDATE counter_offers \
         SET status = 'rejected', rejected_reason = $2, updated_at = $3 WHERE id = $1",
    )
    .bind(offer_id)
    .bind(&req.reason)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    sqlx::query("UPDATE negotiation_threads SET updated_at = $2 WHERE id = $1")
        .bind(thread_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    offer.status = OfferStatus::Rejected;
    offer.rejected_reason = req.reason.clone();
    offer.updated_at = now;

    tracing::info!(
        thread_id = %thread_id,
        offer_id = %offer_id,
        acting_user = %req.acting_user,
        "Offer rejected"
    );

    notifications::notify_offer_rejected(
        state.sink.as_ref(),
        offer.proposed_by,
        thread_id,
        offer_id,
        req.reason.as_deref(),
    )
    .await;

    Ok(DataResponse::new(offer))
}

/// POST /api/negotiations/:thread_id/cancel
///
/// Walk away. Unconditional for a participant while the thread is active;
/// any pending offer is cancelled with it.
pub async fn cancel_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<CancelThreadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    expiry::sweep_thread(&state.db, state.sink.as_ref(), thread_id, now).await?;

    let mut tx = state.db.begin().await?;
    let mut thread = lock_thread(&mut *tx, thread_id).await?;

    thread
        .state()
        .check_cancel(req.acting_user)
        .map_err(ApiError::from)?;

    sqlx::query(
        "UPDATE counter_offers SET status = 'cancelled', updated_at = $2 \
         WHERE thread_id = $1 AND status = 'pending'",
    )
    .bind(thread_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "UPDATE negotiation_threads \
         SET status = 'cancelled', closed_at = $2, updated_at = $2 WHERE id = $1",
    )
    .bind(thread_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    thread.status = ThreadStatus::Cancelled;
    thread.closed_at = Some(now);
    thread.updated_at = now;

    tracing::info!(
        thread_id = %thread_id,
        acting_user = %req.acting_user,
        reason = ?req.reason,
        "Negotiation cancelled"
    );

    notifications::notify_negotiation_cancelled(
        state.sink.as_ref(),
        thread.counterparty(req.acting_user),
        thread_id,
        req.reason.as_deref(),
    )
    .await;

    Ok(DataResponse::new(thread))
}

/// GET /api/negotiations/:thread_id/timeline
///
/// The thread's full audit trail as one chronological sequence.
pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    expiry::sweep_thread(&state.db, state.sink.as_ref(), thread_id, Utc::now()).await?;

    let row: Option<ThreadRow> = sqlx::query_as(&format!(
        "SELECT {THREAD_COLUMNS} FROM negotiation_threads WHERE id = $1"
    ))
    .bind(thread_id)
    .fetch_optional(&state.db)
    .await?;
    let thread = row
        .ok_or_else(|| ApiError::not_found("Negotiation not found"))?
        .into_thread()?;

    let offers = load_offers(&state.db, thread_id).await?;
    let qa = load_qa(&state.db, thread_id).await?;
    let timeline: Vec<TimelineEvent> = audit::build_timeline(&thread, &offers, &qa);

    Ok(DataResponse::new(timeline))
}
