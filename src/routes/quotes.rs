//! Quote routes
//!
//! Quote intake for dispatched RFQs. Only vendors that were actually
//! dispatched may quote, and each vendor gets exactly one quote per RFQ.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::quotes::{CreateQuoteRequest, Quote, QuoteStatus};
use crate::domain::rfqs::RfqStatus;
use crate::error::ApiError;
use crate::services::notifications;

/// Database row for quote
#[derive(Debug, sqlx::FromRow)]
struct QuoteRow {
    id: Uuid,
    rfq_id: Uuid,
    vendor_id: Uuid,
    price: Decimal,
    delivery_terms: Option<String>,
    inclusions: Option<String>,
    exclusions: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuoteRow> for Quote {
    fn from(row: QuoteRow) -> Self {
        Self {
            id: row.id,
            rfq_id: row.rfq_id,
            vendor_id: row.vendor_id,
            price: row.price,
            delivery_terms: row.delivery_terms,
            inclusions: row.inclusions,
            exclusions: row.exclusions,
            status: row.status.parse().unwrap_or(QuoteStatus::Submitted),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// POST /api/rfqs/:rfq_id/quotes
///
/// Submit a quote for an RFQ the vendor was dispatched to.
pub async fn create_quote(
    State(state): State<Arc<AppState>>,
    Path(rfq_id): Path<Uuid>,
    Json(req): Json<CreateQuoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.price <= Decimal::ZERO {
        return Err(ApiError::bad_request("Quote price must be greater than zero"));
    }

    #[derive(sqlx::FromRow)]
    struct RfqRow {
        buyer_id: Uuid,
        title: String,
        status: String,
    }
    let rfq: Option<RfqRow> =
        sqlx::query_as("SELECT buyer_id, title, status FROM rfqs WHERE id = $1")
            .bind(rfq_id)
            .fetch_optional(&state.db)
            .await?;
    let rfq = rfq.ok_or_else(|| ApiError::not_found("RFQ not found"))?;
    let status: RfqStatus = rfq
        .status
        .parse()
        .map_err(|e: String| ApiError::internal(e))?;
    if status != RfqStatus::Open {
        return Err(ApiError::conflict(format!(
            "RFQ is {} and not accepting quotes",
            status
        )));
    }

    #[derive(sqlx::FromRow)]
    struct DispatchedVendor {
        company_name: String,
    }
    let dispatched: Option<DispatchedVendor> = sqlx::query_as(
        r#"
        SELECT v.company_name
        FROM dispatch_records d
        JOIN vendors v ON v.id = d.vendor_id
        WHERE d.rfq_id = $1 AND d.vendor_id = $2
        "#,
    )
    .bind(rfq_id)
    .bind(req.vendor_id)
    .fetch_optional(&state.db)
    .await?;
    let Some(vendor) = dispatched else {
        return Err(ApiError::forbidden(
            "Only vendors this RFQ was dispatched to may quote",
        ));
    };

    let inserted: Option<QuoteRow> = sqlx::query_as(
        r#"
        INSERT INTO quotes (rfq_id, vendor_id, price, delivery_terms, inclusions, exclusions)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (rfq_id, vendor_id) DO NOTHING
        RETURNING id, rfq_id, vendor_id, price, delivery_terms, inclusions, exclusions,
                  status, created_at, updated_at
        "#,
    )
    .bind(rfq_id)
    .bind(req.vendor_id)
    .bind(req.price)
    .bind(&req.delivery_terms)
    .bind(&req.inclusions)
    .bind(&req.exclusions)
    .fetch_optional(&state.db)
    .await?;
    let Some(row) = inserted else {
        return Err(ApiError::conflict(
            "Vendor has already quoted this RFQ",
        ));
    };

    sqlx::query(
        "UPDATE dispatch_records SET status = 'responded', updated_at = NOW() WHERE rfq_id = $1 AND vendor_id = $2",
    )
    .bind(rfq_id)
    .bind(req.vendor_id)
    .execute(&state.db)
    .await?;

    tracing::info!(
        rfq_id = %rfq_id,
        vendor_id = %req.vendor_id,
        price = %req.price,
        "Quote submitted"
    );

    notifications::notify_quote_received(
        state.sink.as_ref(),
        rfq.buyer_id,
        rfq_id,
        &rfq.title,
        &vendor.company_name,
        req.price,
    )
    .await;

    Ok(DataResponse::new(Quote::from(row)))
}

/// GET /api/rfqs/:rfq_id/quotes
pub async fn list_quotes(
    State(state): State<Arc<AppState>>,
    Path(rfq_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM rfqs WHERE id = $1")
        .bind(rfq_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("RFQ not found"));
    }

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quotes WHERE rfq_id = $1")
        .bind(rfq_id)
        .fetch_one(&state.db)
        .await?;

    let rows: Vec<QuoteRow> = sqlx::query_as(
        r#"
        SELECT id, rfq_id, vendor_id, price, delivery_terms, inclusions, exclusions,
               status, created_at, updated_at
        FROM quotes
        WHERE rfq_id = $1
        ORDER BY created_at
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(rfq_id)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let quotes: Vec<Quote> = rows.into_iter().map(Quote::from).collect();
    Ok(Paginated::new(quotes, &pagination, total as u64))
}
