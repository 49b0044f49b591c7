//! RFQ dispatch routes
//!
//! Runs the matching engine over the active vendor pool and records who an
//! RFQ was sent to. Dispatch is idempotent per (RFQ, vendor): re-running a
//! dispatch only reaches vendors that were not already on the list.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::dispatch::{DispatchKind, DispatchOutcome, DispatchRecordResponse};
use crate::domain::rfqs::{MatchCriteria, RfqStatus};
use crate::domain::vendors::{Vendor, VendorStatus};
use crate::error::ApiError;
use crate::services::matching::{self, SlugCategoryMatcher};
use crate::services::notifications;

/// Database row for RFQ
#[derive(Debug, sqlx::FromRow)]
struct RfqRow {
    buyer_id: Uuid,
    title: String,
    category_slug: String,
    county: Option<String>,
    status: String,
}

/// Database row for vendor, as the matching engine needs it
#[derive(Debug, sqlx::FromRow)]
struct VendorRow {
    id: Uuid,
    user_id: Uuid,
    company_name: String,
    primary_category_slug: String,
    secondary_category_slugs: sqlx::types::Json<Vec<String>>,
    county: Option<String>,
    service_counties: sqlx::types::Json<Vec<String>>,
    verified: bool,
    rating: Decimal,
    avg_response_hours: Option<i32>,
    rfqs_completed: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        // Unknown statuses never reach the matcher.
        let status = row.status.parse().unwrap_or(VendorStatus::Suspended);
        Self {
            id: row.id,
            user_id: row.user_id,
            company_name: row.company_name,
            primary_category_slug: row.primary_category_slug,
            secondary_category_slugs: row.secondary_category_slugs.0,
            county: row.county,
            service_counties: row.service_counties.0,
            verified: row.verified,
            rating: row.rating,
            avg_response_hours: row.avg_response_hours,
            rfqs_completed: row.rfqs_completed,
            status,
            created_at: row.created_at,
        }
    }
}

async fn load_rfq(db: &sqlx::PgPool, rfq_id: Uuid) -> Result<(RfqRow, RfqStatus), ApiError> {
    let row: Option<RfqRow> = sqlx::query_as(
        "SELECT buyer_id, title, category_slug, county, status FROM rfqs WHERE id = $1",
    )
    .bind(rfq_id)
    .fetch_optional(db)
    .await?;

    let row = row.ok_or_else(|| ApiError::not_found("RFQ not found"))?;
    let status: RfqStatus = row
        .status
        .parse()
        .map_err(|e: String| ApiError::internal(e))?;
    Ok((row, status))
}

async fn load_active_vendor_pool(db: &sqlx::PgPool) -> Result<Vec<Vendor>, ApiError> {
    let rows: Vec<VendorRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, company_name, primary_category_slug, secondary_category_slugs,
               county, service_counties, verified, rating, avg_response_hours,
               rfqs_completed, status, created_at
        FROM vendors
        WHERE status = 'active'
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(Vendor::from).collect())
}

/// Record one dispatch, returning whether the vendor was newly added.
async fn record_dispatch(
    db: &sqlx::PgPool,
    rfq_id: Uuid,
    vendor_id: Uuid,
    kind: DispatchKind,
    location_relaxed: bool,
) -> Result<bool, ApiError> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO dispatch_records (rfq_id, vendor_id, dispatch_kind, status, location_relaxed)
        VALUES ($1, $2, $3, 'sent', $4)
        ON CONFLICT (rfq_id, vendor_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(rfq_id)
    .bind(vendor_id)
    .bind(kind.to_string())
    .bind(location_relaxed)
    .fetch_optional(db)
    .await?;
    Ok(inserted.is_some())
}

/// POST /api/rfqs/:rfq_id/dispatch
///
/// Match, rank, and notify vendors for an RFQ. When matching comes up
/// empty the RFQ is parked for manual assignment instead of failing.
pub async fn dispatch_rfq(
    State(state): State<Arc<AppState>>,
    Path(rfq_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (rfq, status) = load_rfq(&state.db, rfq_id).await?;
    if !status.dispatchable() {
        return Err(ApiError::conflict(format!(
            "RFQ is {} and cannot be dispatched",
            status
        )));
    }

    let pool = load_active_vendor_pool(&state.db).await?;
    let criteria = MatchCriteria {
        category_slug: rfq.category_slug.clone(),
        county: rfq.county.clone(),
    };
    let outcome = matching::match_vendors(&pool, &criteria, &SlugCategoryMatcher);

    tracing::info!(
        rfq_id = %rfq_id,
        category = %criteria.category_slug,
        county = ?criteria.county,
        candidates = outcome.candidates.len(),
        location_relaxed = outcome.location_relaxed,
        "Dispatch matching completed"
    );

    if outcome.candidates.is_empty() {
        sqlx::query("UPDATE rfqs SET status = 'needs_admin_review', updated_at = NOW() WHERE id = $1")
            .bind(rfq_id)
            .execute(&state.db)
            .await?;

        let admins: Vec<Uuid> = sqlx::query_scalar("SELECT user_id FROM admin_users")
            .fetch_all(&state.db)
            .await?;
        for admin in admins {
            notifications::notify_admin_intervention(
                state.sink.as_ref(),
                admin,
                rfq_id,
                &rfq.title,
                &criteria.category_slug,
                criteria.county.as_deref(),
            )
            .await;
        }

        return Ok(DataResponse::new(DispatchOutcome {
            rfq_id,
            dispatched: 0,
            location_relaxed: outcome.location_relaxed,
            needs_admin_review: true,
        }));
    }

    let mut dispatched = 0usize;
    for vendor in &outcome.candidates {
        let newly = record_dispatch(
            &state.db,
            rfq_id,
            vendor.id,
            DispatchKind::Auto,
            outcome.location_relaxed,
        )
        .await?;
        if newly {
            dispatched += 1;
            notifications::notify_rfq_received(
                state.sink.as_ref(),
                vendor.user_id,
                rfq_id,
                &rfq.title,
                outcome.location_relaxed,
            )
            .await;
        }
    }

    sqlx::query("UPDATE rfqs SET status = 'open', updated_at = NOW() WHERE id = $1")
        .bind(rfq_id)
        .execute(&state.db)
        .await?;

    if dispatched > 0 {
        notifications::notify_rfq_sent(
            state.sink.as_ref(),
            rfq.buyer_id,
            rfq_id,
            &rfq.title,
            dispatched,
        )
        .await;
    }

    Ok(DataResponse::new(DispatchOutcome {
        rfq_id,
        dispatched,
        location_relaxed: outcome.location_relaxed,
        needs_admin_review: false,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ManualDispatchRequest {
    pub assigned_by: Uuid,
    pub vendor_ids: Vec<Uuid>,
}

/// POST /api/rfqs/:rfq_id/dispatch/manual
///
/// Operator assignment of vendors, used when auto-matching found nobody.
pub async fn manual_dispatch(
    State(state): State<Arc<AppState>>,
    Path(rfq_id): Path<Uuid>,
    Json(req): Json<ManualDispatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let is_admin: Option<Uuid> =
        sqlx::query_scalar("SELECT user_id FROM admin_users WHERE user_id = $1")
            .bind(req.assigned_by)
            .fetch_optional(&state.db)
            .await?;
    if is_admin.is_none() {
        return Err(ApiError::forbidden("Manual dispatch requires an operator"));
    }
    if req.vendor_ids.is_empty() {
        return Err(ApiError::bad_request("vendor_ids must not be empty"));
    }

    let (rfq, _status) = load_rfq(&state.db, rfq_id).await?;

    #[derive(sqlx::FromRow)]
    struct AssignedVendor {
        id: Uuid,
        user_id: Uuid,
    }
    let vendors: Vec<AssignedVendor> = sqlx::query_as(
        "SELECT id, user_id FROM vendors WHERE id = ANY($1) AND status = 'active'",
    )
    .bind(&req.vendor_ids)
    .fetch_all(&state.db)
    .await?;
    if vendors.is_empty() {
        return Err(ApiError::bad_request("No active vendors in vendor_ids"));
    }

    let mut dispatched = 0usize;
    for vendor in &vendors {
        let newly =
            record_dispatch(&state.db, rfq_id, vendor.id, DispatchKind::Manual, false).await?;
        if newly {
            dispatched += 1;
            notifications::notify_admin_matched(
                state.sink.as_ref(),
                vendor.user_id,
                rfq_id,
                &rfq.title,
            )
            .await;
        }
    }

    sqlx::query("UPDATE rfqs SET status = 'open', updated_at = NOW() WHERE id = $1")
        .bind(rfq_id)
        .execute(&state.db)
        .await?;

    if dispatched > 0 {
        notifications::notify_rfq_sent(
            state.sink.as_ref(),
            rfq.buyer_id,
            rfq_id,
            &rfq.title,
            dispatched,
        )
        .await;
    }

    tracing::info!(
        rfq_id = %rfq_id,
        assigned_by = %req.assigned_by,
        dispatched,
        "Manual dispatch completed"
    );

    Ok(DataResponse::new(DispatchOutcome {
        rfq_id,
        dispatched,
        location_relaxed: false,
        needs_admin_review: false,
    }))
}

/// Database row for dispatch listing
#[derive(Debug, sqlx::FromRow)]
struct DispatchRow {
    id: Uuid,
    rfq_id: Uuid,
    vendor_id: Uuid,
    company_name: String,
    dispatch_kind: String,
    status: String,
    location_relaxed: bool,
    created_at: DateTime<Utc>,
}

impl From<DispatchRow> for DispatchRecordResponse {
    fn from(row: DispatchRow) -> Self {
        Self {
            id: row.id,
            rfq_id: row.rfq_id,
            vendor_id: row.vendor_id,
            company_name: row.company_name,
            dispatch_kind: row
                .dispatch_kind
                .parse()
                .unwrap_or(DispatchKind::Auto),
            status: row
                .status
                .parse()
                .unwrap_or(crate::domain::dispatch::DispatchStatus::Sent),
            location_relaxed: row.location_relaxed,
            created_at: row.created_at,
        }
    }
}

/// GET /api/rfqs/:rfq_id/dispatches
pub async fn list_dispatches(
    State(state): State<Arc<AppState>>,
    Path(rfq_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (_rfq, _status) = load_rfq(&state.db, rfq_id).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dispatch_records WHERE rfq_id = $1")
        .bind(rfq_id)
        .fetch_one(&state.db)
        .await?;

    let rows: Vec<DispatchRow> = sqlx::query_as(
        r#"
        SELECT d.id, d.rfq_id, d.vendor_id, v.company_name, d.dispatch_kind,
               d.status, d.location_relaxed, d.created_at
        FROM dispatch_records d
        JOIN vendors v ON v.id = d.vendor_id
        WHERE d.rfq_id = $1
        ORDER BY d.created_at
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(rfq_id)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let records: Vec<DispatchRecordResponse> =
        rows.into_iter().map(DispatchRecordResponse::from).collect();
    Ok(Paginated::new(records, &pagination, total as u64))
}
