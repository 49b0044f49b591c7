pub mod health;
pub mod negotiations;
pub mod qa;
pub mod quotes;
pub mod rfqs;

use axum::{routing::get, routing::post, routing::put, Router};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Dispatch (nested under RFQs)
        .route("/rfqs/:rfq_id/dispatch", post(rfqs::dispatch_rfq))
        .route("/rfqs/:rfq_id/dispatch/manual", post(rfqs::manual_dispatch))
        .route("/rfqs/:rfq_id/dispatches", get(rfqs::list_dispatches))
        // Quotes (nested under RFQs)
        .route("/rfqs/:rfq_id/quotes", post(quotes::create_quote))
        .route("/rfqs/:rfq_id/quotes", get(quotes::list_quotes))
        // Negotiations
        .route("/negotiations", post(negotiations::create_thread))
        .route("/negotiations/:thread_id", get(negotiations::get_thread))
        .route(
            "/negotiations/:thread_id/counter-offers",
            post(negotiations::submit_counter_offer),
        )
        .route(
            "/negotiations/:thread_id/offers/:offer_id/accept",
            post(negotiations::accept_offer),
        )
        .route(
            "/negotiations/:thread_id/offers/:offer_id/reject",
            post(negotiations::reject_offer),
        )
        .route(
            "/negotiations/:thread_id/cancel",
            post(negotiations::cancel_thread),
        )
        .route(
            "/negotiations/:thread_id/timeline",
            get(negotiations::get_timeline),
        )
        // Q&A (nested under negotiations)
        .route("/negotiations/:thread_id/questions", post(qa::ask_question))
        .route(
            "/negotiations/:thread_id/questions/:qa_id/answer",
            put(qa::answer_question),
        )
}
