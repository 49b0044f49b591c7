//! Negotiation domain types and transition rules
//!
//! One negotiation thread per quote, a bounded number of counter-offer
//! rounds, and four thread states of which three are terminal. All legality
//! checks live here as pure functions over snapshots of thread/offer state;
//! the route layer is responsible for loading those snapshots under a row
//! lock and committing the effects atomically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Bounds for the per-offer response window override.
pub const RESPONSE_WINDOW_MIN_DAYS: i64 = 1;
pub const RESPONSE_WINDOW_MAX_DAYS: i64 = 30;

// ============================================================================
// Statuses
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Accepted,
    Cancelled,
    Expired,
}

impl ThreadStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadStatus::Active => write!(f, "active"),
            ThreadStatus::Accepted => write!(f, "accepted"),
            ThreadStatus::Cancelled => write!(f, "cancelled"),
            ThreadStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for ThreadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "accepted" => Ok(Self::Accepted),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown thread status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferStatus::Pending => write!(f, "pending"),
            OfferStatus::Accepted => write!(f, "accepted"),
            OfferStatus::Rejected => write!(f, "rejected"),
            OfferStatus::Expired => write!(f, "expired"),
            OfferStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown offer status: {other}")),
        }
    }
}

// ============================================================================
// Transition errors
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("negotiation is {0} and accepts no further actions")]
    ThreadClosed(ThreadStatus),

    #[error("round limit of {max_rounds} reached")]
    RoundLimitReached { max_rounds: i32 },

    #[error("user is not a participant in this negotiation")]
    NotParticipant,

    #[error("a party cannot act on its own offer")]
    OwnOffer,

    #[error("your previous offer is still awaiting the other party's response")]
    OwnOfferPending,

    #[error("offer is {0}, not pending")]
    OfferNotPending(OfferStatus),

    #[error("proposed price must be greater than zero")]
    InvalidPrice,

    #[error("response window must be between 1 and 30 days")]
    InvalidResponseWindow,
}

// ============================================================================
// State snapshots and guards
// ============================================================================

/// Snapshot of the thread columns the transition rules reason over.
#[derive(Debug, Clone)]
pub struct ThreadState {
    pub status: ThreadStatus,
    pub round_count: i32,
    pub max_rounds: i32,
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
}

/// Snapshot of the offer columns the transition rules reason over.
#[derive(Debug, Clone)]
pub struct OfferState {
    pub id: Uuid,
    pub proposed_by: Uuid,
    pub status: OfferStatus,
    pub response_by_date: DateTime<Utc>,
}

impl OfferState {
    /// Whether the expiry sweep should act on this offer. False for anything
    /// already resolved, which is what makes the sweep idempotent.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Pending && self.response_by_date < now
    }
}

impl ThreadState {
    fn ensure_active(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::ThreadClosed(self.status));
        }
        Ok(())
    }

    fn ensure_participant(&self, user: Uuid) -> Result<(), TransitionError> {
        if user != self.buyer_id && user != self.vendor_id {
            return Err(TransitionError::NotParticipant);
        }
        Ok(())
    }

    /// Legality of submitting a new counter-offer. `pending` is the thread's
    /// current pending offer, if any; a party may not stack a second offer on
    /// top of its own standing one, while the other party countering is what
    /// supersedes it.
    pub fn check_submit(
        &self,
        proposed_by: Uuid,
        price: Decimal,
        pending: Option<&OfferState>,
    ) -> Result<(), TransitionError> {
        self.ensure_participant(proposed_by)?;
        self.ensure_active()?;
        if price <= Decimal::ZERO {
            return Err(TransitionError::InvalidPrice);
        }
        if self.round_count >= self.max_rounds {
            return Err(TransitionError::RoundLimitReached {
                max_rounds: self.max_rounds,
            });
        }
        if let Some(offer) = pending {
            if offer.proposed_by == proposed_by {
                return Err(TransitionError::OwnOfferPending);
            }
        }
        Ok(())
    }

    /// Legality of accepting a pending offer: only the party that did not
    /// author it may accept.
    pub fn check_accept(
        &self,
        offer: &OfferState,
        acting_user: Uuid,
    ) -> Result<(), TransitionError> {
        self.ensure_participant(acting_user)?;
        self.ensure_active()?;
        if offer.status != OfferStatus::Pending {
            return Err(TransitionError::OfferNotPending(offer.status));
        }
        if offer.proposed_by == acting_user {
            return Err(TransitionError::OwnOffer);
        }
        Ok(())
    }

    /// Same actor constraint as accept.
    pub fn check_reject(
        &self,
        offer: &OfferState,
        acting_user: Uuid,
    ) -> Result<(), TransitionError> {
        self.check_accept(offer, acting_user)
    }

    /// Cancellation is unconditional for a participant while active.
    pub fn check_cancel(&self, acting_user: Uuid) -> Result<(), TransitionError> {
        self.ensure_participant(acting_user)?;
        self.ensure_active()
    }
}

/// Resolve a requested response window against the configured default,
/// rejecting out-of-range overrides.
pub fn response_window_days(
    requested: Option<i64>,
    default_days: i64,
) -> Result<i64, TransitionError> {
    match requested {
        None => Ok(default_days),
        Some(d) if (RESPONSE_WINDOW_MIN_DAYS..=RESPONSE_WINDOW_MAX_DAYS).contains(&d) => Ok(d),
        Some(_) => Err(TransitionError::InvalidResponseWindow),
    }
}

/// Percentage change of `current` against `original`, defined as 0 when the
/// original price is zero.
pub fn price_change_percent(original: Decimal, current: Decimal) -> Decimal {
    if original.is_zero() {
        return Decimal::ZERO;
    }
    (current - original) / original * Decimal::from(100)
}

// ============================================================================
// Entities and DTOs
// ============================================================================

/// Negotiation thread entity
#[derive(Debug, Clone, Serialize)]
pub struct NegotiationThread {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub buyer_id: Uuid,
    pub vendor_id: Uuid,
    pub status: ThreadStatus,
    pub original_price: Decimal,
    pub current_price: Decimal,
    pub round_count: i32,
    pub max_rounds: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl NegotiationThread {
    pub fn state(&self) -> ThreadState {
        ThreadState {
            status: self.status,
            round_count: self.round_count,
            max_rounds: self.max_rounds,
            buyer_id: self.buyer_id,
            vendor_id: self.vendor_id,
        }
    }

    /// The other participant, for notification targeting.
    pub fn counterparty(&self, user: Uuid) -> Uuid {
        if user == self.buyer_id {
            self.vendor_id
        } else {
            self.buyer_id
        }
    }
}

/// Counter-offer entity
#[derive(Debug, Clone, Serialize)]
pub struct CounterOffer {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub proposed_by: Uuid,
    pub proposed_price: Decimal,
    pub scope_changes: Option<String>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub status: OfferStatus,
    pub superseded: bool,
    pub rejected_reason: Option<String>,
    pub response_by_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CounterOffer {
    pub fn state(&self) -> OfferState {
        OfferState {
            id: self.id,
            proposed_by: self.proposed_by,
            status: self.status,
            response_by_date: self.response_by_date,
        }
    }
}

/// Q&A item entity. Questions ride alongside the offer rounds and never
/// consume one.
#[derive(Debug, Clone, Serialize)]
pub struct QaItem {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub asked_by: Uuid,
    pub question: String,
    pub answer: Option<String>,
    pub answered_by: Option<Uuid>,
    pub answered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for opening a negotiation thread on a quote
#[derive(Debug, Clone, Deserialize)]
pub struct CreateThreadRequest {
    pub quote_id: Uuid,
    pub requested_by: Uuid,
}

/// Request DTO for submitting a counter-offer
#[derive(Debug, Clone, Deserialize)]
pub struct CounterOfferRequest {
    pub proposed_by: Uuid,
    pub proposed_price: Decimal,
    #[serde(default)]
    pub scope_changes: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub response_by_days: Option<i64>,
}

/// Request DTO for accepting an offer
#[derive(Debug, Clone, Deserialize)]
pub struct AcceptOfferRequest {
    pub acting_user: Uuid,
}

/// Request DTO for rejecting an offer
#[derive(Debug, Clone, Deserialize)]
pub struct RejectOfferRequest {
    pub acting_user: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request DTO for cancelling a thread
#[derive(Debug, Clone, Deserialize)]
pub struct CancelThreadRequest {
    pub acting_user: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Computed per-thread statistics for the detail view
#[derive(Debug, Clone, Serialize)]
pub struct ThreadStats {
    pub total_offers: usize,
    pub pending_offers: usize,
    pub accepted_offers: usize,
    pub rejected_offers: usize,
    pub total_questions: usize,
    pub answered_questions: usize,
    pub price_change_percent: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn buyer() -> Uuid {
        Uuid::from_u128(1)
    }

    fn vendor() -> Uuid {
        Uuid::from_u128(2)
    }

    fn stranger() -> Uuid {
        Uuid::from_u128(99)
    }

    fn active_thread(round_count: i32) -> ThreadState {
        ThreadState {
            status: ThreadStatus::Active,
            round_count,
            max_rounds: 3,
            buyer_id: buyer(),
            vendor_id: vendor(),
        }
    }

    fn pending_offer(proposed_by: Uuid) -> OfferState {
        OfferState {
            id: Uuid::from_u128(10),
            proposed_by,
            status: OfferStatus::Pending,
            response_by_date: Utc::now() + Duration::days(3),
        }
    }

    #[test]
    fn submit_allowed_for_participant_below_limit() {
        let thread = active_thread(1);
        assert!(thread.check_submit(vendor(), dec!(45000), None).is_ok());
    }

    #[test]
    fn submit_rejected_at_round_limit() {
        let thread = active_thread(3);
        let err = thread.check_submit(vendor(), dec!(45000), None).unwrap_err();
        assert_eq!(err, TransitionError::RoundLimitReached { max_rounds: 3 });
    }

    #[test]
    fn submit_rejected_for_non_participant() {
        let thread = active_thread(0);
        let err = thread
            .check_submit(stranger(), dec!(45000), None)
            .unwrap_err();
        assert_eq!(err, TransitionError::NotParticipant);
    }

    #[test]
    fn submit_rejected_on_terminal_thread() {
        let mut thread = active_thread(1);
        thread.status = ThreadStatus::Accepted;
        let err = thread.check_submit(vendor(), dec!(45000), None).unwrap_err();
        assert_eq!(err, TransitionError::ThreadClosed(ThreadStatus::Accepted));
    }

    #[test]
    fn submit_rejected_for_non_positive_price() {
        let thread = active_thread(0);
        let err = thread
            .check_submit(vendor(), Decimal::ZERO, None)
            .unwrap_err();
        assert_eq!(err, TransitionError::InvalidPrice);
    }

    #[test]
    fn cannot_stack_offer_on_own_pending_offer() {
        // Buyer countered at round 2 and tries to revise before the vendor
        // responds; the counter by the vendor is what supersedes instead.
        let thread = active_thread(2);
        let standing = pending_offer(buyer());
        let err = thread
            .check_submit(buyer(), dec!(49000), Some(&standing))
            .unwrap_err();
        assert_eq!(err, TransitionError::OwnOfferPending);

        // The vendor's counter is legal and supersedes the standing offer.
        assert!(thread
            .check_submit(vendor(), dec!(47000), Some(&standing))
            .is_ok());
    }

    #[test]
    fn accept_rejected_for_offer_author() {
        let thread = active_thread(1);
        let offer = pending_offer(vendor());
        let err = thread.check_accept(&offer, vendor()).unwrap_err();
        assert_eq!(err, TransitionError::OwnOffer);
    }

    #[test]
    fn accept_allowed_for_counterparty() {
        let thread = active_thread(1);
        let offer = pending_offer(vendor());
        assert!(thread.check_accept(&offer, buyer()).is_ok());
    }

    #[test]
    fn accept_allowed_at_round_limit() {
        // The round cap limits new offers, not resolution of the last one.
        let thread = active_thread(3);
        let offer = pending_offer(vendor());
        assert!(thread.check_accept(&offer, buyer()).is_ok());
    }

    #[test]
    fn accept_rejected_for_resolved_offer() {
        let thread = active_thread(1);
        let mut offer = pending_offer(vendor());
        offer.status = OfferStatus::Cancelled;
        let err = thread.check_accept(&offer, buyer()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::OfferNotPending(OfferStatus::Cancelled)
        );
    }

    #[test]
    fn terminal_thread_blocks_everything() {
        for status in [
            ThreadStatus::Accepted,
            ThreadStatus::Cancelled,
            ThreadStatus::Expired,
        ] {
            let mut thread = active_thread(1);
            thread.status = status;
            let offer = pending_offer(vendor());
            assert!(thread.check_submit(buyer(), dec!(1000), None).is_err());
            assert!(thread.check_accept(&offer, buyer()).is_err());
            assert!(thread.check_reject(&offer, buyer()).is_err());
            assert!(thread.check_cancel(buyer()).is_err());
        }
    }

    #[test]
    fn cancel_allowed_for_either_participant() {
        let thread = active_thread(2);
        assert!(thread.check_cancel(buyer()).is_ok());
        assert!(thread.check_cancel(vendor()).is_ok());
        assert_eq!(
            thread.check_cancel(stranger()).unwrap_err(),
            TransitionError::NotParticipant
        );
    }

    #[test]
    fn overdue_only_when_pending_and_past_deadline() {
        let now = Utc::now();
        let mut offer = pending_offer(vendor());
        offer.response_by_date = now - Duration::hours(1);
        assert!(offer.is_overdue(now));

        // Already expired offers are not overdue again; the sweep is a no-op.
        offer.status = OfferStatus::Expired;
        assert!(!offer.is_overdue(now));

        let mut future = pending_offer(vendor());
        future.response_by_date = now + Duration::hours(1);
        assert!(!future.is_overdue(now));
    }

    #[test]
    fn response_window_clamped_to_bounds() {
        assert_eq!(response_window_days(None, 3).unwrap(), 3);
        assert_eq!(response_window_days(Some(7), 3).unwrap(), 7);
        assert_eq!(
            response_window_days(Some(0), 3).unwrap_err(),
            TransitionError::InvalidResponseWindow
        );
        assert_eq!(
            response_window_days(Some(31), 3).unwrap_err(),
            TransitionError::InvalidResponseWindow
        );
    }

    #[test]
    fn price_change_percent_handles_zero_original() {
        assert_eq!(
            price_change_percent(Decimal::ZERO, dec!(100)),
            Decimal::ZERO
        );
        assert_eq!(price_change_percent(dec!(50000), dec!(45000)), dec!(-10));
        assert_eq!(price_change_percent(dec!(40000), dec!(50000)), dec!(25));
    }
}
