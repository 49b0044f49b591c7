//! Negotiation audit trail
//!
//! Read-only assembly of a thread's history into one chronological sequence.
//! Nothing here mutates state; the timeline is recomputed from the thread,
//! its offers, and its Q&A on every request.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::negotiations::{
    price_change_percent, CounterOffer, NegotiationThread, OfferStatus, QaItem, ThreadStats,
    ThreadStatus,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TimelineEvent {
    Started {
        at: DateTime<Utc>,
        original_price: Decimal,
    },
    Offer {
        at: DateTime<Utc>,
        offer_id: Uuid,
        proposed_by: Uuid,
        proposed_price: Decimal,
        status: OfferStatus,
        superseded: bool,
    },
    OfferResolved {
        at: DateTime<Utc>,
        offer_id: Uuid,
        status: OfferStatus,
    },
    Question {
        at: DateTime<Utc>,
        qa_id: Uuid,
        asked_by: Uuid,
    },
    Answer {
        at: DateTime<Utc>,
        qa_id: Uuid,
        answered_by: Uuid,
    },
    Closed {
        at: DateTime<Utc>,
        status: ThreadStatus,
    },
}

impl TimelineEvent {
    fn at(&self) -> DateTime<Utc> {
        match self {
            TimelineEvent::Started { at, .. }
            | TimelineEvent::Offer { at, .. }
            | TimelineEvent::OfferResolved { at, .. }
            | TimelineEvent::Question { at, .. }
            | TimelineEvent::Answer { at, .. }
            | TimelineEvent::Closed { at, .. } => *at,
        }
    }
}

/// Merge thread, offers, and Q&A into one strictly chronological sequence.
/// The sort is stable, so events sharing a timestamp keep the order they
/// were recorded in.
pub fn build_timeline(
    thread: &NegotiationThread,
    offers: &[CounterOffer],
    qa: &[QaItem],
) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(2 + offers.len() * 2 + qa.len() * 2);

    events.push(TimelineEvent::Started {
        at: thread.created_at,
        original_price: thread.original_price,
    });

    for offer in offers {
        events.push(TimelineEvent::Offer {
            at: offer.created_at,
            offer_id: offer.id,
            proposed_by: offer.proposed_by,
            proposed_price: offer.proposed_price,
            status: offer.status,
            superseded: offer.superseded,
        });
        let resolved = matches!(offer.status, OfferStatus::Accepted | OfferStatus::Rejected);
        if resolved && offer.updated_at != offer.created_at {
            events.push(TimelineEvent::OfferResolved {
                at: offer.updated_at,
                offer_id: offer.id,
                status: offer.status,
            });
        }
    }

    for item in qa {
        events.push(TimelineEvent::Question {
            at: item.created_at,
            qa_id: item.id,
            asked_by: item.asked_by,
        });
        if let (Some(answered_at), Some(answered_by)) = (item.answered_at, item.answered_by) {
            events.push(TimelineEvent::Answer {
                at: answered_at,
                qa_id: item.id,
                answered_by,
            });
        }
    }

    if matches!(thread.status, ThreadStatus::Cancelled | ThreadStatus::Expired) {
        events.push(TimelineEvent::Closed {
            at: thread.closed_at.unwrap_or(thread.updated_at),
            status: thread.status,
        });
    }

    events.sort_by_key(|e| e.at());
    events
}

/// Summary counters for the thread detail view.
pub fn thread_stats(
    thread: &NegotiationThread,
    offers: &[CounterOffer],
    qa: &[QaItem],
) -> ThreadStats {
    ThreadStats {
        total_offers: offers.len(),
        pending_offers: offers
            .iter()
            .filter(|o| o.status == OfferStatus::Pending)
            .count(),
        accepted_offers: offers
            .iter()
            .filter(|o| o.status == OfferStatus::Accepted)
            .count(),
        rejected_offers: offers
            .iter()
            .filter(|o| o.status == OfferStatus::Rejected)
            .count(),
        total_questions: qa.len(),
        answered_questions: qa.iter().filter(|q| q.answer.is_some()).count(),
        price_change_percent: price_change_percent(thread.original_price, thread.current_price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn base_time() -> DateTime<Utc> {
        "2026-03-01T09:00:00Z".parse().unwrap()
    }

    fn thread(status: ThreadStatus) -> NegotiationThread {
        let t0 = base_time();
        NegotiationThread {
            id: Uuid::from_u128(1),
            quote_id: Uuid::from_u128(2),
            buyer_id: Uuid::from_u128(3),
            vendor_id: Uuid::from_u128(4),
            status,
            original_price: dec!(50000),
            current_price: dec!(45000),
            round_count: 1,
            max_rounds: 3,
            created_at: t0,
            updated_at: t0,
            closed_at: None,
        }
    }

    fn offer(minutes: i64, status: OfferStatus) -> CounterOffer {
        let at = base_time() + Duration::minutes(minutes);
        CounterOffer {
            id: Uuid::new_v4(),
            thread_id: Uuid::from_u128(1),
            proposed_by: Uuid::from_u128(3),
            proposed_price: dec!(45000),
            scope_changes: None,
            delivery_date: None,
            payment_terms: None,
            notes: None,
            status,
            superseded: false,
            rejected_reason: None,
            response_by_date: at + Duration::days(3),
            created_at: at,
            updated_at: at,
        }
    }

    fn question(minutes: i64) -> QaItem {
        QaItem {
            id: Uuid::new_v4(),
            thread_id: Uuid::from_u128(1),
            asked_by: Uuid::from_u128(3),
            question: "Does the price include materials?".to_string(),
            answer: None,
            answered_by: None,
            answered_at: None,
            created_at: base_time() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn timeline_is_chronological_across_sources() {
        let t = thread(ThreadStatus::Active);
        let offers = vec![offer(30, OfferStatus::Pending)];
        let mut q = question(10);
        q.answer = Some("Yes, materials included.".to_string());
        q.answered_by = Some(Uuid::from_u128(4));
        q.answered_at = Some(base_time() + Duration::minutes(45));

        let events = build_timeline(&t, &offers, &[q]);
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                TimelineEvent::Started { .. } => "started",
                TimelineEvent::Offer { .. } => "offer",
                TimelineEvent::OfferResolved { .. } => "resolved",
                TimelineEvent::Question { .. } => "question",
                TimelineEvent::Answer { .. } => "answer",
                TimelineEvent::Closed { .. } => "closed",
            })
            .collect();
        assert_eq!(kinds, vec!["started", "question", "offer", "answer"]);
    }

    #[test]
    fn resolution_event_only_when_timestamps_differ() {
        let t = thread(ThreadStatus::Accepted);
        let mut accepted_later = offer(10, OfferStatus::Accepted);
        accepted_later.updated_at = accepted_later.created_at + Duration::hours(2);
        let accepted_instantly = offer(20, OfferStatus::Accepted);

        let events = build_timeline(&t, &[accepted_later.clone(), accepted_instantly], &[]);
        let resolved: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, TimelineEvent::OfferResolved { .. }))
            .collect();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].at(), accepted_later.updated_at);
    }

    #[test]
    fn closed_threads_end_with_a_closure_event() {
        let mut t = thread(ThreadStatus::Expired);
        t.closed_at = Some(base_time() + Duration::days(3));
        let events = build_timeline(&t, &[offer(5, OfferStatus::Expired)], &[]);
        match events.last().unwrap() {
            TimelineEvent::Closed { status, at } => {
                assert_eq!(*status, ThreadStatus::Expired);
                assert_eq!(*at, t.closed_at.unwrap());
            }
            other => panic!("expected closure event, got {:?}", other),
        }
    }

    #[test]
    fn equal_timestamps_keep_recording_order() {
        // An offer and a question at the identical instant: the offer was
        // pushed first, so it stays first.
        let t = thread(ThreadStatus::Active);
        let events = build_timeline(&t, &[offer(15, OfferStatus::Pending)], &[question(15)]);
        assert!(matches!(events[1], TimelineEvent::Offer { .. }));
        assert!(matches!(events[2], TimelineEvent::Question { .. }));
    }

    #[test]
    fn stats_count_offers_questions_and_price_movement() {
        let t = thread(ThreadStatus::Active);
        let offers = vec![
            offer(5, OfferStatus::Cancelled),
            offer(10, OfferStatus::Pending),
        ];
        let mut answered = question(7);
        answered.answer = Some("Labour only.".to_string());
        answered.answered_by = Some(Uuid::from_u128(4));
        answered.answered_at = Some(base_time() + Duration::minutes(9));
        let qa = vec![answered, question(12)];

        let stats = thread_stats(&t, &offers, &qa);
        assert_eq!(stats.total_offers, 2);
        assert_eq!(stats.pending_offers, 1);
        assert_eq!(stats.accepted_offers, 0);
        assert_eq!(stats.total_questions, 2);
        assert_eq!(stats.answered_questions, 1);
        assert_eq!(stats.price_change_percent, dec!(-10));
    }

    #[test]
    fn zero_original_price_reports_zero_change() {
        let mut t = thread(ThreadStatus::Active);
        t.original_price = Decimal::ZERO;
        let stats = thread_stats(&t, &[], &[]);
        assert_eq!(stats.price_change_percent, Decimal::ZERO);
    }
}
