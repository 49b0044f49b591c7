//! Notification domain types
//!
//! In-app notification records written by the dispatch and negotiation
//! flows. Delivery is best-effort and never blocks the flow that raised it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    // Dispatch
    RfqReceived,
    RfqSent,
    RfqAdminMatched,
    AdminRfqIntervention,

    // Quotes
    QuoteReceived,

    // Negotiation
    CounterOffer,
    OfferAccepted,
    OfferRejected,
    OfferExpired,
    NegotiationCancelled,
    QaQuestion,
    QaAnswer,
    JobOrderCreated,

    // System
    System,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

impl From<String> for NotificationType {
    fn from(s: String) -> Self {
        serde_json::from_str(&format!("\"{}\"", s)).unwrap_or(NotificationType::System)
    }
}

/// A notification about to be delivered, before it has an id or timestamp.
#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub data: serde_json::Value,
}
