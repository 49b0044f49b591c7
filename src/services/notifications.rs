//! Notification service
//!
//! Dispatch and negotiation flows raise notifications through the
//! [`NotificationSink`] seam. The default sink writes in-app notification
//! rows; tests substitute a recording sink. Delivery is best-effort: a sink
//! failure is logged and the calling flow carries on.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::notifications::{NotificationType, OutboundNotification};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, outbound: OutboundNotification) -> anyhow::Result<()>;
}

/// Sink backed by the `notifications` table.
pub struct PgNotificationSink {
    db: PgPool,
}

impl PgNotificationSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(&self, outbound: OutboundNotification) -> anyhow::Result<()> {
        let id = Uuid::new_v4();
        let type_str = outbound.notification_type.to_string();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(outbound.user_id)
        .bind(&type_str)
        .bind(&outbound.title)
        .bind(&outbound.message)
        .bind(&outbound.data)
        .execute(&self.db)
        .await?;

        tracing::info!(
            user_id = %outbound.user_id,
            notification_type = %type_str,
            notification_id = %id,
            "Notification created"
        );

        Ok(())
    }
}

/// Deliver one notification, swallowing and logging any sink failure.
pub async fn deliver(sink: &dyn NotificationSink, outbound: OutboundNotification) {
    let user_id = outbound.user_id;
    let type_str = outbound.notification_type.to_string();
    if let Err(err) = sink.notify(outbound).await {
        tracing::warn!(
            user_id = %user_id,
            notification_type = %type_str,
            error = %err,
            "Notification delivery failed"
        );
    }
}

/// Notify a vendor that an RFQ was dispatched to them.
pub async fn notify_rfq_received(
    sink: &dyn NotificationSink,
    vendor_user_id: Uuid,
    rfq_id: Uuid,
    rfq_title: &str,
    location_relaxed: bool,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: vendor_user_id,
            notification_type: NotificationType::RfqReceived,
            title: format!("New RFQ: {}", rfq_title),
            message: Some("You have been matched to a new request for quote.".to_string()),
            data: serde_json::json!({
                "rfq_id": rfq_id,
                "rfq_title": rfq_title,
                "location_relaxed": location_relaxed,
            }),
        },
    )
    .await;
}

/// Notify the buyer how many vendors their RFQ reached.
pub async fn notify_rfq_sent(
    sink: &dyn NotificationSink,
    buyer_id: Uuid,
    rfq_id: Uuid,
    rfq_title: &str,
    vendor_count: usize,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: buyer_id,
            notification_type: NotificationType::RfqSent,
            title: format!("Your RFQ was sent to {} vendors", vendor_count),
            message: Some(format!(
                "'{}' has been dispatched. Quotes will appear as vendors respond.",
                rfq_title
            )),
            data: serde_json::json!({
                "rfq_id": rfq_id,
                "rfq_title": rfq_title,
                "vendor_count": vendor_count,
            }),
        },
    )
    .await;
}

/// Notify operators that auto-matching found nobody for an RFQ.
pub async fn notify_admin_intervention(
    sink: &dyn NotificationSink,
    admin_user_id: Uuid,
    rfq_id: Uuid,
    rfq_title: &str,
    category_slug: &str,
    county: Option<&str>,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: admin_user_id,
            notification_type: NotificationType::AdminRfqIntervention,
            title: "RFQ needs manual matching".to_string(),
            message: Some(format!(
                "No vendors matched '{}' ({} / {}). Assign vendors manually.",
                rfq_title,
                category_slug,
                county.unwrap_or("any county"),
            )),
            data: serde_json::json!({
                "rfq_id": rfq_id,
                "rfq_title": rfq_title,
                "category_slug": category_slug,
                "county": county,
            }),
        },
    )
    .await;
}

/// Notify a vendor that an operator matched them to an RFQ by hand.
pub async fn notify_admin_matched(
    sink: &dyn NotificationSink,
    vendor_user_id: Uuid,
    rfq_id: Uuid,
    rfq_title: &str,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: vendor_user_id,
            notification_type: NotificationType::RfqAdminMatched,
            title: format!("New RFQ: {}", rfq_title),
            message: Some("Our team matched you to this request for quote.".to_string()),
            data: serde_json::json!({
                "rfq_id": rfq_id,
                "rfq_title": rfq_title,
            }),
        },
    )
    .await;
}

/// Notify the buyer that a vendor submitted a quote.
pub async fn notify_quote_received(
    sink: &dyn NotificationSink,
    buyer_id: Uuid,
    rfq_id: Uuid,
    rfq_title: &str,
    vendor_name: &str,
    price: Decimal,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: buyer_id,
            notification_type: NotificationType::QuoteReceived,
            title: format!("New quote on {}", rfq_title),
            message: Some(format!("{} quoted {}", vendor_name, price)),
            data: serde_json::json!({
                "rfq_id": rfq_id,
                "rfq_title": rfq_title,
                "vendor_name": vendor_name,
                "price": price,
            }),
        },
    )
    .await;
}

/// Notify the counterparty that a new counter-offer is waiting on them.
pub async fn notify_counter_offer(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    offer_id: Uuid,
    proposed_price: Decimal,
    round: i32,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::CounterOffer,
            title: format!("Counter-offer: {}", proposed_price),
            message: Some(format!(
                "Round {}: a revised offer of {} awaits your response.",
                round, proposed_price
            )),
            data: serde_json::json!({
                "thread_id": thread_id,
                "offer_id": offer_id,
                "proposed_price": proposed_price,
                "round": round,
            }),
        },
    )
    .await;
}

/// Notify the offer's author that it was accepted.
pub async fn notify_offer_accepted(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    offer_id: Uuid,
    agreed_price: Decimal,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::OfferAccepted,
            title: "Offer accepted".to_string(),
            message: Some(format!(
                "Agreement reached at {}. A job order has been created.",
                agreed_price
            )),
            data: serde_json::json!({
                "thread_id": thread_id,
                "offer_id": offer_id,
                "agreed_price": agreed_price,
            }),
        },
    )
    .await;
}

/// Notify the offer's author that it was rejected.
pub async fn notify_offer_rejected(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    offer_id: Uuid,
    reason: Option<&str>,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::OfferRejected,
            title: "Offer rejected".to_string(),
            message: Some(match reason {
                Some(r) => format!("Your offer was rejected: {}", r),
                None => "Your offer was rejected. The negotiation remains open.".to_string(),
            }),
            data: serde_json::json!({
                "thread_id": thread_id,
                "offer_id": offer_id,
                "reason": reason,
            }),
        },
    )
    .await;
}

/// Notify both parties that the thread expired from inaction.
pub async fn notify_offer_expired(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    offer_id: Uuid,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::OfferExpired,
            title: "Negotiation expired".to_string(),
            message: Some(
                "The pending offer passed its response deadline and the negotiation was closed."
                    .to_string(),
            ),
            data: serde_json::json!({
                "thread_id": thread_id,
                "offer_id": offer_id,
            }),
        },
    )
    .await;
}

/// Notify the counterparty that the thread was cancelled.
pub async fn notify_negotiation_cancelled(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    reason: Option<&str>,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::NegotiationCancelled,
            title: "Negotiation cancelled".to_string(),
            message: reason.map(|r| format!("Reason: {}", r)),
            data: serde_json::json!({
                "thread_id": thread_id,
                "reason": reason,
            }),
        },
    )
    .await;
}

/// Notify the counterparty about a new question on the thread.
pub async fn notify_qa_question(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    qa_id: Uuid,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::QaQuestion,
            title: "New question on your negotiation".to_string(),
            message: None,
            data: serde_json::json!({
                "thread_id": thread_id,
                "qa_id": qa_id,
            }),
        },
    )
    .await;
}

/// Notify the asker that their question was answered.
pub async fn notify_qa_answer(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    qa_id: Uuid,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::QaAnswer,
            title: "Your question was answered".to_string(),
            message: None,
            data: serde_json::json!({
                "thread_id": thread_id,
                "qa_id": qa_id,
            }),
        },
    )
    .await;
}

/// Notify a party that the job order was created from the accepted offer.
pub async fn notify_job_order_created(
    sink: &dyn NotificationSink,
    recipient_id: Uuid,
    thread_id: Uuid,
    job_order_id: Uuid,
    agreed_price: Decimal,
) {
    deliver(
        sink,
        OutboundNotification {
            user_id: recipient_id,
            notification_type: NotificationType::JobOrderCreated,
            title: "Job order created".to_string(),
            message: Some(format!("Work can begin at the agreed price of {}.", agreed_price)),
            data: serde_json::json!({
                "thread_id": thread_id,
                "job_order_id": job_order_id,
                "agreed_price": agreed_price,
            }),
        },
    )
    .await;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records everything it is asked to deliver.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<OutboundNotification>>,
        pub fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, outbound: OutboundNotification) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("sink unavailable");
            }
            self.sent.lock().unwrap().push(outbound);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn helpers_target_the_right_recipient_and_type() {
        let sink = RecordingSink::default();
        let recipient = Uuid::new_v4();
        let thread_id = Uuid::new_v4();
        let offer_id = Uuid::new_v4();

        notify_counter_offer(&sink, recipient, thread_id, offer_id, dec!(45000), 2).await;
        notify_offer_accepted(&sink, recipient, thread_id, offer_id, dec!(45000)).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].user_id, recipient);
        assert_eq!(sent[0].notification_type, NotificationType::CounterOffer);
        assert_eq!(sent[0].data["round"], 2);
        assert_eq!(sent[1].notification_type, NotificationType::OfferAccepted);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        // Must not panic or propagate.
        notify_qa_question(&sink, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
