//! Service layer modules.
//!
//! Pure matching/ranking, notification fan-out, offer expiry, timeline
//! assembly, and job order creation. Route handlers own the HTTP surface and
//! call into here.

pub mod audit;
pub mod expiry;
pub mod job_orders;
pub mod matching;
pub mod notifications;

pub use notifications::NotificationSink;
