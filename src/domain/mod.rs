//! Domain types and DTOs
//!
//! These types define the data structures for marketplace entities:
//! vendors, RFQs, dispatch records, quotes and the negotiation engine.

pub mod dispatch;
pub mod negotiations;
pub mod notifications;
pub mod quotes;
pub mod rfqs;
pub mod vendors;
