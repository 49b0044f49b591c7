//! Quote domain types
//!
//! A quote is a vendor's priced response to an RFQ. One quote per
//! (RFQ, vendor) pair, enforced by a unique constraint.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Submitted,
    Accepted,
    Rejected,
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteStatus::Submitted => write!(f, "submitted"),
            QuoteStatus::Accepted => write!(f, "accepted"),
            QuoteStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown quote status: {other}")),
        }
    }
}

/// Quote entity
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub id: Uuid,
    pub rfq_id: Uuid,
    pub vendor_id: Uuid,
    pub price: Decimal,
    pub delivery_terms: Option<String>,
    pub inclusions: Option<String>,
    pub exclusions: Option<String>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for submitting a quote
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuoteRequest {
    pub vendor_id: Uuid,
    pub price: Decimal,
    #[serde(default)]
    pub delivery_terms: Option<String>,
    #[serde(default)]
    pub inclusions: Option<String>,
    #[serde(default)]
    pub exclusions: Option<String>,
}
