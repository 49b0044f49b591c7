//! RFQ domain types
//!
//! An RFQ (request for quote) is a buyer's posted need. The core reads RFQs
//! and moves their status along the dispatch lifecycle; creation and
//! approval wizards live outside this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    Draft,
    Pending,
    /// Auto-match found nobody; an operator must assign vendors by hand.
    NeedsAdminReview,
    Open,
    Closed,
    Rejected,
    Expired,
}

impl std::fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RfqStatus::Draft => write!(f, "draft"),
            RfqStatus::Pending => write!(f, "pending"),
            RfqStatus::NeedsAdminReview => write!(f, "needs_admin_review"),
            RfqStatus::Open => write!(f, "open"),
            RfqStatus::Closed => write!(f, "closed"),
            RfqStatus::Rejected => write!(f, "rejected"),
            RfqStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for RfqStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "needs_admin_review" => Ok(Self::NeedsAdminReview),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown rfq status: {other}")),
        }
    }
}

impl RfqStatus {
    /// Statuses from which a matching pass may be started.
    pub fn dispatchable(&self) -> bool {
        matches!(self, Self::Pending | Self::NeedsAdminReview | Self::Open)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RfqType {
    Direct,
    Matched,
    Public,
}

impl std::fmt::Display for RfqType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RfqType::Direct => write!(f, "direct"),
            RfqType::Matched => write!(f, "matched"),
            RfqType::Public => write!(f, "public"),
        }
    }
}

impl FromStr for RfqType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "matched" => Ok(Self::Matched),
            "public" => Ok(Self::Public),
            other => Err(format!("unknown rfq type: {other}")),
        }
    }
}

/// RFQ entity
#[derive(Debug, Clone, Serialize)]
pub struct Rfq {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category_slug: String,
    pub county: Option<String>,
    pub urgent: bool,
    pub rfq_type: RfqType,
    pub status: RfqStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of an RFQ the matching engine cares about.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pub category_slug: String,
    pub county: Option<String>,
}

impl From<&Rfq> for MatchCriteria {
    fn from(rfq: &Rfq) -> Self {
        Self {
            category_slug: rfq.category_slug.clone(),
            county: rfq.county.clone(),
        }
    }
}
