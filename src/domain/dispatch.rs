//! Dispatch domain types
//!
//! A dispatch record links one RFQ to one notified vendor. Records are the
//! source of truth for who was invited; notifications are best-effort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Pending,
    Sent,
    Viewed,
    Responded,
    Cancelled,
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchStatus::Pending => write!(f, "pending"),
            DispatchStatus::Sent => write!(f, "sent"),
            DispatchStatus::Viewed => write!(f, "viewed"),
            DispatchStatus::Responded => write!(f, "responded"),
            DispatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for DispatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "viewed" => Ok(Self::Viewed),
            "responded" => Ok(Self::Responded),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown dispatch status: {other}")),
        }
    }
}

/// How a vendor ended up on the dispatch list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    Auto,
    Manual,
}

impl std::fmt::Display for DispatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchKind::Auto => write!(f, "auto"),
            DispatchKind::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for DispatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown dispatch kind: {other}")),
        }
    }
}

/// Dispatch record response
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecordResponse {
    pub id: Uuid,
    pub rfq_id: Uuid,
    pub vendor_id: Uuid,
    pub company_name: String,
    pub dispatch_kind: DispatchKind,
    pub status: DispatchStatus,
    pub location_relaxed: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of a dispatch pass, reportable even when empty.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub rfq_id: Uuid,
    pub dispatched: usize,
    pub location_relaxed: bool,
    pub needs_admin_review: bool,
}
