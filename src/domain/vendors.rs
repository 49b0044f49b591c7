//! Vendor domain types
//!
//! Vendors are read-only inputs to the matching engine; their profiles are
//! managed elsewhere (registration, verification, reviews).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Vendor account status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Active,
    Suspended,
    Pending,
}

impl std::fmt::Display for VendorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VendorStatus::Active => write!(f, "active"),
            VendorStatus::Suspended => write!(f, "suspended"),
            VendorStatus::Pending => write!(f, "pending"),
        }
    }
}

impl FromStr for VendorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "pending" => Ok(Self::Pending),
            other => Err(format!("unknown vendor status: {other}")),
        }
    }
}

/// Vendor profile as seen by the matching engine
#[derive(Debug, Clone, Serialize)]
pub struct Vendor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub primary_category_slug: String,
    pub secondary_category_slugs: Vec<String>,
    pub county: Option<String>,
    pub service_counties: Vec<String>,
    pub verified: bool,
    pub rating: Decimal,
    /// Average hours to first response; `None` when never measured.
    pub avg_response_hours: Option<i32>,
    pub rfqs_completed: i32,
    pub status: VendorStatus,
    pub created_at: DateTime<Utc>,
}

impl Vendor {
    /// County coverage check: primary county or any declared service county,
    /// case-insensitive.
    pub fn serves_county(&self, county: &str) -> bool {
        let wanted = county.trim().to_lowercase();
        if wanted.is_empty() {
            return false;
        }
        if let Some(own) = &self.county {
            if own.trim().to_lowercase() == wanted {
                return true;
            }
        }
        self.service_counties
            .iter()
            .any(|c| c.trim().to_lowercase() == wanted)
    }
}
