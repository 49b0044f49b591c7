//! Vendor matching and ranking
//!
//! Pure, in-memory selection of the vendors an RFQ should be dispatched to.
//! Callers load the active vendor pool, run [`match_vendors`], and then
//! persist dispatch records and fire notifications per returned vendor.
//!
//! Selection is category first, county second. When the strict pass yields
//! fewer than [`MIN_PRIMARY_MATCHES`] vendors the county constraint is
//! dropped and the category pool is re-ranked on a reduced key set, so an
//! underserved county still gets a best-effort candidate list.

use std::cmp::Ordering;

use crate::domain::rfqs::MatchCriteria;
use crate::domain::vendors::{Vendor, VendorStatus};

/// Hard ceiling on vendors notified per dispatch pass.
pub const DISPATCH_CAP: usize = 8;

/// Below this many strict matches the location constraint is relaxed.
pub const MIN_PRIMARY_MATCHES: usize = 3;

/// Category compatibility seam. The default implementation matches
/// normalized slugs; a taxonomy-aware matcher can be swapped in without
/// touching the engine.
pub trait CategoryMatcher: Send + Sync {
    fn compatible(&self, vendor: &Vendor, category_slug: &str) -> bool;
}

/// Matches on normalized slugs against the vendor's primary and secondary
/// categories. Normalization tolerates case and `_`/`-` variance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlugCategoryMatcher;

fn normalize_slug(raw: &str) -> String {
    raw.trim().to_lowercase().replace('_', "-")
}

impl CategoryMatcher for SlugCategoryMatcher {
    fn compatible(&self, vendor: &Vendor, category_slug: &str) -> bool {
        let wanted = normalize_slug(category_slug);
        if wanted.is_empty() {
            return false;
        }
        if normalize_slug(&vendor.primary_category_slug) == wanted {
            return true;
        }
        vendor
            .secondary_category_slugs
            .iter()
            .any(|s| normalize_slug(s) == wanted)
    }
}

/// Result of a matching pass.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub candidates: Vec<Vendor>,
    /// True when the county filter was dropped to reach a usable list.
    pub location_relaxed: bool,
}

/// Full ranking key for the strict pass: verified first, then rating
/// descending, then average response time ascending with unmeasured vendors
/// last, then completed-RFQ count descending. Each key only breaks ties left
/// by the previous one; the sort itself is stable so equal vendors keep
/// their input order.
fn primary_rank(a: &Vendor, b: &Vendor) -> Ordering {
    b.verified
        .cmp(&a.verified)
        .then_with(|| b.rating.cmp(&a.rating))
        .then_with(|| {
            let ra = a.avg_response_hours.unwrap_or(i32::MAX);
            let rb = b.avg_response_hours.unwrap_or(i32::MAX);
            ra.cmp(&rb)
        })
        .then_with(|| b.rfqs_completed.cmp(&a.rfqs_completed))
}

/// Reduced key for the relaxed pass: verified first, then rating descending.
fn fallback_rank(a: &Vendor, b: &Vendor) -> Ordering {
    b.verified.cmp(&a.verified).then_with(|| b.rating.cmp(&a.rating))
}

/// Select and rank up to [`DISPATCH_CAP`] vendors for the given criteria.
/// Pure over its inputs; persisting the outcome belongs to the caller.
pub fn match_vendors(
    pool: &[Vendor],
    criteria: &MatchCriteria,
    matcher: &dyn CategoryMatcher,
) -> MatchOutcome {
    let category_pool: Vec<&Vendor> = pool
        .iter()
        .filter(|v| v.status == VendorStatus::Active)
        .filter(|v| matcher.compatible(v, &criteria.category_slug))
        .collect();

    let mut primary: Vec<&Vendor> = match &criteria.county {
        Some(county) => category_pool
            .iter()
            .copied()
            .filter(|v| v.serves_county(county))
            .collect(),
        None => category_pool.clone(),
    };
    primary.sort_by(|a, b| primary_rank(a, b));

    let relax = criteria.county.is_some() && primary.len() < MIN_PRIMARY_MATCHES;
    let (mut ranked, location_relaxed) = if relax {
        let mut widened = category_pool;
        widened.sort_by(|a, b| fallback_rank(a, b));
        (widened, true)
    } else {
        (primary, false)
    };

    ranked.truncate(DISPATCH_CAP);
    MatchOutcome {
        candidates: ranked.into_iter().cloned().collect(),
        location_relaxed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    struct VendorSpec {
        name: &'static str,
        category: &'static str,
        county: Option<&'static str>,
        service_counties: Vec<&'static str>,
        verified: bool,
        rating: Decimal,
        avg_response_hours: Option<i32>,
        rfqs_completed: i32,
        status: VendorStatus,
    }

    impl Default for VendorSpec {
        fn default() -> Self {
            Self {
                name: "vendor",
                category: "plumbing",
                county: Some("Nairobi"),
                service_counties: vec![],
                verified: false,
                rating: dec!(3.0),
                avg_response_hours: Some(24),
                rfqs_completed: 0,
                status: VendorStatus::Active,
            }
        }
    }

    fn vendor(spec: VendorSpec) -> Vendor {
        Vendor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            company_name: spec.name.to_string(),
            primary_category_slug: spec.category.to_string(),
            secondary_category_slugs: vec![],
            county: spec.county.map(String::from),
            service_counties: spec.service_counties.iter().map(|s| s.to_string()).collect(),
            verified: spec.verified,
            rating: spec.rating,
            avg_response_hours: spec.avg_response_hours,
            rfqs_completed: spec.rfqs_completed,
            status: spec.status,
            created_at: Utc::now(),
        }
    }

    fn criteria(category: &str, county: Option<&str>) -> MatchCriteria {
        MatchCriteria {
            category_slug: category.to_string(),
            county: county.map(String::from),
        }
    }

    fn names(outcome: &MatchOutcome) -> Vec<&str> {
        outcome
            .candidates
            .iter()
            .map(|v| v.company_name.as_str())
            .collect()
    }

    #[test]
    fn verified_vendors_rank_first_then_by_rating() {
        // Five Nairobi plumbers, two verified: the verified pair leads,
        // ordered by rating, with the rest behind also by rating.
        let pool = vec![
            vendor(VendorSpec { name: "u-high", rating: dec!(4.9), ..Default::default() }),
            vendor(VendorSpec { name: "v-low", verified: true, rating: dec!(4.0), ..Default::default() }),
            vendor(VendorSpec { name: "u-mid", rating: dec!(4.2), ..Default::default() }),
            vendor(VendorSpec { name: "v-high", verified: true, rating: dec!(4.7), ..Default::default() }),
            vendor(VendorSpec { name: "u-low", rating: dec!(3.1), ..Default::default() }),
        ];
        let outcome = match_vendors(&pool, &criteria("plumbing", Some("Nairobi")), &SlugCategoryMatcher);
        assert!(!outcome.location_relaxed);
        assert_eq!(names(&outcome), vec!["v-high", "v-low", "u-high", "u-mid", "u-low"]);
    }

    #[test]
    fn fallback_relaxes_location_when_too_few_strict_matches() {
        // One roofer, in the wrong county: the strict pass is empty, so the
        // county constraint is dropped and the roofer is still returned.
        let pool = vec![
            vendor(VendorSpec { name: "roofer", category: "roofing", county: Some("Mombasa"), ..Default::default() }),
            vendor(VendorSpec { name: "plumber", county: Some("Turkana"), ..Default::default() }),
        ];
        let outcome = match_vendors(&pool, &criteria("roofing", Some("Turkana")), &SlugCategoryMatcher);
        assert!(outcome.location_relaxed);
        assert_eq!(names(&outcome), vec!["roofer"]);
    }

    #[test]
    fn fallback_uses_reduced_ranking_keys() {
        // Two in-county matches is below the threshold; the widened pool is
        // ranked by verified-then-rating only, so response time no longer
        // separates vendors.
        let pool = vec![
            vendor(VendorSpec { name: "local-a", rating: dec!(4.0), avg_response_hours: Some(48), ..Default::default() }),
            vendor(VendorSpec { name: "remote", county: Some("Kisumu"), rating: dec!(4.0), avg_response_hours: Some(2), ..Default::default() }),
            vendor(VendorSpec { name: "local-b", rating: dec!(3.0), ..Default::default() }),
        ];
        let outcome = match_vendors(&pool, &criteria("plumbing", Some("Nairobi")), &SlugCategoryMatcher);
        assert!(outcome.location_relaxed);
        // Equal keys keep input order under the stable sort.
        assert_eq!(names(&outcome), vec!["local-a", "remote", "local-b"]);
    }

    #[test]
    fn result_is_capped_at_dispatch_limit() {
        let pool: Vec<Vendor> = (0..12)
            .map(|i| {
                vendor(VendorSpec {
                    rating: Decimal::from(i),
                    ..Default::default()
                })
            })
            .collect();
        let outcome = match_vendors(&pool, &criteria("plumbing", Some("Nairobi")), &SlugCategoryMatcher);
        assert_eq!(outcome.candidates.len(), DISPATCH_CAP);
        // Highest ratings survive the cut.
        assert_eq!(outcome.candidates[0].rating, dec!(11));
    }

    #[test]
    fn unmeasured_response_time_ranks_last_within_tier() {
        let pool = vec![
            vendor(VendorSpec { name: "unmeasured", avg_response_hours: None, ..Default::default() }),
            vendor(VendorSpec { name: "slow", avg_response_hours: Some(72), ..Default::default() }),
            vendor(VendorSpec { name: "fast", avg_response_hours: Some(4), ..Default::default() }),
        ];
        let outcome = match_vendors(&pool, &criteria("plumbing", Some("Nairobi")), &SlugCategoryMatcher);
        assert_eq!(names(&outcome), vec!["fast", "slow", "unmeasured"]);
    }

    #[test]
    fn completed_rfqs_break_remaining_ties() {
        let pool = vec![
            vendor(VendorSpec { name: "junior", rfqs_completed: 3, ..Default::default() }),
            vendor(VendorSpec { name: "veteran", rfqs_completed: 40, ..Default::default() }),
        ];
        let outcome = match_vendors(&pool, &criteria("plumbing", Some("Nairobi")), &SlugCategoryMatcher);
        assert_eq!(names(&outcome), vec!["veteran", "junior"]);
    }

    #[test]
    fn suspended_vendors_are_never_matched() {
        let pool = vec![
            vendor(VendorSpec { name: "suspended", status: VendorStatus::Suspended, ..Default::default() }),
            vendor(VendorSpec { name: "pending", status: VendorStatus::Pending, ..Default::default() }),
        ];
        let outcome = match_vendors(&pool, &criteria("plumbing", Some("Nairobi")), &SlugCategoryMatcher);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn empty_category_pool_yields_empty_outcome() {
        let pool = vec![vendor(VendorSpec::default())];
        let outcome = match_vendors(&pool, &criteria("electrical", Some("Nairobi")), &SlugCategoryMatcher);
        assert!(outcome.candidates.is_empty());
        assert!(outcome.location_relaxed);
    }

    #[test]
    fn service_counties_and_slug_variants_count_as_matches() {
        let mut v = vendor(VendorSpec {
            name: "wide",
            category: "Interior_Design",
            county: Some("Kiambu"),
            service_counties: vec!["nairobi"],
            verified: true,
            ..Default::default()
        });
        v.secondary_category_slugs = vec!["plumbing".to_string()];
        let pool = vec![
            v,
            vendor(VendorSpec { name: "a", ..Default::default() }),
            vendor(VendorSpec { name: "b", ..Default::default() }),
        ];

        // Secondary category plus declared service county, case-insensitive.
        let outcome = match_vendors(&pool, &criteria("plumbing", Some("NAIROBI")), &SlugCategoryMatcher);
        assert!(!outcome.location_relaxed);
        assert_eq!(names(&outcome)[0], "wide");

        // Primary category matches across slug spelling variance.
        let outcome = match_vendors(&pool, &criteria("interior-design", None), &SlugCategoryMatcher);
        assert_eq!(names(&outcome), vec!["wide"]);
    }

    #[test]
    fn no_county_on_rfq_skips_location_filtering() {
        let pool = vec![
            vendor(VendorSpec { name: "anywhere", county: None, ..Default::default() }),
        ];
        let outcome = match_vendors(&pool, &criteria("plumbing", None), &SlugCategoryMatcher);
        assert!(!outcome.location_relaxed);
        assert_eq!(names(&outcome), vec!["anywhere"]);
    }
}
