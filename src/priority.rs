//! Urgency scoring shared by the priority queue and the route optimizer.
//!
//! Lower scores are more urgent. The score is derived on demand from the
//! request's status, category and age; it is never stored on the request.

use chrono::{DateTime, Utc};

use crate::request::ServiceRequest;

/// Status labels in urgency order.
pub const STATUS_ORDER: [&str; 8] = [
    "Critical",
    "Urgent",
    "High",
    "InProcess",
    "Pending",
    "Low",
    "Completed",
    "Cancelled",
];

/// Service categories in urgency order.
pub const SERVICE_TYPE_ORDER: [&str; 8] = [
    "Emergency",
    "Electrical",
    "Plumbing",
    "HVAC",
    "Security",
    "Maintenance",
    "IT Support",
    "Cleaning",
];

/// Rank given to labels missing from a table.
const UNKNOWN_RANK: i64 = 4;

/// Age window (days) over which older requests earn a smaller score.
const AGE_WINDOW_DAYS: i64 = 30;

/// Lowercases and strips separators so "In Process" and "in_process" compare equal.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// True when two labels name the same status or category.
pub fn labels_match(a: &str, b: &str) -> bool {
    normalize_label(a) == normalize_label(b)
}

fn rank_in(table: &[&str], label: &str) -> i64 {
    let wanted = normalize_label(label);
    table
        .iter()
        .position(|entry| normalize_label(entry) == wanted)
        .map(|rank| rank as i64)
        .unwrap_or(UNKNOWN_RANK)
}

pub fn status_rank(status: &str) -> i64 {
    rank_in(&STATUS_ORDER, status)
}

pub fn service_type_rank(service_type: &str) -> i64 {
    rank_in(&SERVICE_TYPE_ORDER, service_type)
}

/// Completed and cancelled requests are closed; everything else is open.
pub fn is_closed(status: &str) -> bool {
    let rank = status_rank(status);
    rank == status_rank("Completed") || rank == status_rank("Cancelled")
}

/// Critical, Urgent and High.
pub fn is_urgent(status: &str) -> bool {
    status_rank(status) <= status_rank("High")
}

/// `1000 * statusRank + 100 * typeRank + max(0, 30 - ageDays)`.
pub fn priority_score(request: &ServiceRequest, now: DateTime<Utc>) -> i64 {
    let age_bonus = (AGE_WINDOW_DAYS - request.age_days(now)).max(0);
    1000 * status_rank(&request.status) + 100 * service_type_rank(&request.service_type) + age_bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_normalization() {
        assert_eq!(status_rank("In Process"), 3);
        assert_eq!(status_rank("in_process"), 3);
        assert_eq!(status_rank("CRITICAL"), 0);
    }

    #[test]
    fn test_unknown_labels_fall_back_to_mid_table() {
        assert_eq!(status_rank("Waiting on parts"), 4);
        assert_eq!(service_type_rank("Pest Control"), 4);
    }

    #[test]
    fn test_status_dominates_category() {
        let now = Utc::now();
        let critical_cleaning = ServiceRequest::new(1, "Cleaning", "Critical");
        let urgent_emergency = ServiceRequest::new(2, "Emergency", "Urgent");
        assert!(priority_score(&critical_cleaning, now) < priority_score(&urgent_emergency, now));
    }

    #[test]
    fn test_older_request_scores_lower() {
        let now = Utc::now();
        let fresh = ServiceRequest::new(1, "Plumbing", "Pending").submitted(now);
        let old = ServiceRequest::new(2, "Plumbing", "Pending").submitted(now - Duration::days(10));
        assert_eq!(priority_score(&fresh, now) - priority_score(&old, now), 10);
    }

    #[test]
    fn test_age_bonus_floors_at_zero() {
        let now = Utc::now();
        let ancient = ServiceRequest::new(1, "Plumbing", "Pending").submitted(now - Duration::days(400));
        assert_eq!(priority_score(&ancient, now), 1000 * 4 + 100 * 2);
    }

    #[test]
    fn test_closed_and_urgent_sets() {
        assert!(is_closed("Completed"));
        assert!(is_closed("cancelled"));
        assert!(!is_closed("Pending"));
        assert!(is_urgent("High"));
        assert!(is_urgent("critical"));
        assert!(!is_urgent("Pending"));
        assert!(!is_urgent("something else"));
    }
}
