//! Service request records as seen by the index structures.
//!
//! The engine treats these as value records: every structure keeps its own
//! copy keyed by id, and only explicit update calls change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            address: String::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Coordinates as a (lat, lng) pair.
    pub fn coords(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// A single service request owned by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Unique id assigned by the store.
    pub id: u64,
    pub requester_id: u64,
    /// Category label, e.g. "Plumbing".
    pub service_type: String,
    #[serde(default)]
    pub description: String,
    pub submitted_at: DateTime<Utc>,
    /// Open status label, e.g. "Pending" or "In Process".
    pub status: String,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl ServiceRequest {
    /// Creates a request submitted now.
    pub fn new(id: u64, service_type: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id,
            requester_id: 0,
            service_type: service_type.into(),
            description: String::new(),
            submitted_at: Utc::now(),
            status: status.into(),
            completed_at: None,
            location: None,
        }
    }

    pub fn with_requester(mut self, requester_id: u64) -> Self {
        self.requester_id = requester_id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn submitted(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }

    pub fn completed(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Whole days elapsed between submission and `now`, never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.submitted_at).num_days().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age_days_counts_whole_days() {
        let now = Utc::now();
        let request = ServiceRequest::new(1, "Plumbing", "Pending").submitted(now - Duration::hours(50));
        assert_eq!(request.age_days(now), 2);
    }

    #[test]
    fn test_age_days_never_negative() {
        let now = Utc::now();
        let request = ServiceRequest::new(1, "Plumbing", "Pending").submitted(now + Duration::days(3));
        assert_eq!(request.age_days(now), 0);
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let json = r#"{
            "id": 7,
            "requester_id": 3,
            "service_type": "HVAC",
            "submitted_at": "2024-05-01T10:00:00Z",
            "status": "Pending"
        }"#;
        let request: ServiceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, 7);
        assert!(request.location.is_none());
        assert!(request.completed_at.is_none());
        assert!(request.description.is_empty());
    }
}
