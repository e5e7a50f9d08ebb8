//! Test fixtures for request-index.
//!
//! Provides realistic test data including:
//! - Real Las Vegas / Henderson sites (from OpenStreetMap)
//! - A builder for service requests with sensible defaults

#![allow(dead_code)]

pub mod sites;

pub use sites::*;

use chrono::{Duration, Utc};
use request_index::{Location, ServiceRequest};

/// Builder for test requests with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestRequest {
    id: u64,
    service_type: String,
    status: String,
    age_days: i64,
    site: Option<Site>,
}

impl TestRequest {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            service_type: "Maintenance".to_string(),
            status: "Pending".to_string(),
            age_days: 0,
            site: None,
        }
    }

    pub fn service(mut self, service_type: &str) -> Self {
        self.service_type = service_type.to_string();
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn aged(mut self, days: i64) -> Self {
        self.age_days = days;
        self
    }

    pub fn at(mut self, site: &Site) -> Self {
        self.site = Some(site.clone());
        self
    }

    pub fn build(self) -> ServiceRequest {
        let mut request = ServiceRequest::new(self.id, self.service_type, self.status)
            .with_requester(1000 + self.id)
            .with_description(format!("fixture request {}", self.id))
            .submitted(Utc::now() - Duration::days(self.age_days));
        if let Some(site) = self.site {
            request = request.at(Location::new(site.lat, site.lng).with_address(site.name));
        }
        request
    }
}

/// `count` requests placed at consecutive strip sites, with mixed statuses and types.
pub fn strip_requests(count: usize) -> Vec<ServiceRequest> {
    const STATUSES: &[&str] = &["Pending", "Critical", "In Process", "Low", "High", "Completed"];
    const TYPES: &[&str] = &["Plumbing", "Electrical", "HVAC", "Cleaning", "Security"];
    all_sites()
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, site)| {
            TestRequest::new(i as u64 + 1)
                .status(STATUSES[i % STATUSES.len()])
                .service(TYPES[i % TYPES.len()])
                .aged((i % 15) as i64)
                .at(site)
                .build()
        })
        .collect()
}
