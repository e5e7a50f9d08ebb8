//! In-process request store, used for demos and tests.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use tracing::info;

use crate::error::Result;
use crate::request::{Location, ServiceRequest};
use crate::traits::RequestStore;

/// (service type, status, description, lat, lng, address, age in days)
const SAMPLE_REQUESTS: &[(&str, &str, &str, f64, f64, &str, i64)] = &[
    ("Plumbing", "Pending", "Leaking pipe under kitchen sink", 36.1126, -115.1767, "Bellagio", 3),
    ("Electrical", "Critical", "Power outage on second floor", 36.1263781, -115.1658180, "Wynn Las Vegas", 0),
    ("HVAC", "In Process", "Air conditioning not cooling", 36.1023654, -115.1688720, "MGM Grand", 5),
    ("Cleaning", "Completed", "Post-event deep clean", 36.1162, -115.1745, "Caesars Palace", 12),
    ("Security", "Urgent", "Broken lock on service door", 36.1289345, -115.1653620, "Encore at Wynn", 1),
    ("Maintenance", "Low", "Repaint lobby railing", 36.1070664, -115.0591256, "Longhorn Casino", 20),
    ("IT Support", "High", "Point-of-sale terminals offline", 36.1041592, -115.1722166, "Hard Rock Cafe", 2),
    ("Plumbing", "Pending", "Slow drain in guest bathroom", 36.1175388, -115.1695094, "Brooklyn Bowl", 8),
    ("Emergency", "Critical", "Gas smell reported near kitchen", 36.1107195, -115.1720818, "Gordon Ramsay BurGR", 0),
    ("Electrical", "Cancelled", "Replace exterior signage bulbs", 36.1139368, -115.1741462, "Spago", 30),
];

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    requests: BTreeMap<u64, ServiceRequest>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with `requests`, keeping their ids.
    pub fn with_requests(requests: impl IntoIterator<Item = ServiceRequest>) -> Self {
        let mut store = Self::new();
        for request in requests {
            store.next_id = store.next_id.max(request.id);
            store.requests.insert(request.id, request);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn assign_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl RequestStore for MemoryStore {
    fn get_all(&self) -> Result<Vec<ServiceRequest>> {
        Ok(self.requests.values().cloned().collect())
    }

    fn create(&mut self, mut request: ServiceRequest) -> Result<u64> {
        let id = self.assign_id();
        request.id = id;
        self.requests.insert(id, request);
        Ok(id)
    }

    fn update(&mut self, request: &ServiceRequest) -> Result<bool> {
        match self.requests.get_mut(&request.id) {
            Some(slot) => {
                *slot = request.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&mut self, id: u64) -> Result<bool> {
        Ok(self.requests.remove(&id).is_some())
    }

    fn ensure_seeded(&mut self) -> Result<bool> {
        if !self.requests.is_empty() {
            return Ok(false);
        }
        let now = Utc::now();
        for (index, &(service_type, status, description, lat, lng, address, age_days)) in
            SAMPLE_REQUESTS.iter().enumerate()
        {
            let mut request = ServiceRequest::new(0, service_type, status)
                .with_requester(100 + index as u64)
                .with_description(description)
                .submitted(now - Duration::days(age_days))
                .at(Location::new(lat, lng).with_address(address));
            if status == "Completed" {
                request = request.completed(now - Duration::days(age_days / 2));
            }
            self.create(request)?;
        }
        info!(count = SAMPLE_REQUESTS.len(), "seeded empty store with sample requests");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_assigns_increasing_ids() {
        let mut store = MemoryStore::new();
        let a = store.create(ServiceRequest::new(99, "HVAC", "Pending")).unwrap();
        let b = store.create(ServiceRequest::new(99, "HVAC", "Pending")).unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn test_with_requests_continues_after_highest_id() {
        let mut store = MemoryStore::with_requests(vec![ServiceRequest::new(7, "HVAC", "Pending")]);
        assert_eq!(store.create(ServiceRequest::new(0, "HVAC", "Pending")).unwrap(), 8);
    }

    #[test]
    fn test_update_and_delete_unknown() {
        let mut store = MemoryStore::new();
        assert!(!store.update(&ServiceRequest::new(5, "HVAC", "Pending")).unwrap());
        assert!(!store.delete(5).unwrap());
    }

    #[test]
    fn test_seed_only_when_empty() {
        let mut store = MemoryStore::new();
        assert!(store.ensure_seeded().unwrap());
        assert_eq!(store.len(), SAMPLE_REQUESTS.len());
        assert!(!store.ensure_seeded().unwrap());
        assert_eq!(store.len(), SAMPLE_REQUESTS.len());
        assert!(store.get_all().unwrap().iter().all(|r| r.location.is_some()));
    }
}
