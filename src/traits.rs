//! Collaborator contract for the system of record.
//!
//! The engine only ever holds a derived, disposable index. Durability lives
//! behind this trait; concrete apps implement it over their own storage.

use crate::error::Result;
use crate::request::ServiceRequest;

/// The external store that owns service requests.
pub trait RequestStore {
    /// Full snapshot of every request.
    fn get_all(&self) -> Result<Vec<ServiceRequest>>;

    /// Persists a new request and returns the id the store assigned.
    ///
    /// The incoming `id` is ignored.
    fn create(&mut self, request: ServiceRequest) -> Result<u64>;

    /// Replaces an existing request. Returns false if the id is unknown.
    fn update(&mut self, request: &ServiceRequest) -> Result<bool>;

    /// Deletes a request. Returns false if the id is unknown.
    fn delete(&mut self, id: u64) -> Result<bool>;

    /// Populates demo data when the store is empty.
    ///
    /// Returns true if anything was inserted. Stores without demo data keep the default.
    fn ensure_seeded(&mut self) -> Result<bool> {
        Ok(false)
    }
}
