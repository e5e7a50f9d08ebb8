//! Great-circle distance and the travel time/cost model built on it.
//!
//! Straight-line distance ignores roads; speeds and per-category constants
//! turn it into rough minutes and currency for route comparison.

use crate::priority::{normalize_label, status_rank};
use crate::request::ServiceRequest;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average driving speed for requests without an urgency band.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Calculate haversine distance between two (lat, lng) points in kilometers.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Per-category service constants.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceProfile {
    pub service_type: String,
    /// Time on site in minutes.
    pub service_minutes: f64,
    /// Flat call-out cost.
    pub service_cost: f64,
}

impl ServiceProfile {
    fn new(service_type: &str, service_minutes: f64, service_cost: f64) -> Self {
        Self {
            service_type: service_type.to_string(),
            service_minutes,
            service_cost,
        }
    }
}

/// Converts distances into travel minutes and cost.
#[derive(Debug, Clone)]
pub struct TravelModel {
    /// Speeds for Critical, Urgent and High, in km/h.
    pub urgent_speeds_kmh: [f64; 3],
    /// Speed for every other status.
    pub default_speed_kmh: f64,
    pub fuel_cost_per_km: f64,
    pub labor_rate_per_hour: f64,
    pub profiles: Vec<ServiceProfile>,
    /// Used for categories missing from `profiles`.
    pub fallback_profile: ServiceProfile,
}

impl Default for TravelModel {
    fn default() -> Self {
        Self {
            urgent_speeds_kmh: [60.0, 50.0, 45.0],
            default_speed_kmh: DEFAULT_SPEED_KMH,
            fuel_cost_per_km: 0.35,
            labor_rate_per_hour: 45.0,
            profiles: vec![
                ServiceProfile::new("Emergency", 90.0, 150.0),
                ServiceProfile::new("Electrical", 60.0, 95.0),
                ServiceProfile::new("Plumbing", 60.0, 85.0),
                ServiceProfile::new("HVAC", 75.0, 110.0),
                ServiceProfile::new("Security", 45.0, 70.0),
                ServiceProfile::new("Maintenance", 45.0, 60.0),
                ServiceProfile::new("IT Support", 30.0, 55.0),
                ServiceProfile::new("Cleaning", 40.0, 40.0),
            ],
            fallback_profile: ServiceProfile::new("General", 45.0, 60.0),
        }
    }
}

impl TravelModel {
    pub fn profile(&self, service_type: &str) -> &ServiceProfile {
        let wanted = normalize_label(service_type);
        self.profiles
            .iter()
            .find(|profile| normalize_label(&profile.service_type) == wanted)
            .unwrap_or(&self.fallback_profile)
    }

    /// Speed for a leg, driven by the more urgent of its two endpoints.
    pub fn speed_kmh(&self, a: &ServiceRequest, b: &ServiceRequest) -> f64 {
        let rank = status_rank(&a.status).min(status_rank(&b.status));
        usize::try_from(rank)
            .ok()
            .and_then(|rank| self.urgent_speeds_kmh.get(rank))
            .copied()
            .unwrap_or(self.default_speed_kmh)
    }

    /// Driving minutes plus the average on-site time of both endpoints.
    pub fn travel_minutes(&self, km: f64, a: &ServiceRequest, b: &ServiceRequest) -> f64 {
        let driving = km / self.speed_kmh(a, b) * 60.0;
        let on_site = (self.profile(&a.service_type).service_minutes
            + self.profile(&b.service_type).service_minutes)
            / 2.0;
        driving + on_site
    }

    /// Fuel plus driver labor plus the average call-out cost of both endpoints.
    pub fn travel_cost(&self, km: f64, a: &ServiceRequest, b: &ServiceRequest) -> f64 {
        let hours = km / self.speed_kmh(a, b);
        let call_out = (self.profile(&a.service_type).service_cost
            + self.profile(&b.service_type).service_cost)
            / 2.0;
        km * self.fuel_cost_per_km + hours * self.labor_rate_per_hour + call_out
    }
}
