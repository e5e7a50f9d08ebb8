//! Real Las Vegas / Henderson sites for realistic request locations.
//!
//! Coordinates sourced from OpenStreetMap via Overpass API.

/// A named site with coordinates.
#[derive(Debug, Clone)]
pub struct Site {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Site {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

pub const CASINOS: &[Site] = &[
    Site::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Site::new("Encore at Wynn", 36.1289345, -115.1653620),
    Site::new("MGM Grand", 36.1023654, -115.1688720),
    Site::new("Bellagio", 36.1126, -115.1767),
    Site::new("Caesars Palace", 36.1162, -115.1745),
    Site::new("Longhorn Casino", 36.1070664, -115.0591256),
];

pub const STRIP_SITES: &[Site] = &[
    Site::new("Hard Rock Cafe", 36.1041592, -115.1722166),
    Site::new("SW Steakhouse", 36.1262145, -115.1669146),
    Site::new("Public House", 36.1219193, -115.1689317),
    Site::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Site::new("Yard House", 36.1177147, -115.1691992),
    Site::new("Gordon Ramsay BurGR", 36.1107195, -115.1720818),
    Site::new("Gordon Ramsay Steak", 36.1127744, -115.1712029),
    Site::new("Spago by Wolfgang Puck", 36.1139368, -115.1741462),
    Site::new("Le Cirque", 36.1135689, -115.1749763),
    Site::new("Hash House A Go Go", 36.1181377, -115.1710989),
];

pub const HENDERSON_SITES: &[Site] = &[
    Site::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Site::new("Islander's Grill", 36.0335058, -114.9856162),
    Site::new("Naga", 36.0137634, -114.9928676),
    Site::new("RibCage", 35.9949754, -115.0999810),
    Site::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Site::new("Sunset Station Area", 36.0614, -115.0631),
];

pub const NORTH_VEGAS_SITES: &[Site] = &[
    Site::new("Rivas Mexican Grill North", 36.1450055, -115.0482587),
    Site::new("Monarca Mexican Restaurant", 36.1440711, -115.0634197),
    Site::new("La Costa del Sol", 36.1470458, -115.0644345),
    Site::new("Beers and Bets", 36.1428945, -115.1573836),
];

/// Every site as a single list, strip first.
pub fn all_sites() -> Vec<Site> {
    let mut all = Vec::with_capacity(32);
    all.extend_from_slice(CASINOS);
    all.extend_from_slice(STRIP_SITES);
    all.extend_from_slice(HENDERSON_SITES);
    all.extend_from_slice(NORTH_VEGAS_SITES);
    all
}
