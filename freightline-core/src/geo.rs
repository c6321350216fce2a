//! Postal-code centroids and great-circle distance
//!
//! Used by the distance resolver when the distance API is unavailable. A
//! postal code maps to the centroid of the longest table prefix matching its
//! digits, so `C1425ABC`, `1425` and `1425 ` all land on the same entry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::GeoConfig;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl Centroid {
    fn new(latitude: f64, longitude: f64, label: &str) -> Self {
        Self {
            latitude,
            longitude,
            label: label.to_string(),
        }
    }
}

/// (prefix, latitude, longitude, label)
const BUILTIN_CENTROIDS: &[(&str, f64, f64, &str)] = &[
    ("1", -34.6037, -58.3816, "Ciudad Autónoma de Buenos Aires"),
    ("16", -34.4708, -58.5286, "GBA Norte"),
    ("17", -34.6534, -58.6198, "GBA Oeste"),
    ("18", -34.7609, -58.4063, "GBA Sur"),
    ("19", -34.9214, -57.9545, "La Plata"),
    ("20", -32.9442, -60.6505, "Rosario"),
    ("30", -31.6333, -60.7000, "Santa Fe"),
    ("31", -31.7319, -60.5238, "Paraná"),
    ("33", -27.3671, -55.8961, "Posadas"),
    ("34", -27.4692, -58.8306, "Corrientes"),
    ("35", -27.4606, -58.9839, "Resistencia"),
    ("36", -26.1775, -58.1781, "Formosa"),
    ("40", -26.8083, -65.2176, "San Miguel de Tucumán"),
    ("42", -27.7951, -64.2615, "Santiago del Estero"),
    ("44", -24.7821, -65.4232, "Salta"),
    ("46", -24.1858, -65.2995, "San Salvador de Jujuy"),
    ("47", -28.4696, -65.7852, "San Fernando del Valle de Catamarca"),
    ("50", -31.4201, -64.1888, "Córdoba"),
    ("53", -29.4131, -66.8558, "La Rioja"),
    ("54", -31.5375, -68.5364, "San Juan"),
    ("55", -32.8895, -68.8458, "Mendoza"),
    ("57", -33.2950, -66.3356, "San Luis"),
    ("63", -36.6203, -64.2906, "Santa Rosa"),
    ("76", -38.0055, -57.5426, "Mar del Plata"),
    ("80", -38.7196, -62.2724, "Bahía Blanca"),
    ("83", -38.9516, -68.0591, "Neuquén"),
    ("84", -41.1335, -71.3103, "San Carlos de Bariloche"),
    ("90", -45.8641, -67.4966, "Comodoro Rivadavia"),
    ("91", -43.2490, -65.3051, "Trelew"),
    ("940", -51.6230, -69.2168, "Río Gallegos"),
    ("941", -54.8019, -68.3030, "Ushuaia"),
];

/// Prefix → centroid lookup table
#[derive(Debug, Clone)]
pub struct CentroidTable {
    entries: HashMap<String, Centroid>,
}

impl CentroidTable {
    /// Built-in regions only
    #[must_use]
    pub fn builtin() -> Self {
        let entries = BUILTIN_CENTROIDS
            .iter()
            .map(|&(prefix, lat, lon, label)| (prefix.to_string(), Centroid::new(lat, lon, label)))
            .collect();
        Self { entries }
    }

    /// Built-in regions plus configured ones; configured entries replace
    /// built-ins with the same prefix
    #[must_use]
    pub fn from_config(config: &GeoConfig) -> Self {
        let mut table = Self::builtin();
        for centroid in &config.centroids {
            let prefix = postal_digits(&centroid.prefix);
            if prefix.is_empty() {
                tracing::warn!(prefix = %centroid.prefix, "Ignoring centroid without digits");
                continue;
            }
            let label = centroid.label.clone().unwrap_or_else(|| prefix.clone());
            table.entries.insert(
                prefix,
                Centroid {
                    latitude: centroid.latitude,
                    longitude: centroid.longitude,
                    label,
                },
            );
        }
        table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Centroid of the longest prefix matching the code's digits
    #[must_use]
    pub fn lookup(&self, postal_code: &str) -> Option<&Centroid> {
        let digits = postal_digits(postal_code);
        (1..=digits.len())
            .rev()
            .find_map(|len| self.entries.get(&digits[..len]))
    }

    /// Great-circle distance between the two codes' centroids, rounded to
    /// 2 decimals. `None` if either code has no centroid.
    #[must_use]
    pub fn distance_km(&self, from_postal_code: &str, to_postal_code: &str) -> Option<f64> {
        let from = self.lookup(from_postal_code)?;
        let to = self.lookup(to_postal_code)?;
        Some(round2(haversine_km(from, to)))
    }
}

impl Default for CentroidTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Haversine distance in km
#[must_use]
pub fn haversine_km(from: &Centroid, to: &Centroid) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

fn postal_digits(postal_code: &str) -> String {
    postal_code.chars().filter(char::is_ascii_digit).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
