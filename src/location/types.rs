//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// CRM attribute holding the lead's street address.
pub const STREET_ATTR: &str = "new_street";
/// CRM attribute holding a latitude, as a numeric string.
pub const LATITUDE_ATTR: &str = "new_latitude";
/// CRM attribute holding a longitude, as a numeric string.
pub const LONGITUDE_ATTR: &str = "new_longitude";

/// Raw attribute set of a lead as returned by the CRM.
///
/// Values are optional strings; blank values are treated as absent by the accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadAttributes(BTreeMap<String, Option<String>>);

impl LeadAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests and fixtures.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, Some(value.into()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.insert(key.into(), value);
    }

    /// Non-blank value of `key`, trimmed.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn street(&self) -> Option<&str> {
        self.get(STREET_ATTR)
    }

    pub fn latitude(&self) -> Option<&str> {
        self.get(LATITUDE_ATTR)
    }

    pub fn longitude(&self) -> Option<&str> {
        self.get(LONGITUDE_ATTR)
    }
}

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting anything outside `|lat| <= 90`, `|lng| <= 180`.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if lat.is_finite() && lng.is_finite() && lat.abs() <= 90.0 && lng.abs() <= 180.0 {
            Some(Self { lat, lng })
        } else {
            None
        }
    }

    /// Parse a latitude/longitude pair of numeric strings.
    pub fn parse(lat: &str, lng: &str) -> Option<Self> {
        let lat = lat.trim().parse::<f64>().ok()?;
        let lng = lng.trim().parse::<f64>().ok()?;
        Self::new(lat, lng)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Which representation was chosen for a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preferred {
    #[serde(rename = "street")]
    Street,
    #[serde(rename = "latLong")]
    LatLong,
}

impl fmt::Display for Preferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Street => write!(f, "street"),
            Self::LatLong => write!(f, "latLong"),
        }
    }
}

/// The authoritative location of a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "preferred")]
pub enum ResolvedLocation {
    #[serde(rename = "street")]
    Street { address: String },
    #[serde(rename = "latLong")]
    Coordinates {
        lat: f64,
        lng: f64,
        /// The pair as supplied by the CRM, e.g. "40.7128,-74.0060".
        #[serde(rename = "latLong")]
        lat_long: String,
    },
}

impl ResolvedLocation {
    pub fn preferred(&self) -> Preferred {
        match self {
            Self::Street { .. } => Preferred::Street,
            Self::Coordinates { .. } => Preferred::LatLong,
        }
    }

    /// The point to measure from, if this location has one.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Coordinates { lat, lng, .. } => Some(Coordinate { lat: *lat, lng: *lng }),
            Self::Street { .. } => None,
        }
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Street { address } => write!(f, "{}", address),
            Self::Coordinates { lat_long, .. } => write!(f, "{}", lat_long),
        }
    }
}

/// Location resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("No lead with GUID {0} exists")]
    NotFound(String),
    #[error("Lead with GUID {0} has incomplete location information")]
    IncompleteData(String),
    #[error("Location information validation failed: {0}")]
    ValidationFailed(ValidationFailure),
}

/// Why a lead's location could not be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// No coordinates and no street address.
    NoFallbackStreet,
    /// Coordinates present but unusable, and no street address.
    InvalidCoordinates,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFallbackStreet => write!(f, "no street address found as fallback"),
            Self::InvalidCoordinates => write!(f, "coordinates missing or out of range"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_blank_attributes_are_absent() {
        let attrs = LeadAttributes::new()
            .with(STREET_ATTR, "   ")
            .with(LATITUDE_ATTR, " 12.5 ");
        assert_eq!(attrs.street(), None);
        assert_eq!(attrs.latitude(), Some("12.5"));
        assert_eq!(attrs.longitude(), None);
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_some());
        assert!(Coordinate::new(-90.0, -180.0).is_some());
        assert!(Coordinate::new(90.0001, 0.0).is_none());
        assert!(Coordinate::new(0.0, -180.5).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_coordinate_parse() {
        let c = Coordinate::parse("40.7128", " -74.0060").unwrap();
        assert_relative_eq!(c.lat, 40.7128);
        assert_relative_eq!(c.lng, -74.006);
        assert!(Coordinate::parse("north", "10").is_none());
    }

    #[test]
    fn test_resolved_location_json_shape() {
        let loc = ResolvedLocation::Coordinates {
            lat: 1.5,
            lng: 2.5,
            lat_long: "1.5,2.5".into(),
        };
        let v = serde_json::to_value(&loc).unwrap();
        assert_eq!(v["preferred"], "latLong");
        assert_eq!(v["latLong"], "1.5,2.5");

        let street = ResolvedLocation::Street { address: "1 Main St".into() };
        let v = serde_json::to_value(&street).unwrap();
        assert_eq!(v["preferred"], "street");
        assert_eq!(v["address"], "1 Main St");
    }
}
