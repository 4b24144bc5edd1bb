//! Lead location resolver.
//!
//! Policy: a street address is the fallback, valid coordinates always win.

use super::types::{Coordinate, LeadAttributes, LocationError, ResolvedLocation, ValidationFailure};

/// Supplies lead records by identifier.
pub trait LeadLookup {
    type Error;

    /// `Ok(None)` when the identifier has no record.
    fn fetch_lead(&self, lead_id: &str) -> Result<Option<LeadAttributes>, Self::Error>;
}

/// Outcome of a lookup-then-resolve, keeping lookup failures apart from policy failures.
#[derive(Debug)]
pub enum LeadResolution<E> {
    Resolved(ResolvedLocation),
    Rejected(LocationError),
    Lookup(E),
}

/// Stateless resolver for a lead's authoritative location.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationResolver;

impl LocationResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the location of the lead `lead_id` from its attribute set.
    pub fn resolve(
        &self,
        lead_id: &str,
        attrs: &LeadAttributes,
    ) -> Result<ResolvedLocation, LocationError> {
        if attrs.is_empty() {
            return Err(LocationError::IncompleteData(lead_id.to_string()));
        }

        // Street is only a fallback
        let street = attrs.street().map(|address| ResolvedLocation::Street {
            address: address.to_string(),
        });

        // Without coordinates the street is all there is
        let (lat, lng) = match (attrs.latitude(), attrs.longitude()) {
            (None, None) => {
                return street.ok_or(LocationError::ValidationFailed(
                    ValidationFailure::NoFallbackStreet,
                ));
            }
            pair => pair,
        };

        // Valid coordinates override the street
        let coordinate = match (lat, lng) {
            (Some(lat), Some(lng)) => Coordinate::parse(lat, lng).map(|c| (c, lat, lng)),
            _ => None,
        };

        match coordinate {
            Some((c, lat, lng)) => Ok(ResolvedLocation::Coordinates {
                lat: c.lat,
                lng: c.lng,
                lat_long: format!("{},{}", lat, lng),
            }),
            None => street.ok_or(LocationError::ValidationFailed(
                ValidationFailure::InvalidCoordinates,
            )),
        }
    }

    /// Fetch the lead through `lookup` and resolve it.
    pub fn resolve_lead<L: LeadLookup + ?Sized>(
        &self,
        lookup: &L,
        lead_id: &str,
    ) -> LeadResolution<L::Error> {
        match lookup.fetch_lead(lead_id) {
            Ok(Some(attrs)) => match self.resolve(lead_id, &attrs) {
                Ok(loc) => LeadResolution::Resolved(loc),
                Err(e) => LeadResolution::Rejected(e),
            },
            Ok(None) => LeadResolution::Rejected(LocationError::NotFound(lead_id.to_string())),
            Err(e) => LeadResolution::Lookup(e),
        }
    }
}
