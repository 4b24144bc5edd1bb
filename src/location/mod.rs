//! Lead location subsystem.
//!
//! Turns a CRM lead's raw street/latitude/longitude attributes into one
//! authoritative location.

pub mod resolver;
pub mod types;

pub use resolver::{LeadLookup, LeadResolution, LocationResolver};
pub use types::{
    Coordinate, LeadAttributes, LocationError, Preferred, ResolvedLocation, ValidationFailure,
};
