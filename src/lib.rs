//! Lead Locator: resolves a CRM lead's authoritative location and annotates its
//! related agents with travel distance from a distance-matrix provider.

pub mod config;
pub mod crm;
pub mod geocode;
pub mod location;
pub mod matrix;
pub mod server;
pub mod telemetry;
