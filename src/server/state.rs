use crate::geocode::GeocodeService;
use std::time::Duration;

pub struct AppState {
    pub service: GeocodeService,
    /// Upper bound for one geocoding request, provider retries included.
    pub request_deadline: Duration,
    /// Include error detail in responses.
    pub debug: bool,
}
