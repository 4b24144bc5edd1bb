//! Distance-matrix providers: the capability trait and the Google Maps implementation.

use super::types::{
    DistanceMatrixResult, MatrixElement, MatrixRow, MatrixStatus, Measure, ProviderError,
    RouteEstimate, Units,
};
use crate::location::Coordinate;
use serde::Deserialize;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

/// Computes travel estimates from one origin to many destinations.
pub trait DistanceMatrixProvider {
    /// `rows[i]` of the result must correspond to `destinations[i]`.
    fn compute_matrix(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
    ) -> Result<DistanceMatrixResult, ProviderError>;

    /// Like [`compute_matrix`](Self::compute_matrix), but gives up with
    /// [`ProviderError::Timeout`] once `deadline` has passed.
    ///
    /// The default only checks the deadline before calling; providers doing I/O
    /// should also bound the call itself by the time remaining.
    fn compute_matrix_until(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
        deadline: Option<Instant>,
    ) -> Result<DistanceMatrixResult, ProviderError> {
        if remaining(deadline).is_some_and(|left| left.is_zero()) {
            return Err(ProviderError::Timeout);
        }
        self.compute_matrix(origin, destinations)
    }
}

impl<P: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for &P {
    fn compute_matrix(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
    ) -> Result<DistanceMatrixResult, ProviderError> {
        (**self).compute_matrix(origin, destinations)
    }

    fn compute_matrix_until(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
        deadline: Option<Instant>,
    ) -> Result<DistanceMatrixResult, ProviderError> {
        (**self).compute_matrix_until(origin, destinations, deadline)
    }
}

/// Time left before `deadline`, saturating at zero. `None` means unbounded.
pub fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

pub const GOOGLE_DISTANCE_MATRIX_URL: &str =
    "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Google limits a single request to 25 destinations for one origin.
pub const GOOGLE_MAX_DESTINATIONS: usize = 25;

const USER_AGENT: &str = concat!("lead_locator/", env!("CARGO_PKG_VERSION"));

/// Explicit construction parameters for [`GoogleDistanceMatrix`].
#[derive(Clone)]
pub struct GoogleMatrixConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub units: Units,
}

impl fmt::Debug for GoogleMatrixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleMatrixConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("units", &self.units)
            .finish()
    }
}

/// Google Maps Distance Matrix API over a blocking `ureq` agent.
pub struct GoogleDistanceMatrix {
    agent: ureq::Agent,
    config: GoogleMatrixConfig,
}

impl fmt::Debug for GoogleDistanceMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleDistanceMatrix")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GoogleDistanceMatrix {
    pub fn new(config: GoogleMatrixConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent, config }
    }
}

impl DistanceMatrixProvider for GoogleDistanceMatrix {
    fn compute_matrix(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
    ) -> Result<DistanceMatrixResult, ProviderError> {
        self.request(origin, destinations, self.config.timeout)
    }

    fn compute_matrix_until(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
        deadline: Option<Instant>,
    ) -> Result<DistanceMatrixResult, ProviderError> {
        let timeout = match remaining(deadline) {
            Some(left) if left.is_zero() => return Err(ProviderError::Timeout),
            Some(left) => left.min(self.config.timeout),
            None => self.config.timeout,
        };
        self.request(origin, destinations, timeout)
    }
}

impl GoogleDistanceMatrix {
    fn request(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
        timeout: Duration,
    ) -> Result<DistanceMatrixResult, ProviderError> {
        let joined = destinations
            .iter()
            .map(Coordinate::to_string)
            .collect::<Vec<_>>()
            .join("|");

        let response = self
            .agent
            .get(&self.config.base_url)
            .query("origins", &origin.to_string())
            .query("destinations", &joined)
            .query("units", &self.config.units.to_string())
            .query("key", &self.config.api_key)
            .timeout(timeout)
            .call();

        let response = match response {
            Ok(r) => r,
            Err(ureq::Error::Status(code, resp)) => {
                let message = resp.into_string().unwrap_or_default();
                return Err(match code {
                    401 | 403 => ProviderError::Unauthorized(code),
                    _ => ProviderError::Http { status: code, message },
                });
            }
            Err(ureq::Error::Transport(t)) => return Err(map_transport(&t)),
        };

        let wire: WireResponse = response.into_json().map_err(|e| {
            if is_timeout(&e) {
                ProviderError::Timeout
            } else {
                ProviderError::InvalidResponse(e.to_string())
            }
        })?;

        Ok(wire.into_result())
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn map_transport(t: &ureq::Transport) -> ProviderError {
    let io_timeout = std::error::Error::source(t)
        .and_then(|s| s.downcast_ref::<io::Error>())
        .is_some_and(is_timeout);
    let message = t.to_string();
    if io_timeout || message.contains("timed out") {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(message)
    }
}

// ─── Wire format ────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct WireResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<WireRow>,
}

#[derive(Deserialize, Debug)]
struct WireRow {
    #[serde(default)]
    elements: Vec<WireElement>,
}

#[derive(Deserialize, Debug)]
struct WireElement {
    status: String,
    #[serde(default)]
    distance: Option<Measure>,
    #[serde(default)]
    duration: Option<Measure>,
}

impl WireElement {
    fn into_element(self) -> MatrixElement {
        if self.status != "OK" {
            return MatrixElement::Unavailable(self.status);
        }
        match (self.distance, self.duration) {
            (Some(distance), Some(duration)) => {
                MatrixElement::Ok(RouteEstimate { distance, duration })
            }
            _ => MatrixElement::Unavailable("OK_WITHOUT_ESTIMATE".into()),
        }
    }
}

impl WireResponse {
    /// Google returns one row per origin with one element per destination;
    /// reshape the single origin row into one row per destination.
    fn into_result(self) -> DistanceMatrixResult {
        if self.status != "OK" {
            return DistanceMatrixResult {
                status: MatrixStatus::Degraded {
                    status: self.status,
                    message: self.error_message,
                },
                rows: Vec::new(),
            };
        }

        let rows = self
            .rows
            .into_iter()
            .next()
            .map(|origin_row| {
                origin_row
                    .elements
                    .into_iter()
                    .map(|e| MatrixRow { elements: vec![e.into_element()] })
                    .collect()
            })
            .unwrap_or_default();

        DistanceMatrixResult::ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> DistanceMatrixResult {
        serde_json::from_str::<WireResponse>(json).unwrap().into_result()
    }

    #[test]
    fn test_reshapes_origin_row_per_destination() {
        let result = parse(
            r#"{
                "status": "OK",
                "origin_addresses": ["New York"],
                "destination_addresses": ["A", "B"],
                "rows": [{ "elements": [
                    { "status": "OK", "distance": { "text": "3.1 km", "value": 3100 },
                      "duration": { "text": "9 mins", "value": 540 } },
                    { "status": "ZERO_RESULTS" }
                ]}]
            }"#,
        );
        assert_eq!(result.status, MatrixStatus::Ok);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].first_ok().map(RouteEstimate::meters), Some(3100));
        assert_eq!(
            result.rows[1].elements,
            vec![MatrixElement::Unavailable("ZERO_RESULTS".into())]
        );
    }

    #[test]
    fn test_top_level_failure_is_degraded() {
        let result = parse(
            r#"{ "status": "OVER_QUERY_LIMIT", "error_message": "slow down", "rows": [] }"#,
        );
        assert_eq!(
            result.status,
            MatrixStatus::Degraded {
                status: "OVER_QUERY_LIMIT".into(),
                message: Some("slow down".into()),
            }
        );
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_ok_element_without_payload_is_unusable() {
        let result = parse(r#"{ "status": "OK", "rows": [{ "elements": [{ "status": "OK" }] }] }"#);
        assert!(result.rows[0].first_ok().is_none());
    }

    struct Counting(std::cell::Cell<u32>);

    impl DistanceMatrixProvider for Counting {
        fn compute_matrix(
            &self,
            _origin: Coordinate,
            _destinations: &[Coordinate],
        ) -> Result<DistanceMatrixResult, ProviderError> {
            self.0.set(self.0.get() + 1);
            Ok(DistanceMatrixResult::ok(Vec::new()))
        }
    }

    #[test]
    fn test_expired_deadline_skips_the_call() {
        let p = Counting(std::cell::Cell::new(0));
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        let past = Instant::now() - Duration::from_millis(1);

        assert_eq!(p.compute_matrix_until(origin, &[], Some(past)), Err(ProviderError::Timeout));
        assert_eq!(p.0.get(), 0);

        let later = Instant::now() + Duration::from_secs(60);
        assert!(p.compute_matrix_until(origin, &[], Some(later)).is_ok());
        assert!(p.compute_matrix_until(origin, &[], None).is_ok());
        assert_eq!(p.0.get(), 2);
    }

    #[test]
    fn test_remaining_saturates() {
        assert_eq!(remaining(None), None);
        let past = Instant::now() - Duration::from_secs(1);
        assert_eq!(remaining(Some(past)), Some(Duration::ZERO));
    }

    #[test]
    fn test_config_debug_hides_key() {
        let config = GoogleMatrixConfig {
            api_key: "secret-key".into(),
            base_url: GOOGLE_DISTANCE_MATRIX_URL.into(),
            timeout: Duration::from_secs(5),
            units: Units::Metric,
        };
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
