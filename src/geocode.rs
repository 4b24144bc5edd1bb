//! Lead geocoding service: validates the lead id, resolves the lead and ranks its agents.

use crate::crm::{CrmError, DestinationLookup};
use crate::location::{LeadLookup, LeadResolution, LocationError, LocationResolver, ResolvedLocation};
use crate::matrix::{
    closest_first, DestinationCandidate, DistanceMatrixProvider, DistanceRanker, ProviderError,
    RetryPolicy, RetryingProvider,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

pub type SharedLeadLookup = Arc<dyn LeadLookup<Error = CrmError> + Send + Sync>;
pub type SharedDestinationLookup = Arc<dyn DestinationLookup<Error = CrmError> + Send + Sync>;
pub type SharedProvider = Arc<dyn DistanceMatrixProvider + Send + Sync>;

pub const INVALID_LEAD_ID_MESSAGE: &str =
    "Invalid Lead UUID provided. Please try again with a valid UUID";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("The UUID is required for the desired Lead")]
    InvalidLeadId,
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("CRM lookup failed: {0}")]
    Crm(#[from] CrmError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl GeocodeError {
    /// Message safe to show an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidLeadId => INVALID_LEAD_ID_MESSAGE,
            Self::Location(LocationError::NotFound(_)) => "No lead exists with the provided UUID",
            Self::Location(_) => "The lead has no usable location information",
            Self::Crm(_) => "The CRM could not be reached. Please try again",
            Self::Provider(_) => "The distance service is unavailable. Please try again",
        }
    }
}

/// Form-level check: the lead id is required and must not be blank.
pub fn validate_lead_id(raw: Option<&str>) -> Result<String, GeocodeError> {
    raw.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or(GeocodeError::InvalidLeadId)
}

/// Whether and how the agents were ranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Ranking {
    Ranked {
        submitted: usize,
        enriched: usize,
        degraded_batches: usize,
    },
    /// Distances need a coordinate origin; street-only leads are reported unranked.
    SkippedStreetOrigin,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeocodeReport {
    pub lead_id: String,
    pub lead: ResolvedLocation,
    pub agents: Vec<DestinationCandidate>,
    pub ranking: Ranking,
    pub generated_at: DateTime<Utc>,
}

impl GeocodeReport {
    /// Ranked agents, nearest first.
    pub fn closest(&self) -> Vec<&DestinationCandidate> {
        closest_first(&self.agents)
    }
}

#[derive(Clone)]
pub struct GeocodeService {
    leads: SharedLeadLookup,
    destinations: SharedDestinationLookup,
    provider: SharedProvider,
    resolver: LocationResolver,
    ranker: DistanceRanker,
    retry: RetryPolicy,
}

impl GeocodeService {
    pub fn new(
        leads: SharedLeadLookup,
        destinations: SharedDestinationLookup,
        provider: SharedProvider,
    ) -> Self {
        Self {
            leads,
            destinations,
            provider,
            resolver: LocationResolver::new(),
            ranker: DistanceRanker::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_ranker(mut self, ranker: DistanceRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the whole flow for one submitted lead id.
    pub fn locate(&self, raw_lead_id: Option<&str>) -> Result<GeocodeReport, GeocodeError> {
        self.locate_until(raw_lead_id, None)
    }

    /// [`locate`](Self::locate), abandoning distance work once `deadline` passes.
    ///
    /// Past the deadline no batch is started and no retry is attempted, so a
    /// [`ProviderError::Timeout`] here means the provider is no longer being called.
    pub fn locate_with_deadline(
        &self,
        raw_lead_id: Option<&str>,
        deadline: Instant,
    ) -> Result<GeocodeReport, GeocodeError> {
        self.locate_until(raw_lead_id, Some(deadline))
    }

    fn locate_until(
        &self,
        raw_lead_id: Option<&str>,
        deadline: Option<Instant>,
    ) -> Result<GeocodeReport, GeocodeError> {
        let lead_id = validate_lead_id(raw_lead_id)?;

        // A failed agent query yields an empty list rather than failing the request.
        let mut agents = match self.destinations.related_destinations(&lead_id) {
            Ok(agents) => agents,
            Err(e) => {
                warn!(%lead_id, error = %e, "agent lookup failed, continuing without agents");
                Vec::new()
            }
        };

        let lead = match self.resolver.resolve_lead(self.leads.as_ref(), &lead_id) {
            LeadResolution::Resolved(loc) => loc,
            LeadResolution::Rejected(e) => {
                debug!(%lead_id, error = %e, "lead location rejected");
                return Err(e.into());
            }
            LeadResolution::Lookup(e) => return Err(e.into()),
        };

        let ranking = match lead.coordinate() {
            Some(origin) => {
                let provider = RetryingProvider::new(self.provider.as_ref(), self.retry);
                let summary = self.ranker.enrich_until(origin, &mut agents, &provider, deadline)?;
                Ranking::Ranked {
                    submitted: summary.submitted,
                    enriched: summary.enriched,
                    degraded_batches: summary.degraded_batches,
                }
            }
            None => Ranking::SkippedStreetOrigin,
        };

        info!(
            %lead_id,
            preferred = %lead.preferred(),
            agents = agents.len(),
            ranking = ?ranking,
            "lead geocoded"
        );

        Ok(GeocodeReport {
            lead_id,
            lead,
            agents,
            ranking,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::{CrmSnapshot, AGENT_ID_ATTR, AGENT_LEAD_ATTR, AGENT_NAME_ATTR};
    use crate::location::types::{LATITUDE_ATTR, LONGITUDE_ATTR, STREET_ATTR};
    use crate::location::{Coordinate, LeadAttributes, Preferred, ValidationFailure};
    use crate::matrix::{DistanceMatrixResult, MatrixElement, MatrixRow, Measure, RouteEstimate};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    const LEAD: &str = "805a0dff-b76f-eb11-b0b0-000d3a5319cc";

    /// Answers every call with fixed distances and counts calls.
    struct FixedProvider {
        meters: Vec<u64>,
        failures: Mutex<Vec<ProviderError>>,
        calls: Mutex<usize>,
    }

    impl FixedProvider {
        fn new(meters: Vec<u64>) -> Self {
            Self { meters, failures: Mutex::new(Vec::new()), calls: Mutex::new(0) }
        }

        fn failing(failures: Vec<ProviderError>) -> Self {
            Self { meters: vec![1, 2], failures: Mutex::new(failures), calls: Mutex::new(0) }
        }
    }

    impl DistanceMatrixProvider for FixedProvider {
        fn compute_matrix(
            &self,
            _origin: Coordinate,
            destinations: &[Coordinate],
        ) -> Result<DistanceMatrixResult, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
            let rows = self
                .meters
                .iter()
                .take(destinations.len())
                .map(|m| MatrixRow {
                    elements: vec![MatrixElement::Ok(RouteEstimate {
                        distance: Measure { text: format!("{} m", m), value: *m },
                        duration: Measure { text: "1 min".into(), value: 60 },
                    })],
                })
                .collect();
            Ok(DistanceMatrixResult::ok(rows))
        }
    }

    fn agent(id: &str, lat: &str, lng: &str) -> BTreeMap<String, Option<String>> {
        [
            (AGENT_ID_ATTR, id),
            (AGENT_NAME_ATTR, "Agent"),
            (LATITUDE_ATTR, lat),
            (LONGITUDE_ATTR, lng),
            (AGENT_LEAD_ATTR, LEAD),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
    }

    fn crm(lead: LeadAttributes) -> Arc<CrmSnapshot> {
        let mut crm = CrmSnapshot::new();
        crm.insert_lead(LEAD, lead);
        crm.insert_agent(agent("a1", "40.73", "-73.99"));
        crm.insert_agent(agent("a2", "40.65", "-73.95"));
        Arc::new(crm)
    }

    fn service(crm: Arc<CrmSnapshot>, provider: Arc<FixedProvider>) -> GeocodeService {
        GeocodeService::new(crm.clone(), crm, provider)
            .with_retry(RetryPolicy { max_retries: 2, backoff_base_ms: 0 })
    }

    fn coordinate_lead() -> LeadAttributes {
        LeadAttributes::new()
            .with(LATITUDE_ATTR, "40.7128")
            .with(LONGITUDE_ATTR, "-74.0060")
    }

    #[test]
    fn test_validate_lead_id() {
        assert_eq!(validate_lead_id(Some("  abc ")).unwrap(), "abc");
        assert!(matches!(validate_lead_id(Some("   ")), Err(GeocodeError::InvalidLeadId)));
        assert!(matches!(validate_lead_id(None), Err(GeocodeError::InvalidLeadId)));
    }

    #[test]
    fn test_coordinate_lead_is_ranked() {
        let provider = Arc::new(FixedProvider::new(vec![3100, 9400]));
        let report = service(crm(coordinate_lead()), provider).locate(Some(LEAD)).unwrap();

        assert_eq!(report.lead.preferred(), Preferred::LatLong);
        assert_eq!(
            report.ranking,
            Ranking::Ranked { submitted: 2, enriched: 2, degraded_batches: 0 }
        );
        let meters: Vec<u64> = report
            .agents
            .iter()
            .filter_map(|a| a.computed_distance.as_ref().map(RouteEstimate::meters))
            .collect();
        assert_eq!(meters, vec![3100, 9400]);
        assert_eq!(report.closest()[0].id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_street_lead_skips_ranking() {
        let provider = Arc::new(FixedProvider::new(vec![1, 2]));
        let lead = LeadAttributes::new()
            .with(STREET_ATTR, "1 Main St")
            .with(LATITUDE_ATTR, "")
            .with(LONGITUDE_ATTR, "");
        let report = service(crm(lead), provider.clone()).locate(Some(LEAD)).unwrap();

        assert_eq!(report.lead, ResolvedLocation::Street { address: "1 Main St".into() });
        assert_eq!(report.ranking, Ranking::SkippedStreetOrigin);
        assert!(report.agents.iter().all(|a| a.computed_distance.is_none()));
        assert_eq!(*provider.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_unknown_lead() {
        let provider = Arc::new(FixedProvider::new(vec![]));
        let err = service(crm(coordinate_lead()), provider).locate(Some("other")).unwrap_err();
        assert!(matches!(err, GeocodeError::Location(LocationError::NotFound(_))));
        assert_eq!(err.user_message(), "No lead exists with the provided UUID");
    }

    #[test]
    fn test_lead_without_location() {
        let provider = Arc::new(FixedProvider::new(vec![]));
        let lead = LeadAttributes::new().with(LATITUDE_ATTR, "120").with(LONGITUDE_ATTR, "0");
        let err = service(crm(lead), provider).locate(Some(LEAD)).unwrap_err();
        assert!(matches!(
            err,
            GeocodeError::Location(LocationError::ValidationFailed(ValidationFailure::InvalidCoordinates))
        ));
    }

    #[test]
    fn test_transient_provider_errors_are_retried() {
        let provider = Arc::new(FixedProvider::failing(vec![ProviderError::Timeout]));
        let report = service(crm(coordinate_lead()), provider.clone()).locate(Some(LEAD)).unwrap();
        assert!(matches!(report.ranking, Ranking::Ranked { enriched: 2, .. }));
        assert_eq!(*provider.calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_provider_error_surfaces_after_retries() {
        let provider = Arc::new(FixedProvider::failing(vec![ProviderError::Timeout; 3]));
        let err = service(crm(coordinate_lead()), provider.clone()).locate(Some(LEAD)).unwrap_err();
        assert!(matches!(err, GeocodeError::Provider(ProviderError::Timeout)));
        assert_eq!(*provider.calls.lock().unwrap(), 3);
    }

    #[test]
    fn test_expired_deadline_stops_provider_calls() {
        let provider = Arc::new(FixedProvider::failing(vec![ProviderError::Timeout; 3]));
        let past = Instant::now() - std::time::Duration::from_millis(1);
        let err = service(crm(coordinate_lead()), provider.clone())
            .locate_with_deadline(Some(LEAD), past)
            .unwrap_err();
        assert!(matches!(err, GeocodeError::Provider(ProviderError::Timeout)));
        assert_eq!(*provider.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_report_serializes_for_the_web_layer() {
        let provider = Arc::new(FixedProvider::new(vec![3100, 9400]));
        let report = service(crm(coordinate_lead()), provider).locate(Some(LEAD)).unwrap();
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["lead"]["preferred"], "latLong");
        assert_eq!(v["ranking"]["status"], "ranked");
        assert_eq!(v["agents"][1]["location"]["distance"]["value"], 9400);
    }
}
