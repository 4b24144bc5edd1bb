//! Distance ranker: batches candidates into matrix requests and merges the results back.

use super::provider::{DistanceMatrixProvider, GOOGLE_MAX_DESTINATIONS};
use super::types::{DestinationCandidate, MatrixStatus, ProviderError};
use crate::location::Coordinate;
use std::time::Instant;
use tracing::{debug, warn};

/// What a ranking pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankSummary {
    /// Candidates sent to the provider.
    pub submitted: usize,
    /// Candidates that received an estimate.
    pub enriched: usize,
    /// Candidates skipped for missing or invalid coordinates.
    pub ineligible: usize,
    /// Provider calls issued.
    pub batches: usize,
    /// Calls that came back with a non-OK top-level status.
    pub degraded_batches: usize,
}

/// Enriches destination candidates with travel estimates from one origin.
#[derive(Debug, Clone, Copy)]
pub struct DistanceRanker {
    max_destinations: usize,
}

impl Default for DistanceRanker {
    fn default() -> Self {
        Self::new(GOOGLE_MAX_DESTINATIONS)
    }
}

impl DistanceRanker {
    /// `max_destinations` caps the destinations sent per provider call (minimum 1).
    pub fn new(max_destinations: usize) -> Self {
        Self {
            max_destinations: max_destinations.max(1),
        }
    }

    pub fn max_destinations(&self) -> usize {
        self.max_destinations
    }

    /// Enrich `destinations` and hand them back in the same order.
    pub fn rank<P: DistanceMatrixProvider + ?Sized>(
        &self,
        origin: Coordinate,
        mut destinations: Vec<DestinationCandidate>,
        provider: &P,
    ) -> Result<Vec<DestinationCandidate>, ProviderError> {
        self.enrich(origin, &mut destinations, provider)?;
        Ok(destinations)
    }

    /// Enrich `destinations` in place.
    ///
    /// Candidates are batched in input order. Row `i` of each response belongs to
    /// the `i`-th candidate of that batch and only its first `OK` element is used.
    /// A non-OK top-level status leaves the batch untouched.
    pub fn enrich<P: DistanceMatrixProvider + ?Sized>(
        &self,
        origin: Coordinate,
        destinations: &mut [DestinationCandidate],
        provider: &P,
    ) -> Result<RankSummary, ProviderError> {
        self.enrich_until(origin, destinations, provider, None)
    }

    /// [`enrich`](Self::enrich) bounded by `deadline`: no batch is started after it
    /// passes, and each provider call is handed the deadline.
    pub fn enrich_until<P: DistanceMatrixProvider + ?Sized>(
        &self,
        origin: Coordinate,
        destinations: &mut [DestinationCandidate],
        provider: &P,
        deadline: Option<Instant>,
    ) -> Result<RankSummary, ProviderError> {
        let eligible: Vec<(usize, Coordinate)> = destinations
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.coordinate().map(|p| (i, p)))
            .collect();

        let mut summary = RankSummary {
            submitted: eligible.len(),
            ineligible: destinations.len() - eligible.len(),
            ..RankSummary::default()
        };

        for batch in eligible.chunks(self.max_destinations) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(
                    batches_done = summary.batches,
                    enriched = summary.enriched,
                    "request deadline reached before next distance batch"
                );
                return Err(ProviderError::Timeout);
            }
            let points: Vec<Coordinate> = batch.iter().map(|(_, p)| *p).collect();
            let result = provider.compute_matrix_until(origin, &points, deadline)?;
            summary.batches += 1;

            if let MatrixStatus::Degraded { status, message } = &result.status {
                warn!(
                    %status,
                    message = message.as_deref().unwrap_or(""),
                    batch_size = batch.len(),
                    "distance provider degraded, leaving batch unenriched"
                );
                summary.degraded_batches += 1;
                continue;
            }

            for ((index, _), row) in batch.iter().zip(&result.rows) {
                if let Some(estimate) = row.first_ok() {
                    destinations[*index].computed_distance = Some(estimate.clone());
                    summary.enriched += 1;
                }
            }
        }

        debug!(
            submitted = summary.submitted,
            enriched = summary.enriched,
            ineligible = summary.ineligible,
            batches = summary.batches,
            "ranking pass complete"
        );
        Ok(summary)
    }
}

/// Enriched candidates ordered by travel distance, nearest first.
///
/// Candidates without an estimate are left out. Ties keep input order.
pub fn closest_first(destinations: &[DestinationCandidate]) -> Vec<&DestinationCandidate> {
    let mut ranked: Vec<&DestinationCandidate> = destinations
        .iter()
        .filter(|c| c.computed_distance.is_some())
        .collect();
    ranked.sort_by_key(|c| c.computed_distance.as_ref().map(|e| e.meters()));
    ranked
}
