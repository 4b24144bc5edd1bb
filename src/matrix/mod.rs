//! Distance-matrix subsystem.
//!
//! Batches agent coordinates into provider requests and merges travel
//! estimates back onto the candidates in input order.

pub mod provider;
pub mod ranker;
pub mod retry;
pub mod types;

pub use provider::{
    DistanceMatrixProvider, GoogleDistanceMatrix, GoogleMatrixConfig, GOOGLE_DISTANCE_MATRIX_URL,
    GOOGLE_MAX_DESTINATIONS,
};
pub use ranker::{closest_first, DistanceRanker, RankSummary};
pub use retry::{RetryPolicy, RetryingProvider};
pub use types::{
    DestinationCandidate, DistanceMatrixResult, MatrixElement, MatrixRow, MatrixStatus, Measure,
    ProviderError, RouteEstimate, Units,
};
