//! Distance-matrix domain types.

use crate::location::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A value with both a human-readable and a numeric form, e.g. "3.1 km" / 3100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub text: String,
    pub value: u64,
}

/// Travel estimate for one origin/destination pair. Distance in meters, duration in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance: Measure,
    pub duration: Measure,
}

impl RouteEstimate {
    pub fn meters(&self) -> u64 {
        self.distance.value
    }

    pub fn seconds(&self) -> u64 {
        self.duration.value
    }
}

/// One result element. Only `Ok` carries a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixElement {
    Ok(RouteEstimate),
    /// Provider status for an unusable element, e.g. "NOT_FOUND" or "ZERO_RESULTS".
    Unavailable(String),
}

/// All alternatives returned for one destination, in provider order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixRow {
    pub elements: Vec<MatrixElement>,
}

impl MatrixRow {
    /// The first usable alternative; later ones are never trusted.
    pub fn first_ok(&self) -> Option<&RouteEstimate> {
        self.elements.iter().find_map(|e| match e {
            MatrixElement::Ok(est) => Some(est),
            MatrixElement::Unavailable(_) => None,
        })
    }
}

/// Top-level response status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixStatus {
    Ok,
    /// Non-OK status and optional provider message.
    Degraded {
        status: String,
        message: Option<String>,
    },
}

/// Response for one origin against many destinations.
///
/// `rows[i]` belongs to the `i`-th destination submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrixResult {
    pub status: MatrixStatus,
    pub rows: Vec<MatrixRow>,
}

impl DistanceMatrixResult {
    pub fn ok(rows: Vec<MatrixRow>) -> Self {
        Self { status: MatrixStatus::Ok, rows }
    }

    pub fn degraded(status: impl Into<String>) -> Self {
        Self {
            status: MatrixStatus::Degraded {
                status: status.into(),
                message: None,
            },
            rows: Vec::new(),
        }
    }
}

/// A related agent/realtor the lead may be matched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationCandidate {
    pub id: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    /// Set by the ranker; absent when no usable estimate exists.
    #[serde(default, rename = "location", skip_serializing_if = "Option::is_none")]
    pub computed_distance: Option<RouteEstimate>,
}

impl DestinationCandidate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            latitude: Some(latitude.into()),
            longitude: Some(longitude.into()),
            computed_distance: None,
        }
    }

    /// The candidate's point, if both halves are present and in range.
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::parse(self.latitude.as_deref()?, self.longitude.as_deref()?)
    }
}

/// Errors talking to a distance-matrix provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("distance provider timed out")]
    Timeout,
    #[error("distance provider transport error: {0}")]
    Transport(String),
    #[error("distance provider rejected credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("distance provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("invalid distance provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Timeouts, connection failures, rate limiting and 5xx are worth another attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized(_) | Self::InvalidResponse(_) => false,
        }
    }
}

/// Distance units requested from the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "metric"),
            Self::Imperial => write!(f, "imperial"),
        }
    }
}

impl std::str::FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(format!("unknown units '{}'. Use 'metric' or 'imperial'", other)),
        }
    }
}
