//! File-backed CRM snapshot at ~/.leadloc/crm.json.
//!
//! Holds lead attribute sets keyed by GUID and the agent/realtor records
//! related to them. Stands in for the live CRM behind the lookup traits.

use crate::location::{LeadAttributes, LeadLookup};
use crate::matrix::DestinationCandidate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Agent record attribute: primary key.
pub const AGENT_ID_ATTR: &str = "cr4f2_agentsandrealtorid";
/// Agent record attribute: display name.
pub const AGENT_NAME_ATTR: &str = "cr4f2_fullname";
/// Agent record attribute: lookup to the related lead.
pub const AGENT_LEAD_ATTR: &str = "cr4f2_leadtoagentrealtor";

/// Supplies the destination candidates related to a lead.
pub trait DestinationLookup {
    type Error;

    fn related_destinations(&self, lead_id: &str) -> Result<Vec<DestinationCandidate>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("cannot read CRM snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CRM snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A raw CRM entity: attribute name to optional value.
pub type AgentRecord = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrmSnapshot {
    #[serde(default)]
    leads: HashMap<String, LeadAttributes>,
    #[serde(default)]
    agents: Vec<AgentRecord>,
}

impl CrmSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".leadloc")
            .join("crm.json")
    }

    /// Load a snapshot from `path`.
    pub fn load_from(path: &Path) -> Result<Self, CrmError> {
        let data = fs::read_to_string(path).map_err(|source| CrmError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| CrmError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn insert_lead(&mut self, lead_id: impl Into<String>, attrs: LeadAttributes) {
        self.leads.insert(lead_id.into(), attrs);
    }

    pub fn insert_agent(&mut self, record: AgentRecord) {
        self.agents.push(record);
    }

    pub fn lead_count(&self) -> usize {
        self.leads.len()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

impl LeadLookup for CrmSnapshot {
    type Error = CrmError;

    fn fetch_lead(&self, lead_id: &str) -> Result<Option<LeadAttributes>, CrmError> {
        Ok(self.leads.get(lead_id).cloned())
    }
}

impl DestinationLookup for CrmSnapshot {
    type Error = CrmError;

    fn related_destinations(&self, lead_id: &str) -> Result<Vec<DestinationCandidate>, CrmError> {
        Ok(self
            .agents
            .iter()
            .filter(|r| attr(r, AGENT_LEAD_ATTR) == Some(lead_id))
            .map(to_candidate)
            .collect())
    }
}

fn attr<'a>(record: &'a AgentRecord, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(|v| v.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Keep only the fields the ranker needs; blank values become absent.
pub fn to_candidate(record: &AgentRecord) -> DestinationCandidate {
    let owned = |key: &str| attr(record, key).map(String::from);
    DestinationCandidate {
        id: owned(AGENT_ID_ATTR),
        name: owned(AGENT_NAME_ATTR),
        latitude: owned(crate::location::types::LATITUDE_ATTR),
        longitude: owned(crate::location::types::LONGITUDE_ATTR),
        computed_distance: None,
    }
}
