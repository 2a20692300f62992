//! Health document model for the Cloudera Manager services API
//!
//! One poll cycle decodes a single [`HealthDocument`] from
//! `GET /api/v1/clusters/<cluster>/services/`. The document is transient:
//! it is constructed fresh each cycle, walked by the projector, and
//! discarded. Only the derived gauge values outlive it.

use std::fmt;

use serde::Deserialize;

/// Categorical health state reported by Cloudera Manager for a service
/// or one of its sub-checks.
///
/// `Unrecognized` absorbs any enum value a newer API version may add, so
/// schema drift in this field never fails decoding; the projector treats
/// it like any non-`Good` state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthSummary {
    /// Service is fully healthy
    Good,
    /// Service works but has concerning checks
    Concerning,
    /// Service is unhealthy
    Bad,
    /// Health checks are disabled for the service
    Disabled,
    /// Health state could not be determined
    #[default]
    Unknown,
    /// Health data is not available
    NotAvailable,
    /// Any value outside the documented enumeration
    #[serde(other)]
    Unrecognized,
}

impl HealthSummary {
    /// Whether this state counts as healthy
    pub fn is_good(&self) -> bool {
        matches!(self, HealthSummary::Good)
    }

    /// Get the upstream wire name of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthSummary::Good => "GOOD",
            HealthSummary::Concerning => "CONCERNING",
            HealthSummary::Bad => "BAD",
            HealthSummary::Disabled => "DISABLED",
            HealthSummary::Unknown => "UNKNOWN",
            HealthSummary::NotAvailable => "NOT_AVAILABLE",
            HealthSummary::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One diagnostic sub-check within a service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// Check name, e.g. `HDFS_DATA_NODES_HEALTHY`
    pub name: String,
    /// Health state of this check
    #[serde(default)]
    pub summary: HealthSummary,
}

/// Reference to the cluster a service belongs to
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRef {
    /// Cluster display name
    #[serde(default)]
    pub cluster_name: String,
}

/// One service entry in the health document
///
/// `name` is the stable identifier used as the metric key. Only `name` and
/// `health_summary` are required; Cloudera Manager omits the other fields
/// in some API versions, so they default when absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClouderaService {
    /// Service name, e.g. `hdfs`
    pub name: String,
    /// Service type, e.g. `HDFS`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Owning cluster
    #[serde(default)]
    pub cluster_ref: ClusterRef,
    /// Cloudera Manager UI URL for the service
    #[serde(default)]
    pub service_url: String,
    /// Run state, e.g. `STARTED`
    #[serde(default)]
    pub service_state: String,
    /// Aggregate health of the service
    pub health_summary: HealthSummary,
    /// Individual diagnostic checks
    #[serde(default)]
    pub health_checks: Vec<HealthCheck>,
    /// Whether the running configuration is stale
    #[serde(default)]
    pub config_stale: bool,
}

/// Root of one poll response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthDocument {
    /// Services in upstream order
    #[serde(default)]
    pub items: Vec<ClouderaService>,
}
