//! Projection of a health document onto the metric registry
//!
//! The projector walks the services of one freshly fetched
//! [`HealthDocument`] and writes one gauge value per service name. The
//! richer upstream enum is collapsed to a binary signal: `GOOD` is 1.0,
//! everything else (`CONCERNING`, `BAD`, `DISABLED`, `UNKNOWN`,
//! `NOT_AVAILABLE`, unrecognized) is 0.0. Projection is idempotent: the
//! same document projects to the same registry state however often it runs.

use tracing::debug;

use crate::error::ProjectionError;
use crate::registry::MetricRegistry;
use crate::types::{HealthDocument, HealthSummary};

/// Map a health summary to its gauge value
pub fn health_value(summary: HealthSummary) -> f64 {
    if summary.is_good() {
        1.0
    } else {
        0.0
    }
}

/// Project every service in the document onto the registry
///
/// Exactly one `set` per service name, in document order. In static mode
/// an unknown service name aborts the projection; values written before
/// the unknown name stand, the error propagates to the caller.
pub fn project(
    document: &HealthDocument,
    registry: &MetricRegistry,
) -> Result<(), ProjectionError> {
    for service in &document.items {
        let value = health_value(service.health_summary);
        registry.set(&service.name, value)?;
        debug!(
            service = %service.name,
            summary = %service.health_summary,
            value,
            "projected service health"
        );
    }
    Ok(())
}
