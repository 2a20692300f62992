//! Error types for the exporter

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the exporter
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Projection error
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from one fetch against the cluster-management API
///
/// All variants carry the request URL so a failed poll cycle can be logged
/// with enough context for an operator to act on.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (refused, DNS, timeout)
    #[error("connection to {url} failed: {source}")]
    Connect {
        /// Request URL
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Credentials rejected by the upstream API
    #[error("authentication rejected by {url} (HTTP {status})")]
    Auth {
        /// Request URL
        url: String,
        /// Rejecting status code (401 or 403)
        status: StatusCode,
    },

    /// Upstream answered with a non-2xx status other than an auth rejection
    #[error("{url} returned HTTP {status}")]
    Http {
        /// Request URL
        url: String,
        /// Response status code
        status: StatusCode,
    },

    /// Response body was not a valid health document
    #[error("failed to decode health document from {url}: {source}")]
    Decode {
        /// Request URL
        url: String,
        /// Underlying decode error
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Get the HTTP status associated with this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Auth { status, .. } | FetchError::Http { status, .. } => Some(*status),
            FetchError::Connect { .. } | FetchError::Decode { .. } => None,
        }
    }

    /// Get the request URL this error originated from
    pub fn url(&self) -> &str {
        match self {
            FetchError::Connect { url, .. }
            | FetchError::Auth { url, .. }
            | FetchError::Http { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }
}

/// Errors from projecting a health document onto the registry
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// Service name outside the static registry's fixed key set
    ///
    /// Only raised in static mode. Signals schema drift between the
    /// monitored cluster and the exporter's configuration, so it is
    /// escalated to a process-fatal error rather than skipped.
    #[error("unknown service name: {name}")]
    UnknownService {
        /// The unrecognized service name
        name: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
