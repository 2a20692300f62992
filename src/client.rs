//! HTTP client for the Cloudera Manager services API
//!
//! Issues one authenticated GET per poll cycle against
//! `/api/v1/clusters/<cluster>/services/` and decodes the response into a
//! [`HealthDocument`]. The client carries a bounded request timeout so a
//! hung upstream cannot stall the poll service; a timeout fails the cycle
//! exactly like any other transport error. Retry is deliberately absent,
//! a failed fetch simply ends the current cycle.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::{Error, FetchError};
use crate::types::HealthDocument;

/// Configuration for the health client
///
/// Defaults match the exporter's historical flag defaults: a local
/// Cloudera Manager on port 7180, `admin` with an empty password, and the
/// stock `Cluster%201` cluster name (already percent-encoded, passed
/// through verbatim).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URI of the Cloudera Manager API, e.g. `http://cm-host:7180`
    pub base_uri: String,

    /// Cluster name path segment, percent-encoded by the operator
    pub cluster_name: String,

    /// HTTP Basic auth username
    pub user: String,

    /// HTTP Basic auth password
    pub password: String,

    /// Per-request timeout covering connect, send, and body read
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost:7180".to_string(),
            cluster_name: "Cluster%201".to_string(),
            user: "admin".to_string(),
            password: String::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Client for fetching the health document from Cloudera Manager
///
/// One instance lives for the whole process; the underlying connection
/// pool is reused across cycles but nothing else is shared, each call to
/// [`fetch`](HealthClient::fetch) is independent.
pub struct HealthClient {
    http: Client,
    endpoint: String,
    user: String,
    password: String,
}

impl HealthClient {
    /// Create a client for the configured cluster
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/api/v1/clusters/{}/services/",
            config.base_uri.trim_end_matches('/'),
            config.cluster_name
        );

        Ok(Self {
            http,
            endpoint,
            user: config.user,
            password: config.password,
        })
    }

    /// Get the full services endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the current health document
    ///
    /// Error mapping: 401/403 is [`FetchError::Auth`], any other non-2xx
    /// status is [`FetchError::Http`], transport failures and timeouts are
    /// [`FetchError::Connect`], and a body that does not decode as a
    /// health document is [`FetchError::Decode`].
    pub async fn fetch(&self) -> Result<HealthDocument, FetchError> {
        let response = self
            .http
            .get(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| FetchError::Connect {
                url: self.endpoint.clone(),
                source: e,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                url: self.endpoint.clone(),
                status,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                url: self.endpoint.clone(),
                status,
            });
        }

        let document: HealthDocument =
            response.json().await.map_err(|e| {
                if e.is_decode() {
                    FetchError::Decode {
                        url: self.endpoint.clone(),
                        source: e,
                    }
                } else {
                    FetchError::Connect {
                        url: self.endpoint.clone(),
                        source: e,
                    }
                }
            })?;

        debug!(
            url = %self.endpoint,
            services = document.items.len(),
            "fetched health document"
        );
        Ok(document)
    }
}
