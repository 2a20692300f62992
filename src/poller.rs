//! Poll Service
//!
//! Runs the fetch → project pipeline on a fixed interval, isolated from
//! the HTTP-serving path. The poller is the only writer of the metric
//! registry; scrape handlers are the readers.
//!
//! Failure policy is cycle-local: a fetch or decode error is logged with
//! its URL and status and the cycle ends with the registry untouched, so
//! scrapes keep serving the last successfully projected values through an
//! upstream outage. The one escalation is an unknown service name in
//! static mode, which signals schema drift between the cluster and the
//! exporter's configuration and stops the service with an error.
//!
//! Cycles never overlap: there is exactly one poll task and a new tick is
//! not served before the previous cycle's projection finishes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client::HealthClient;
use crate::error::{Error, ProjectionError, Result};
use crate::projector;
use crate::registry::MetricRegistry;

// ============================================================================
// Service framework
// ============================================================================

/// Lifecycle state of a background service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Service has not started or has shut down cleanly
    Stopped,
    /// Service loop is running
    Running,
    /// Service stopped with an unrecoverable error
    Failed(String),
}

impl ServiceStatus {
    /// Whether the service loop is currently running
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running)
    }
}

/// A long-running background service with cooperative shutdown
///
/// `start` drives the service loop until the shutdown channel fires and
/// only returns early on an unrecoverable error.
#[async_trait]
pub trait Service: Send + Sync {
    /// Run the service loop until shutdown is signalled
    async fn start(&self, shutdown: broadcast::Receiver<()>) -> Result<()>;

    /// Get the service name for logging
    fn name(&self) -> &'static str;

    /// Get the current lifecycle status
    fn status(&self) -> ServiceStatus;
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the poll service
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between poll cycles
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Poll service
// ============================================================================

/// Background service polling Cloudera Manager and updating the registry
pub struct Poller {
    config: PollerConfig,
    client: HealthClient,
    registry: Arc<MetricRegistry>,
    status: RwLock<ServiceStatus>,
}

impl Poller {
    /// Create a new poll service
    pub fn new(config: PollerConfig, client: HealthClient, registry: Arc<MetricRegistry>) -> Self {
        Self {
            config,
            client,
            registry,
            status: RwLock::new(ServiceStatus::Stopped),
        }
    }

    /// Run one poll cycle: fetch the health document and project it
    ///
    /// Public so tests (and operators embedding the exporter) can trigger
    /// a cycle without the timer. Failure accounting and the escalation
    /// policy live in the service loop, not here.
    pub async fn run_cycle(&self) -> Result<()> {
        let start = Instant::now();
        let document = self.client.fetch().await?;
        projector::project(&document, &self.registry)?;
        self.registry.record_cycle_success(start.elapsed());

        debug!(
            services = document.items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "poll cycle completed"
        );
        Ok(())
    }

    /// Apply the failure policy to one cycle outcome
    ///
    /// Returns an error only for the process-fatal case (unknown service
    /// name in static mode); every other failure ends the cycle and the
    /// loop carries on with the registry untouched.
    fn handle_cycle_result(&self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(Error::Projection(ProjectionError::UnknownService { name })) => {
                self.registry.record_cycle_failure();
                error!(
                    service = %name,
                    "service name outside the static registry, stopping exporter"
                );
                Err(ProjectionError::UnknownService { name }.into())
            }
            Err(e) => {
                self.registry.record_cycle_failure();
                warn!(
                    error = %e,
                    url = %self.client.endpoint(),
                    "poll cycle failed, keeping previous values"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Service for Poller {
    async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        *self.status.write() = ServiceStatus::Running;
        info!(
            interval_secs = self.config.interval.as_secs(),
            url = %self.client.endpoint(),
            "poll service started"
        );

        let mut poll_interval = interval(self.config.interval);
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = shutdown.recv() => {
                    match result {
                        Ok(()) | Err(broadcast::error::RecvError::Closed) => {
                            info!("poll service received shutdown signal");
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!(missed = n, "poll service shutdown receiver lagged");
                        }
                    }
                }

                _ = poll_interval.tick() => {
                    let outcome = self.run_cycle().await;
                    if let Err(e) = self.handle_cycle_result(outcome) {
                        *self.status.write() = ServiceStatus::Failed(e.to_string());
                        return Err(e);
                    }
                }
            }
        }

        *self.status.write() = ServiceStatus::Stopped;
        info!("poll service stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "poller"
    }

    fn status(&self) -> ServiceStatus {
        self.status.read().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::registry::RegistryMode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn poller_for(server: &MockServer, mode: RegistryMode, interval: Duration) -> Arc<Poller> {
        let registry = Arc::new(MetricRegistry::new(mode).unwrap());
        let client = HealthClient::new(ClientConfig {
            base_uri: server.uri(),
            cluster_name: "test".to_string(),
            timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        })
        .unwrap();
        Arc::new(Poller::new(PollerConfig { interval }, client, registry))
    }

    fn healthy_body() -> serde_json::Value {
        serde_json::json!({
            "items": [
                { "name": "hdfs", "healthSummary": "GOOD" },
                { "name": "yarn", "healthSummary": "CONCERNING" }
            ]
        })
    }

    #[tokio::test]
    async fn test_run_cycle_updates_registry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/clusters/test/services/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(healthy_body()))
            .mount(&server)
            .await;

        let poller = poller_for(&server, RegistryMode::Dynamic, Duration::from_secs(10));
        poller.run_cycle().await.unwrap();

        assert_eq!(poller.registry.value("hdfs"), Some(1.0));
        assert_eq!(poller.registry.value("yarn"), Some(0.0));
    }

    #[tokio::test]
    async fn test_failed_cycle_leaves_values_stale() {
        let server = MockServer::start().await;
        // First cycle succeeds, then the upstream starts failing
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(healthy_body()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let poller = poller_for(&server, RegistryMode::Dynamic, Duration::from_secs(10));
        poller.run_cycle().await.unwrap();
        assert_eq!(poller.registry.value("hdfs"), Some(1.0));

        let outcome = poller.run_cycle().await;
        assert!(outcome.is_err());
        // A non-fatal failure ends the cycle, the loop would carry on
        assert!(poller.handle_cycle_result(outcome).is_ok());

        // Values from the last good cycle are still served
        assert_eq!(poller.registry.value("hdfs"), Some(1.0));
        assert_eq!(poller.registry.value("yarn"), Some(0.0));
        assert_eq!(poller.registry.poll_failures(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_leaves_registry_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let poller = poller_for(&server, RegistryMode::Dynamic, Duration::from_secs(10));
        let outcome = poller.run_cycle().await;

        assert!(matches!(
            outcome,
            Err(Error::Fetch(crate::error::FetchError::Auth { .. }))
        ));
        assert_eq!(poller.registry.value("hdfs"), None);
    }

    #[tokio::test]
    async fn test_unknown_service_is_fatal_in_static_mode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "name": "kudu", "healthSummary": "GOOD" }]
            })))
            .mount(&server)
            .await;

        let poller = poller_for(&server, RegistryMode::Static, Duration::from_millis(10));
        let (_tx, rx) = broadcast::channel(1);

        let result = poller.start(rx).await;
        assert!(result.is_err());
        assert!(matches!(poller.status(), ServiceStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_poller_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(healthy_body()))
            .mount(&server)
            .await;

        let poller = poller_for(&server, RegistryMode::Dynamic, Duration::from_millis(20));
        let (tx, rx) = broadcast::channel(1);

        let p = poller.clone();
        let handle = tokio::spawn(async move { p.start(rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(poller.status().is_running());
        tx.send(()).unwrap();

        let result = handle.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(poller.status(), ServiceStatus::Stopped);

        // The loop ran at least one cycle before shutdown
        assert_eq!(poller.registry.value("hdfs"), Some(1.0));
    }
}
