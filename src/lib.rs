//! Cloudera Manager Health Exporter
//!
//! A Prometheus exporter that periodically polls the Cloudera Manager REST
//! API for the health of the cluster's services (HDFS, YARN, Impala, Hive,
//! ZooKeeper, ...) and republishes that health as numeric gauges.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ tick ┌───────────────┐ JSON ┌───────────┐
//! │ Poll Service │─────▶│ Health Client │─────▶│ Projector │
//! └──────────────┘      └───────────────┘      └─────┬─────┘
//!                                                    │ set(name, 0|1)
//!                                              ┌─────▼──────────┐
//!            scrape (/metrics) ◀───────────────│ MetricRegistry │
//!                                              └────────────────┘
//! ```
//!
//! The poller and the HTTP scrape handlers share only the [`MetricRegistry`];
//! each side goes through its atomic gauge storage, so a scrape racing an
//! in-flight projection observes, per service, either the previous cycle's
//! value or the new one, never a torn read.
//!
//! A failed poll cycle (upstream down, auth rejected, malformed body) is
//! cycle-local: it is logged and the registry keeps serving the last
//! successfully projected values.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloudera_exporter::{
//!     client::{ClientConfig, HealthClient},
//!     poller::{Poller, PollerConfig},
//!     registry::{MetricRegistry, RegistryMode},
//! };
//!
//! let registry = std::sync::Arc::new(MetricRegistry::new(RegistryMode::Dynamic)?);
//! let client = HealthClient::new(ClientConfig::default())?;
//! let poller = Poller::new(PollerConfig::default(), client, registry.clone());
//! ```

pub mod client;
pub mod error;
pub mod poller;
pub mod projector;
pub mod registry;
pub mod types;

pub use client::{ClientConfig, HealthClient};
pub use error::{Error, FetchError, ProjectionError, Result};
pub use poller::{Poller, PollerConfig, Service, ServiceStatus};
pub use registry::{MetricRegistry, RegistryMode};
pub use types::{HealthDocument, HealthSummary};
