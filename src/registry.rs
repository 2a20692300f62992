//! Metric registry shared between the poller and the scrape handlers
//!
//! The registry is the only state crossing the concurrency boundary: the
//! poll service writes gauge values after each cycle, while any number of
//! concurrent scrape requests read them. Prometheus gauges store their
//! value as the bit pattern of an `f64` in an atomic integer, so a single
//! value is never torn; a scrape racing a projection sees, per service,
//! either the previous cycle's value or the new one.
//!
//! # Modes
//!
//! - **Dynamic** (default): one gauge family `cloudera_services_health`
//!   parameterized by a `name` label. New service names observed upstream
//!   create new label values with no code change. The label set is
//!   unbounded by construction; it is bounded in practice by the fixed
//!   service roster of the monitored cluster.
//! - **Static**: one individually named gauge per known Cloudera service
//!   (`cloudera_services_hdfs_service`, ...). Writing an unknown name is a
//!   configuration error the operator must resolve.

use std::collections::HashMap;
use std::time::Duration;

use clap::ValueEnum;
use prometheus::{proto, Encoder, Gauge, GaugeVec, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{Error, ProjectionError, Result};

/// Metric namespace, matching the exporter's historical metric names
const NAMESPACE: &str = "cloudera";

/// Subsystem for per-service health gauges
const SUBSYSTEM: &str = "services";

/// Full name of the dynamic-mode gauge family
const HEALTH_FAMILY: &str = "cloudera_services_health";

/// Service names known to the static registry
///
/// The closed enumeration of services a stock CDH cluster runs. Static
/// mode refuses any name outside this list.
pub const KNOWN_SERVICES: &[&str] = &[
    "hdfs",
    "impala",
    "yarn",
    "spark_on_yarn",
    "hive",
    "zookeeper",
    "hue",
    "oozie",
];

/// How service health gauges are keyed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RegistryMode {
    /// One labeled gauge family; arbitrary service names accepted
    #[default]
    Dynamic,
    /// Fixed pre-declared gauges; unknown service names are fatal
    Static,
}

/// Per-service gauge storage, one variant per registry mode
enum ServiceGauges {
    Dynamic(GaugeVec),
    Static(HashMap<&'static str, Gauge>),
}

/// Concurrency-safe mapping from service name to current health value
///
/// Constructed once at startup and passed by `Arc` to both the poll
/// service and the HTTP layer. Also owns the exporter's self-metrics
/// (build info, poll cycle counters) and, on Linux, the process collector.
pub struct MetricRegistry {
    registry: Registry,
    services: ServiceGauges,
    poll_cycles: IntCounter,
    poll_failures: IntCounter,
    last_poll_duration: Gauge,
}

impl MetricRegistry {
    /// Create a registry in the given mode with all collectors registered
    pub fn new(mode: RegistryMode) -> Result<Self> {
        let registry = Registry::new();

        let services = match mode {
            RegistryMode::Dynamic => {
                let family = GaugeVec::new(
                    Opts::new("health", "Health of the service (1 = GOOD, 0 = otherwise).")
                        .namespace(NAMESPACE)
                        .subsystem(SUBSYSTEM),
                    &["name"],
                )?;
                registry.register(Box::new(family.clone()))?;
                ServiceGauges::Dynamic(family)
            }
            RegistryMode::Static => {
                let mut gauges = HashMap::new();
                for &name in KNOWN_SERVICES {
                    let gauge = Gauge::with_opts(
                        Opts::new(
                            format!("{name}_service"),
                            format!("Health of the {name} system."),
                        )
                        .namespace(NAMESPACE)
                        .subsystem(SUBSYSTEM),
                    )?;
                    registry.register(Box::new(gauge.clone()))?;
                    gauges.insert(name, gauge);
                }
                ServiceGauges::Static(gauges)
            }
        };

        let build_info = IntGauge::with_opts(
            Opts::new(
                "cloudera_exporter_build_info",
                "Build information of the exporter.",
            )
            .const_label("version", env!("CARGO_PKG_VERSION")),
        )?;
        build_info.set(1);
        registry.register(Box::new(build_info))?;

        let poll_cycles = IntCounter::with_opts(Opts::new(
            "cloudera_exporter_poll_cycles_total",
            "Total poll cycles attempted against the Cloudera Manager API.",
        ))?;
        registry.register(Box::new(poll_cycles.clone()))?;

        let poll_failures = IntCounter::with_opts(Opts::new(
            "cloudera_exporter_poll_failures_total",
            "Poll cycles that failed before updating any service gauge.",
        ))?;
        registry.register(Box::new(poll_failures.clone()))?;

        let last_poll_duration = Gauge::with_opts(Opts::new(
            "cloudera_exporter_last_poll_duration_seconds",
            "Duration of the most recent successful poll cycle.",
        ))?;
        registry.register(Box::new(last_poll_duration.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            services,
            poll_cycles,
            poll_failures,
            last_poll_duration,
        })
    }

    /// Get the registry's mode
    pub fn mode(&self) -> RegistryMode {
        match self.services {
            ServiceGauges::Dynamic(_) => RegistryMode::Dynamic,
            ServiceGauges::Static(_) => RegistryMode::Static,
        }
    }

    /// Upsert the health value for a service
    ///
    /// In dynamic mode this never fails; a new name creates a new labeled
    /// child. In static mode a name outside [`KNOWN_SERVICES`] is a
    /// [`ProjectionError::UnknownService`].
    pub fn set(&self, name: &str, value: f64) -> std::result::Result<(), ProjectionError> {
        match &self.services {
            ServiceGauges::Dynamic(family) => {
                family.with_label_values(&[name]).set(value);
                Ok(())
            }
            ServiceGauges::Static(gauges) => match gauges.get(name) {
                Some(gauge) => {
                    gauge.set(value);
                    Ok(())
                }
                None => Err(ProjectionError::UnknownService {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Read back the current health value for a service
    ///
    /// Returns `None` for a name that has never been written (dynamic
    /// mode) or is outside the known set (static mode). Read-only: unlike
    /// `GaugeVec::with_label_values`, this never creates a labeled child.
    pub fn value(&self, name: &str) -> Option<f64> {
        match &self.services {
            ServiceGauges::Dynamic(_) => {
                for family in self.registry.gather() {
                    if family.get_name() != HEALTH_FAMILY {
                        continue;
                    }
                    for metric in family.get_metric() {
                        let matches = metric
                            .get_label()
                            .iter()
                            .any(|l| l.get_name() == "name" && l.get_value() == name);
                        if matches {
                            return Some(metric.get_gauge().get_value());
                        }
                    }
                }
                None
            }
            ServiceGauges::Static(gauges) => gauges.get(name).map(Gauge::get),
        }
    }

    /// Record a completed poll cycle
    pub fn record_cycle_success(&self, duration: Duration) {
        self.poll_cycles.inc();
        self.last_poll_duration.set(duration.as_secs_f64());
    }

    /// Record a poll cycle that failed before projection
    pub fn record_cycle_failure(&self) {
        self.poll_cycles.inc();
        self.poll_failures.inc();
    }

    /// Number of poll failures recorded so far
    pub fn poll_failures(&self) -> u64 {
        self.poll_failures.get()
    }

    /// Snapshot all metric families
    pub fn gather(&self) -> Vec<proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode the current metric state in Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_dynamic_set_and_read() {
        let registry = MetricRegistry::new(RegistryMode::Dynamic).unwrap();

        assert_eq!(registry.value("hdfs"), None);

        registry.set("hdfs", 1.0).unwrap();
        registry.set("yarn", 0.0).unwrap();
        assert_eq!(registry.value("hdfs"), Some(1.0));
        assert_eq!(registry.value("yarn"), Some(0.0));

        // Upsert overwrites
        registry.set("hdfs", 0.0).unwrap();
        assert_eq!(registry.value("hdfs"), Some(0.0));
    }

    #[test]
    fn test_dynamic_accepts_arbitrary_names() {
        let registry = MetricRegistry::new(RegistryMode::Dynamic).unwrap();
        registry.set("kudu", 1.0).unwrap();
        assert_eq!(registry.value("kudu"), Some(1.0));
    }

    #[test]
    fn test_static_known_names() {
        let registry = MetricRegistry::new(RegistryMode::Static).unwrap();

        for &name in KNOWN_SERVICES {
            registry.set(name, 1.0).unwrap();
            assert_eq!(registry.value(name), Some(1.0));
        }
    }

    #[test]
    fn test_static_unknown_name_rejected() {
        let registry = MetricRegistry::new(RegistryMode::Static).unwrap();

        let err = registry.set("kudu", 1.0).unwrap_err();
        assert!(matches!(err, ProjectionError::UnknownService { ref name } if name == "kudu"));
        assert_eq!(registry.value("kudu"), None);
    }

    #[test]
    fn test_encode_text_dynamic() {
        let registry = MetricRegistry::new(RegistryMode::Dynamic).unwrap();
        registry.set("hdfs", 1.0).unwrap();

        let text = registry.encode_text().unwrap();
        assert!(text.contains("cloudera_services_health{name=\"hdfs\"} 1"));
        assert!(text.contains("cloudera_exporter_build_info"));
        assert!(text.contains("cloudera_exporter_poll_cycles_total"));
    }

    #[test]
    fn test_encode_text_static() {
        let registry = MetricRegistry::new(RegistryMode::Static).unwrap();
        registry.set("zookeeper", 1.0).unwrap();

        let text = registry.encode_text().unwrap();
        assert!(text.contains("cloudera_services_zookeeper_service 1"));
        // Unwritten gauges still expose their default value
        assert!(text.contains("cloudera_services_hue_service 0"));
    }

    #[test]
    fn test_cycle_counters() {
        let registry = MetricRegistry::new(RegistryMode::Dynamic).unwrap();

        registry.record_cycle_success(Duration::from_millis(120));
        registry.record_cycle_failure();

        assert_eq!(registry.poll_failures(), 1);
        let text = registry.encode_text().unwrap();
        assert!(text.contains("cloudera_exporter_poll_cycles_total 2"));
        assert!(text.contains("cloudera_exporter_poll_failures_total 1"));
    }

    #[test]
    fn test_concurrent_writes_and_scrapes() {
        let registry = Arc::new(MetricRegistry::new(RegistryMode::Dynamic).unwrap());

        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..1_000u32 {
                    let value = f64::from(i % 2);
                    registry.set("hdfs", value).unwrap();
                    registry.set("yarn", 1.0 - value).unwrap();
                }
            })
        };

        // Concurrent scrapes must never observe a torn (non 0/1) value
        for _ in 0..200 {
            if let Some(v) = registry.value("hdfs") {
                assert!(v == 0.0 || v == 1.0);
            }
            let text = registry.encode_text().unwrap();
            assert!(text.contains("cloudera_exporter_build_info"));
        }

        writer.join().unwrap();
        assert!(registry.value("hdfs").is_some());
        assert!(registry.value("yarn").is_some());
    }
}
