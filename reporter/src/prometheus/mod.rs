//! Record analytics events into a [prometheus_client] registry.
//!
//! Counters are exposed as `<namespace>_<name>_total`, labelled with the required
//! attributes of their [MetricSchema]. Timers are exposed as `<namespace>_<name>`
//! histograms (in seconds).

use crate::{
    valid_metric_name, ConfigBag, ConstructionError, CounterMetric, MetricSchema, ReportError,
    Reporter, ReporterKind, TimerMetric,
};
use prometheus_client::{
    encoding::text::encode,
    metrics::{family::Family, histogram::Histogram},
    registry::Registry,
};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex},
};
use tracing::debug;

mod config;
pub use config::{Config, DEFAULT_TIMER_BUCKETS, MAX_LABEL_SETS, NAMESPACE, TIMER_BUCKETS};
mod metrics;
pub use metrics::{EventCounter, EventTimer, Labels};

/// A metric created through the reporter.
#[derive(Debug)]
enum Handle {
    Counter(Arc<EventCounter>),
    Timer(Arc<EventTimer>),
}

#[derive(Debug)]
struct Inner {
    registry: Registry,
    metrics: HashMap<String, Handle>,
}

/// The default [Reporter].
#[derive(Debug)]
pub struct PrometheusReporter {
    config: Config,
    inner: Mutex<Inner>,
}

impl PrometheusReporter {
    /// Parse `config` and create an empty reporter.
    pub fn new(config: &ConfigBag) -> Result<Self, ConstructionError> {
        Ok(Self::from_config(Config::try_from(config)?))
    }

    /// Create an empty reporter from an already parsed [Config].
    pub fn from_config(config: Config) -> Self {
        let registry = Registry::with_prefix(config.namespace.clone());
        Self {
            config,
            inner: Mutex::new(Inner {
                registry,
                metrics: HashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create (or look up) a counter, returning the concrete handle.
    pub fn counter(
        &self,
        name: &str,
        schema: MetricSchema,
    ) -> Result<Arc<EventCounter>, ReportError> {
        if !valid_metric_name(name) {
            return Err(ReportError::InvalidName(name.to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let Inner { registry, metrics } = &mut *inner;
        match metrics.entry(name.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Handle::Counter(counter) if counter.schema() == schema => Ok(counter.clone()),
                Handle::Counter(counter) => Err(ReportError::SchemaMismatch {
                    metric: name.to_string(),
                    expected: counter.schema(),
                    actual: schema,
                }),
                Handle::Timer(_) => Err(ReportError::TypeMismatch(name.to_string())),
            },
            Entry::Vacant(entry) => {
                let family = Family::default();
                registry.register(name, format!("Number of {schema} events"), family.clone());
                let counter = Arc::new(EventCounter::new(
                    name.to_string(),
                    schema,
                    family,
                    self.config.max_label_sets,
                ));
                entry.insert(Handle::Counter(counter.clone()));
                debug!(name, %schema, "registered counter");
                Ok(counter)
            }
        }
    }

    /// Create (or look up) a timer, returning the concrete handle.
    pub fn timer(
        &self,
        name: &str,
        schema: MetricSchema,
    ) -> Result<Arc<EventTimer>, ReportError> {
        if !valid_metric_name(name) {
            return Err(ReportError::InvalidName(name.to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let Inner { registry, metrics } = &mut *inner;
        match metrics.entry(name.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Handle::Timer(timer) if timer.schema() == schema => Ok(timer.clone()),
                Handle::Timer(timer) => Err(ReportError::SchemaMismatch {
                    metric: name.to_string(),
                    expected: timer.schema(),
                    actual: schema,
                }),
                Handle::Counter(_) => Err(ReportError::TypeMismatch(name.to_string())),
            },
            Entry::Vacant(entry) => {
                let histogram = Histogram::new(self.config.timer_buckets.iter().copied());
                registry.register(
                    name,
                    format!("Duration of {schema} events in seconds"),
                    histogram.clone(),
                );
                let timer = Arc::new(EventTimer::new(name.to_string(), schema, histogram));
                entry.insert(Handle::Timer(timer.clone()));
                debug!(name, %schema, "registered timer");
                Ok(timer)
            }
        }
    }
}

impl Reporter for PrometheusReporter {
    fn kind(&self) -> ReporterKind {
        ReporterKind::Prometheus
    }

    fn create_counter_metric(
        &self,
        name: &str,
        schema: MetricSchema,
    ) -> Result<Arc<dyn CounterMetric>, ReportError> {
        Ok(self.counter(name, schema)?)
    }

    fn create_timer_metric(
        &self,
        name: &str,
        schema: MetricSchema,
    ) -> Result<Arc<dyn TimerMetric>, ReportError> {
        Ok(self.timer(name, schema)?)
    }

    fn encode(&self) -> String {
        let mut buffer = String::new();
        encode(&mut buffer, &self.inner.lock().unwrap().registry).expect("encoding failed");
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn response(code: &str) -> crate::EventBuilder {
        crate::EventBuilder::new(MetricSchema::Response)
            .add_attribute("api_name", "pizzashack")
            .add_attribute("api_version", "1.0.0")
            .add_attribute("api_method", "GET")
            .add_attribute("response_code", code)
    }

    #[test]
    fn test_counter_increments_per_label_set() {
        let reporter = PrometheusReporter::from_config(Config::default());
        let counter = reporter
            .create_counter_metric("requests", MetricSchema::Response)
            .unwrap();
        assert_eq!(counter.increment(response("200")).unwrap(), 1);
        assert_eq!(counter.increment(response("200")).unwrap(), 2);
        assert_eq!(counter.increment(response("503")).unwrap(), 1);

        let encoded = reporter.encode();
        assert!(encoded.contains("# TYPE analytics_requests counter"));
        assert!(encoded.contains(
            "analytics_requests_total{api_name=\"pizzashack\",api_version=\"1.0.0\",api_method=\"GET\",response_code=\"200\"} 2"
        ));
        assert!(encoded.contains(
            "analytics_requests_total{api_name=\"pizzashack\",api_version=\"1.0.0\",api_method=\"GET\",response_code=\"503\"} 1"
        ));
    }

    #[test]
    fn test_count() {
        let reporter = PrometheusReporter::from_config(Config::default());
        let counter = reporter.counter("requests", MetricSchema::Response).unwrap();
        let labels = response("200").build().unwrap().labels();
        assert_eq!(counter.count(&labels), 0);
        counter.increment(response("200")).unwrap();
        assert_eq!(counter.count(&labels), 1);
    }

    #[test]
    fn test_same_name_returns_same_counter() {
        let reporter = PrometheusReporter::from_config(Config::default());
        let first = reporter.counter("requests", MetricSchema::Response).unwrap();
        let second = reporter.counter("requests", MetricSchema::Response).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        first.increment(response("200")).unwrap();
        assert_eq!(second.increment(response("200")).unwrap(), 2);
    }

    #[test]
    fn test_schema_mismatch() {
        let reporter = PrometheusReporter::from_config(Config::default());
        let counter = reporter.counter("requests", MetricSchema::Response).unwrap();
        assert_eq!(
            reporter.counter("requests", MetricSchema::Error).unwrap_err(),
            ReportError::SchemaMismatch {
                metric: "requests".to_string(),
                expected: MetricSchema::Response,
                actual: MetricSchema::Error,
            }
        );

        let fault = crate::EventBuilder::new(MetricSchema::Fault)
            .add_attribute("api_name", "pizzashack")
            .add_attribute("api_version", "1.0.0")
            .add_attribute("fault_type", "TIMEOUT");
        assert!(matches!(
            counter.increment(fault),
            Err(ReportError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let reporter = PrometheusReporter::from_config(Config::default());
        reporter.counter("latency", MetricSchema::Response).unwrap();
        assert_eq!(
            reporter.timer("latency", MetricSchema::Response).unwrap_err(),
            ReportError::TypeMismatch("latency".to_string())
        );
    }

    #[test]
    fn test_invalid_name() {
        let reporter = PrometheusReporter::from_config(Config::default());
        assert_eq!(
            reporter.counter("api-requests", MetricSchema::Response).unwrap_err(),
            ReportError::InvalidName("api-requests".to_string())
        );
        assert_eq!(
            reporter.timer("", MetricSchema::Response).unwrap_err(),
            ReportError::InvalidName(String::new())
        );
    }

    #[test]
    fn test_invalid_event_not_counted() {
        let reporter = PrometheusReporter::from_config(Config::default());
        let counter = reporter.counter("requests", MetricSchema::Response).unwrap();
        assert!(matches!(
            counter.increment(response("OK")),
            Err(ReportError::InvalidAttribute { attribute: "response_code", .. })
        ));
        assert!(!reporter.encode().contains("analytics_requests_total"));
    }

    #[test]
    fn test_cardinality_limit() {
        let reporter = PrometheusReporter::from_config(Config {
            max_label_sets: 2,
            ..Config::default()
        });
        let counter = reporter.counter("requests", MetricSchema::Response).unwrap();
        counter.increment(response("200")).unwrap();
        counter.increment(response("201")).unwrap();
        assert_eq!(
            counter.increment(response("202")).unwrap_err(),
            ReportError::CardinalityExceeded {
                metric: "requests".to_string(),
                limit: 2,
            }
        );

        // Known label sets are still counted
        assert_eq!(counter.increment(response("200")).unwrap(), 2);
    }

    #[test]
    fn test_timer_observes_durations() {
        let mut bag = ConfigBag::new();
        bag.insert(NAMESPACE.to_string(), "gateway".to_string());
        bag.insert(TIMER_BUCKETS.to_string(), "0.1,1".to_string());
        let reporter = PrometheusReporter::new(&bag).unwrap();
        let timer = reporter
            .create_timer_metric("latency", MetricSchema::Response)
            .unwrap();
        assert_eq!(timer.name(), "latency");
        timer.update(Duration::from_millis(50));
        timer.update(Duration::from_millis(500));
        timer.update(Duration::from_secs(5));

        let encoded = reporter.encode();
        assert!(encoded.contains("# TYPE gateway_latency histogram"));
        assert!(encoded.contains("gateway_latency_count 3"));
        assert!(encoded.contains("gateway_latency_bucket{le=\"0.1\"} 1"));
        assert!(encoded.contains("gateway_latency_bucket{le=\"1.0\"} 2"));
        assert!(encoded.contains("gateway_latency_bucket{le=\"+Inf\"} 3"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bag = ConfigBag::new();
        bag.insert(MAX_LABEL_SETS.to_string(), "0".to_string());
        assert!(matches!(
            PrometheusReporter::new(&bag),
            Err(ConstructionError::InvalidValue { key: MAX_LABEL_SETS, .. })
        ));
    }
}
