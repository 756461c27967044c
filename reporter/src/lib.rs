//! Resolve and pin the single metrics reporter of an analytics publisher.
//!
//! A publisher asks the [ReporterRegistry] for a [Reporter] by identifier. The first
//! successful request constructs the reporter and every later request (from any thread)
//! receives the same instance, regardless of the identifier or configuration it supplies.
//!
//! # Identifiers
//!
//! The set of supported reporters is closed and modelled by [ReporterKind]. An absent or
//! empty identifier selects the default ([DEFAULT_REPORTER]).
//!
//! # Example
//!
//! ```rust
//! use analytics_reporter::{ConfigBag, MetricSchema, ReporterRegistry};
//!
//! let registry = ReporterRegistry::new();
//! let mut config = ConfigBag::new();
//! config.insert("namespace".into(), "gateway".into());
//!
//! let reporter = registry.resolve(None, &config).unwrap();
//! let requests = reporter
//!     .create_counter_metric("requests", MetricSchema::Response)
//!     .unwrap();
//! let event = requests
//!     .event_builder()
//!     .add_attribute("api_name", "pizzashack")
//!     .add_attribute("api_version", "1.0.0")
//!     .add_attribute("api_method", "GET")
//!     .add_attribute("response_code", "200");
//! assert_eq!(requests.increment(event).unwrap(), 1);
//!
//! // Later requests ignore their arguments and return the pinned reporter.
//! let again = registry.resolve(Some("something-else"), &ConfigBag::new()).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&reporter, &again));
//! ```

use std::{collections::BTreeMap, fmt::Debug, sync::Arc, time::Duration};
use thiserror::Error;

mod kind;
pub use kind::{ReporterKind, DEFAULT_REPORTER};
pub mod prometheus;
mod registry;
pub use registry::ReporterRegistry;
mod schema;
pub use schema::{EventBuilder, MetricEvent, MetricSchema};

/// String-keyed configuration handed verbatim to a reporter's constructor.
pub type ConfigBag = BTreeMap<String, String>;

/// Errors that can occur when resolving a [Reporter].
#[derive(Error, Debug)]
pub enum Error {
    #[error("reporter identifier not supported: {0}")]
    UnsupportedIdentifier(String),
    #[error("failed to construct {kind} reporter: {source}")]
    Construction {
        kind: ReporterKind,
        #[source]
        source: ConstructionError,
    },
}

/// Errors that a concrete reporter may return from its constructor.
#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error("invalid value for {key} ({value:?}): {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Errors that can occur when recording a metric.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReportError {
    #[error("invalid metric name: {0}")]
    InvalidName(String),
    #[error("metric {0} already registered with a different type")]
    TypeMismatch(String),
    #[error("missing attribute for {schema} event: {attribute}")]
    MissingAttribute {
        schema: MetricSchema,
        attribute: &'static str,
    },
    #[error("invalid attribute {attribute} ({value:?}): {reason}")]
    InvalidAttribute {
        attribute: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("metric {metric} expects {expected} events, got {actual}")]
    SchemaMismatch {
        metric: String,
        expected: MetricSchema,
        actual: MetricSchema,
    },
    #[error("metric {metric} exceeded {limit} label sets")]
    CardinalityExceeded { metric: String, limit: usize },
}

/// Something that can record and publish analytics metrics.
///
/// Implementations are shared between every caller that resolves them and must
/// therefore be safe to use concurrently.
pub trait Reporter: Send + Sync + Debug {
    /// The [ReporterKind] that constructed this reporter.
    fn kind(&self) -> ReporterKind;

    /// Name of the concrete type backing this reporter.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Create (or look up) a counter named `name` that accepts `schema` events.
    ///
    /// Creating the same `name` twice returns a handle to the same counter. Creating
    /// it again with a different `schema` fails.
    fn create_counter_metric(
        &self,
        name: &str,
        schema: MetricSchema,
    ) -> Result<Arc<dyn CounterMetric>, ReportError>;

    /// Create (or look up) a timer named `name` that accepts `schema` events.
    fn create_timer_metric(
        &self,
        name: &str,
        schema: MetricSchema,
    ) -> Result<Arc<dyn TimerMetric>, ReportError>;

    /// Render everything recorded so far.
    fn encode(&self) -> String;
}

/// A monotonically increasing count of events.
pub trait CounterMetric: Send + Sync + Debug {
    /// Name the counter was created with.
    fn name(&self) -> &str;

    /// Schema every incremented event must satisfy.
    fn schema(&self) -> MetricSchema;

    /// Start an event for this counter.
    fn event_builder(&self) -> EventBuilder {
        EventBuilder::new(self.schema())
    }

    /// Validate `event` and count it, returning the new count for its label set.
    fn increment(&self, event: EventBuilder) -> Result<u64, ReportError>;
}

/// A distribution of observed durations.
pub trait TimerMetric: Send + Sync + Debug {
    /// Name the timer was created with.
    fn name(&self) -> &str;

    /// Schema the timer was created with.
    fn schema(&self) -> MetricSchema;

    /// Record a single observed `duration`.
    fn update(&self, duration: Duration);
}

/// Check that `name` is usable as a metric name (`[a-zA-Z_][a-zA-Z0-9_]*`).
pub(crate) fn valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
