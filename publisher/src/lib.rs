//! Publish synthetic analytics events through the pinned reporter.
//!
//! Reporter properties are read from a YAML mapping (scalars only) and may be overridden
//! with `key=value` pairs:
//!
//! ```yaml
//! namespace: gateway
//! timer.buckets: "0.05,0.1,0.5,1"
//! labels.max: 128
//! ```

use analytics_reporter::{ConfigBag, MetricSchema, ReportError, Reporter};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the counter events are recorded under.
pub const REQUESTS_METRIC: &str = "requests";

/// Name of the timer latencies are recorded under.
pub const LATENCY_METRIC: &str = "latency";

/// Response codes cycled through by [publish].
const RESPONSE_CODES: [&str; 4] = ["200", "201", "404", "503"];

/// Errors that can occur when publishing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid properties file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid property: {0}")]
    InvalidProperty(String),
    #[error("reporter error: {0}")]
    Reporter(#[from] analytics_reporter::Error),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// A scalar property value.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::String(value) => value,
        }
    }
}

/// Parse reporter properties from a YAML mapping of scalars.
///
/// An empty document yields no properties.
pub fn parse_properties(yaml: &str) -> Result<ConfigBag, Error> {
    if yaml.trim().is_empty() {
        return Ok(ConfigBag::new());
    }
    let properties: BTreeMap<String, Scalar> = serde_yaml::from_str(yaml)?;
    Ok(properties
        .into_iter()
        .map(|(key, value)| (key, value.into_string()))
        .collect())
}

/// Read reporter properties from the YAML file at `path`.
pub fn load_properties(path: &Path) -> Result<ConfigBag, Error> {
    let yaml = fs::read_to_string(path)?;
    let properties = parse_properties(&yaml)?;
    debug!(path = %path.display(), count = properties.len(), "loaded properties");
    Ok(properties)
}

/// Parse a `key=value` override.
pub fn parse_property(property: &str) -> Result<(String, String), Error> {
    let Some((key, value)) = property.split_once('=') else {
        return Err(Error::InvalidProperty(format!(
            "expected key=value, got {property:?}"
        )));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidProperty(format!("empty key in {property:?}")));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Record `events` synthetic response events (and their latencies) with `reporter`.
///
/// Returns the number of events counted.
pub fn publish(reporter: &dyn Reporter, api_name: &str, events: u64) -> Result<u64, Error> {
    let requests = reporter.create_counter_metric(REQUESTS_METRIC, MetricSchema::Response)?;
    let latency = reporter.create_timer_metric(LATENCY_METRIC, MetricSchema::Response)?;
    let mut published = 0;
    for i in 0..events {
        let code = RESPONSE_CODES[(i % RESPONSE_CODES.len() as u64) as usize];
        let event = requests
            .event_builder()
            .add_attribute("api_name", api_name)
            .add_attribute("api_version", "1.0.0")
            .add_attribute("api_method", if i % 2 == 0 { "GET" } else { "POST" })
            .add_attribute("response_code", code);
        requests.increment(event)?;
        latency.update(Duration::from_millis(5 + (i % 10) * 25));
        published += 1;
    }
    info!(published, reporter = reporter.type_name(), "published events");
    Ok(published)
}
