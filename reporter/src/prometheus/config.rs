//! Typed configuration of the [super::PrometheusReporter].

use crate::{ConfigBag, ConstructionError};
use tracing::debug;

/// Key holding the prefix of every registered metric.
pub const NAMESPACE: &str = "namespace";

/// Key holding the comma-separated histogram buckets of timers (in seconds).
pub const TIMER_BUCKETS: &str = "timer.buckets";

/// Key holding the maximum number of label sets a single counter may track.
pub const MAX_LABEL_SETS: &str = "labels.max";

/// Buckets used when none are configured.
///
/// Sized for requests that cross the network (from a few milliseconds to minutes).
pub const DEFAULT_TIMER_BUCKETS: [f64; 13] = [
    0.010, 0.020, 0.050, 0.100, 0.200, 0.500, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0,
];

/// Configuration for the [super::PrometheusReporter].
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Prefix of every registered metric.
    pub namespace: String,

    /// Upper bounds of the histogram buckets used by timers.
    pub timer_buckets: Vec<f64>,

    /// Maximum number of label sets a single counter may track.
    pub max_label_sets: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "analytics".to_string(),
            timer_buckets: DEFAULT_TIMER_BUCKETS.to_vec(),
            max_label_sets: 64,
        }
    }
}

impl TryFrom<&ConfigBag> for Config {
    type Error = ConstructionError;

    fn try_from(bag: &ConfigBag) -> Result<Self, Self::Error> {
        let mut config = Self::default();
        for (key, value) in bag {
            match key.as_str() {
                NAMESPACE => config.namespace = parse_namespace(value)?,
                TIMER_BUCKETS => config.timer_buckets = parse_buckets(value)?,
                MAX_LABEL_SETS => config.max_label_sets = parse_max_label_sets(value)?,
                _ => debug!(key, "ignoring unrecognized reporter property"),
            }
        }
        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str, reason: &'static str) -> ConstructionError {
    ConstructionError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}

fn parse_namespace(value: &str) -> Result<String, ConstructionError> {
    if !crate::valid_metric_name(value) {
        return Err(invalid(
            NAMESPACE,
            value,
            "must only contain alphanumeric or underscore ('_') characters and not start with a digit",
        ));
    }
    Ok(value.to_string())
}

fn parse_buckets(value: &str) -> Result<Vec<f64>, ConstructionError> {
    let mut buckets = Vec::new();
    for bucket in value.split(',') {
        let bucket = bucket
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(TIMER_BUCKETS, value, "must be a list of numbers"))?;
        if !bucket.is_finite() || bucket <= 0.0 {
            return Err(invalid(TIMER_BUCKETS, value, "buckets must be positive"));
        }
        if buckets.last().is_some_and(|&last| bucket <= last) {
            return Err(invalid(
                TIMER_BUCKETS,
                value,
                "buckets must be strictly increasing",
            ));
        }
        buckets.push(bucket);
    }
    Ok(buckets)
}

fn parse_max_label_sets(value: &str) -> Result<usize, ConstructionError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(invalid(MAX_LABEL_SETS, value, "must be positive")),
        Ok(max) => Ok(max),
        Err(_) => Err(invalid(MAX_LABEL_SETS, value, "must be an integer")),
    }
}
