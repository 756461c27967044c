use crate::{CounterMetric, EventBuilder, MetricSchema, ReportError, TimerMetric};
use prometheus_client::metrics::{counter::Counter, family::Family, histogram::Histogram};
use std::{collections::HashSet, sync::Mutex, time::Duration};

/// Label set of a recorded event (the schema's required attributes, in order).
pub type Labels = Vec<(String, String)>;

/// Counts events per label set.
#[derive(Debug)]
pub struct EventCounter {
    name: String,
    schema: MetricSchema,
    family: Family<Labels, Counter>,

    max_label_sets: usize,
    label_sets: Mutex<HashSet<Labels>>,
}

impl EventCounter {
    pub(super) fn new(
        name: String,
        schema: MetricSchema,
        family: Family<Labels, Counter>,
        max_label_sets: usize,
    ) -> Self {
        Self {
            name,
            schema,
            family,
            max_label_sets,
            label_sets: Mutex::new(HashSet::new()),
        }
    }

    /// Current count for `labels` (0 if never incremented).
    pub fn count(&self, labels: &Labels) -> u64 {
        if !self.label_sets.lock().unwrap().contains(labels) {
            return 0;
        }
        self.family.get_or_create(labels).get()
    }
}

impl CounterMetric for EventCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> MetricSchema {
        self.schema
    }

    fn increment(&self, event: EventBuilder) -> Result<u64, ReportError> {
        if event.schema() != self.schema {
            return Err(ReportError::SchemaMismatch {
                metric: self.name.clone(),
                expected: self.schema,
                actual: event.schema(),
            });
        }
        let labels = event.build()?.labels();

        // Track the label set before the family creates a child for it
        {
            let mut label_sets = self.label_sets.lock().unwrap();
            if !label_sets.contains(&labels) {
                if label_sets.len() >= self.max_label_sets {
                    return Err(ReportError::CardinalityExceeded {
                        metric: self.name.clone(),
                        limit: self.max_label_sets,
                    });
                }
                label_sets.insert(labels.clone());
            }
        }

        // `inc` returns the previous value
        Ok(self.family.get_or_create(&labels).inc() + 1)
    }
}

/// Records event durations in a histogram.
#[derive(Debug)]
pub struct EventTimer {
    name: String,
    schema: MetricSchema,
    histogram: Histogram,
}

impl EventTimer {
    pub(super) fn new(name: String, schema: MetricSchema, histogram: Histogram) -> Self {
        Self {
            name,
            schema,
            histogram,
        }
    }
}

impl TimerMetric for EventTimer {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> MetricSchema {
        self.schema
    }

    fn update(&self, duration: Duration) {
        self.histogram.observe(duration.as_secs_f64());
    }
}
